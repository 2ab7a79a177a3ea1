//! Vendor framers: turn receiver byte streams into per-satellite payload
//! frames.
//!
//! Every framer is a pull iterator over a [std::io::Read] byte source, the
//! only blocking point in the pipeline. The scan loop is the same in each:
//! hunt for the vendor sync, check the length field, verify the checksum,
//! emit a typed frame; on any mismatch emit a tagged error, slip one byte
//! and keep scanning, so garbage between frames never costs a later frame.

use std::io::Read;

use bitflags::bitflags;

use crate::error::{ErrorKind, Stage, StreamError};
use crate::time::GpsTime;

mod alst;
mod nov;
mod psdr;
mod raw;
mod sbf;
mod ubx;

pub use alst::{AlstFramer, Selection};
pub use nov::NovFramer;
pub use psdr::PsdrFramer;
pub use raw::{to_raw_record, RawFramer, RawKind};
pub use sbf::SbfFramer;
pub use ubx::UbxFramer;

/// Signal a payload frame was captured from; fixes the payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Signal {
    /// QZSS L6D/L6E, 250 data bytes after descrambling.
    L6,
    /// Galileo E6B C/NAV page, 492 bits in 62 bytes.
    E6b,
    /// QZSS L1S, 250 bits in 32 bytes.
    L1s,
    /// BeiDou B2b, 486 bits in 62 bytes.
    B2b,
    /// Galileo E1B I/NAV page pair, raw words.
    Inav,
    /// Legacy navigation subframe (GPS/QZSS LNAV), raw words.
    Lnav,
}

impl Signal {
    /// Payload buffer length in bytes, zero-padded in the last byte.
    pub fn data_len(&self) -> usize {
        match self {
            Signal::L6 => 250,
            Signal::E6b => 62,
            Signal::L1s => 32,
            Signal::B2b => 62,
            Signal::Inav => 32,
            Signal::Lnav => 40,
        }
    }
}

bitflags! {
    /// Receiver-reported error bitmap carried on each frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct FrameFlags: u8 {
        const CHECKSUM     = 0x01;
        const PAYLOAD_LEN  = 0x02;
        const DATA_LEN     = 0x04;
        const RS_FAILURE   = 0x08;
        const WEEK_INVALID = 0x10;
        const TOW_INVALID  = 0x20;
    }
}

/// One satellite payload frame, the unit every downstream stage consumes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PayloadFrame {
    pub signal: Signal,
    pub prn: u16,
    pub epoch: Option<GpsTime>,
    /// Carrier-to-noise density, dB-Hz.
    pub cnr: Option<f64>,
    pub flags: FrameFlags,
    pub data: Vec<u8>,
}

impl PayloadFrame {
    pub fn is_healthy(&self) -> bool {
        self.flags.is_empty()
    }
}

pub(crate) type FrameResult = Result<PayloadFrame, StreamError>;

pub(crate) fn framer_error(kind: ErrorKind) -> StreamError {
    StreamError::new(Stage::Framer, kind)
}

/// Growable scan window over a byte source.
///
/// Bytes are appended from the reader on demand and consumed from the front
/// as the sync scan advances.
pub(crate) struct ScanBuffer<R: Read> {
    reader: R,
    buf: Vec<u8>,
    start: usize,
    eof: bool,
}

const READ_CHUNK: usize = 4096;

impl<R: Read> ScanBuffer<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(READ_CHUNK),
            start: 0,
            eof: false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    pub(crate) fn at(&self, i: usize) -> u8 {
        self.buf[self.start + i]
    }

    pub(crate) fn window(&self, from: usize, len: usize) -> &[u8] {
        &self.buf[self.start + from..self.start + from + len]
    }

    /// Try to make at least `want` bytes visible; stops early at EOF.
    pub(crate) fn fill(&mut self, want: usize) -> Result<(), StreamError> {
        while self.len() < want && !self.eof {
            if self.start > READ_CHUNK {
                self.buf.drain(..self.start);
                self.start = 0;
            }
            let mut chunk = [0u8; READ_CHUNK];
            match self.reader.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
                Err(e) => return Err(framer_error(ErrorKind::Io(e.to_string()))),
            }
        }
        Ok(())
    }

    pub(crate) fn drain(&mut self, n: usize) {
        self.start += n.min(self.len());
        if self.start == self.buf.len() {
            self.buf.clear();
            self.start = 0;
        }
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.eof && self.len() == 0
    }
}
