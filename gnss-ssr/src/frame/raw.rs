//! Framer for the raw extracted-payload byte formats the reader tools emit.
//!
//! QZSS L6 files are bare 250-byte frame concatenations (the PRN rides in
//! the L6 header itself); the other signals repeat `{1 byte PRN, payload}`
//! with the payload zero-padded in its last byte.

use std::io::Read;

use crate::error::ErrorKind;
use crate::frame::{framer_error, FrameFlags, FrameResult, PayloadFrame, ScanBuffer, Signal};

/// Payload kind stored in a raw file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    L6,
    E6b,
    L1s,
    B2b,
    Inav,
}

impl RawKind {
    fn signal(self) -> Signal {
        match self {
            RawKind::L6 => Signal::L6,
            RawKind::E6b => Signal::E6b,
            RawKind::L1s => Signal::L1s,
            RawKind::B2b => Signal::B2b,
            RawKind::Inav => Signal::Inav,
        }
    }

    fn record_len(self) -> usize {
        match self {
            // No per-frame framing for L6.
            RawKind::L6 => Signal::L6.data_len(),
            other => 1 + other.signal().data_len(),
        }
    }
}

/// Framer for raw payload files.
pub struct RawFramer<R: Read> {
    scan: ScanBuffer<R>,
    kind: RawKind,
}

impl<R: Read> RawFramer<R> {
    pub fn new(reader: R, kind: RawKind) -> Self {
        Self {
            scan: ScanBuffer::new(reader),
            kind,
        }
    }
}

impl<R: Read> Iterator for RawFramer<R> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        let record_len = self.kind.record_len();
        if let Err(e) = self.scan.fill(record_len) {
            return Some(Err(e));
        }
        if self.scan.at_eof() {
            return None;
        }
        if self.scan.len() < record_len {
            // Truncated trailing record.
            let len = self.scan.len();
            self.scan.drain(len);
            return Some(Err(framer_error(ErrorKind::LengthFail { len })));
        }

        let signal = self.kind.signal();
        let (prn, data) = match self.kind {
            RawKind::L6 => {
                // PRN is the byte after the 32-bit preamble.
                let prn = u16::from(self.scan.at(4));
                (prn, self.scan.window(0, record_len).to_vec())
            },
            _ => {
                let prn = u16::from(self.scan.at(0));
                (prn, self.scan.window(1, signal.data_len()).to_vec())
            },
        };
        self.scan.drain(record_len);

        Some(Ok(PayloadFrame {
            signal,
            prn,
            epoch: None,
            cnr: None,
            flags: FrameFlags::empty(),
            data,
        }))
    }
}

/// Serialize a frame back into the raw file format, the inverse of
/// [RawFramer]. Returns `None` for signals without a raw format.
pub fn to_raw_record(frame: &PayloadFrame) -> Option<Vec<u8>> {
    match frame.signal {
        Signal::L6 => Some(frame.data.clone()),
        Signal::E6b | Signal::L1s | Signal::B2b | Signal::Inav => {
            let mut rec = Vec::with_capacity(1 + frame.signal.data_len());
            rec.push(frame.prn as u8);
            rec.extend_from_slice(&frame.data);
            rec.resize(1 + frame.signal.data_len(), 0);
            Some(rec)
        },
        Signal::Lnav => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l6_records_carry_header_prn() {
        let mut frame = vec![0x1a, 0xcf, 0xfc, 0x1d, 199];
        frame.resize(250, 0);
        let mut bytes = frame.clone();
        bytes.extend_from_slice(&frame);
        let mut framer = RawFramer::new(&bytes[..], RawKind::L6);
        assert_eq!(framer.next().unwrap().unwrap().prn, 199);
        assert_eq!(framer.next().unwrap().unwrap().prn, 199);
        assert!(framer.next().is_none());
    }

    #[test]
    fn prn_prefixed_records() {
        let mut bytes = vec![12u8];
        bytes.extend_from_slice(&[0x5a; 62]);
        let mut framer = RawFramer::new(&bytes[..], RawKind::E6b);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.prn, 12);
        assert_eq!(frame.data.len(), 62);
    }

    #[test]
    fn truncated_tail_is_length_fail() {
        let bytes = vec![0u8; 40]; // not a full L1S record set
        let mut framer = RawFramer::new(&bytes[..], RawKind::L1s);
        assert!(framer.next().unwrap().is_ok());
        assert!(matches!(
            framer.next().unwrap().unwrap_err().kind,
            ErrorKind::LengthFail { .. }
        ));
        assert!(framer.next().is_none());
    }

    #[test]
    fn raw_round_trip() {
        let frame = PayloadFrame {
            signal: Signal::B2b,
            prn: 60,
            epoch: None,
            cnr: None,
            flags: FrameFlags::empty(),
            data: vec![0x33; 62],
        };
        let rec = to_raw_record(&frame).unwrap();
        let mut framer = RawFramer::new(&rec[..], RawKind::B2b);
        let back = framer.next().unwrap().unwrap();
        assert_eq!(back.prn, 60);
        assert_eq!(back.data, frame.data);
    }
}
