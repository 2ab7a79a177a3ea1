//! QZSS L6 transport layer.
//!
//! A 2000-bit L6 frame is preamble, PRN, a vendor/facility byte, the alert
//! flag, a 1695-bit data part and Reed-Solomon parity (already verified by
//! the receiver; frames arriving here carry the receiver's verdict in their
//! flags). Five consecutive frames form one subframe whose concatenated
//! data parts hold either compact SSR messages (CLAS, MADOCA-PPP) or plain
//! RTCM frames (MADOCA).

use std::collections::HashMap;

use log::{debug, trace};

use crate::bits::{BitCursor, BitWriter};
use crate::crc::crc24q;
use crate::error::{ErrorKind, Stage, StreamError};
use crate::frame::PayloadFrame;

/// L6 frame preamble.
pub const PREAMBLE: u32 = 0x1acf_fc1d;

/// Bits of payload per frame and per assembled subframe.
pub const DATA_PART_BITS: usize = 1695;
pub const SUBFRAME_BITS: usize = 5 * DATA_PART_BITS;
pub const FRAMES_PER_SUBFRAME: usize = 5;

/// Service broadcast in the L6 message-class byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Vendor {
    Madoca,
    MadocaPpp,
    Qznma,
    Clas,
    Reserved(u8),
}

impl Vendor {
    fn from_bits(v: u8) -> Self {
        match v {
            1 => Vendor::Madoca,
            2 => Vendor::MadocaPpp,
            3 => Vendor::Qznma,
            5 => Vendor::Clas,
            other => Vendor::Reserved(other),
        }
    }
}

impl core::fmt::Display for Vendor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Vendor::Madoca => f.write_str("MADOCA"),
            Vendor::MadocaPpp => f.write_str("MADOCA-PPP"),
            Vendor::Qznma => f.write_str("QZNMA"),
            Vendor::Clas => f.write_str("CLAS"),
            Vendor::Reserved(v) => write!(f, "reserved({v})"),
        }
    }
}

/// Message-generating facility: site and unit number.
pub fn facility_name(facility: u8) -> String {
    let site = match facility >> 1 {
        0 => "Kobe",
        _ => "Hitachi-Ota",
    };
    format!("{site}:{}", facility & 1)
}

/// Decoded L6 frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct L6Header {
    pub prn: u16,
    pub vendor: Vendor,
    pub facility: u8,
    pub subframe_indicator: bool,
    pub alert: bool,
}

/// Decode the header of a 250-byte L6 frame; the cursor is left at the
/// first data-part bit.
pub fn decode_header<'a>(data: &'a [u8]) -> Result<(L6Header, BitCursor<'a>), ErrorKind> {
    let mut cur = BitCursor::new(data);
    let need = 32 + 8 + 8 + 1 + DATA_PART_BITS;
    if cur.remaining() < need {
        return Err(ErrorKind::ShortPayload {
            need,
            have: cur.remaining(),
        });
    }
    let preamble = cur.take(32).map_err(ErrorKind::from)? as u32;
    if preamble != PREAMBLE {
        return Err(ErrorKind::SyncLost);
    }
    let prn = cur.take(8).map_err(ErrorKind::from)? as u16;
    let vendor = Vendor::from_bits(cur.take(3).map_err(ErrorKind::from)? as u8);
    let facility = cur.take(2).map_err(ErrorKind::from)? as u8;
    cur.advance(2).map_err(ErrorKind::from)?; // reserved
    let subframe_indicator = cur.take_bool().map_err(ErrorKind::from)?;
    let alert = cur.take_bool().map_err(ErrorKind::from)?;

    Ok((
        L6Header {
            prn,
            vendor,
            facility,
            subframe_indicator,
            alert,
        },
        cur,
    ))
}

/// One assembled subframe: five data parts as a single bit buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Subframe {
    pub prn: u16,
    pub vendor: Vendor,
    pub facility: u8,
    pub alert: bool,
    pub data: Vec<u8>,
    pub bit_len: usize,
    /// Data parts collected; fewer than five for a flushed partial.
    pub parts: usize,
    /// False when the subframe was flushed early by a new indicator bit.
    pub complete: bool,
}

#[derive(Default)]
struct PartialSubframe {
    vendor: Option<Vendor>,
    facility: u8,
    alert: bool,
    buf: BitWriter,
    parts: usize,
}

/// Collects L6 frames into subframes, keyed per PRN.
#[derive(Default)]
pub struct SubframeAssembler {
    streams: HashMap<u16, PartialSubframe>,
}

impl SubframeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one L6 payload frame. Returns zero, one or two subframes: a
    /// flushed partial (null-terminated early) and/or a completed one.
    pub fn push(&mut self, frame: &PayloadFrame) -> Result<Vec<Subframe>, StreamError> {
        let tag_err = |kind: ErrorKind| {
            let mut e = StreamError::new(Stage::Reassembler, kind).with_prn(frame.prn);
            if let Some(epoch) = frame.epoch {
                e = e.with_tow(epoch.tow);
            }
            e
        };

        if !frame.is_healthy() {
            // A bad frame punches a hole in the subframe; what was gathered
            // cannot be trusted any more.
            trace!("l6: dropping partial for prn {} (frame flags {:?})", frame.prn, frame.flags);
            self.streams.remove(&frame.prn);
            return Ok(Vec::new());
        }

        let (header, mut cur) = decode_header(&frame.data).map_err(tag_err)?;
        let mut out = Vec::new();

        let partial = self.streams.entry(header.prn).or_default();
        if header.subframe_indicator {
            if partial.parts > 0 {
                let flushed = take_subframe(header.prn, partial, false);
                debug!(
                    "l6: prn {} flushing partial subframe ({} parts, null-terminated)",
                    header.prn, flushed.parts
                );
                out.push(flushed);
            }
            partial.vendor = Some(header.vendor);
            partial.facility = header.facility;
            partial.alert = header.alert;
        } else if partial.parts == 0 {
            // Still syncing: wait for the first indicator bit.
            return Ok(out);
        }

        partial.alert |= header.alert;
        partial
            .buf
            .put_cursor(&mut cur, DATA_PART_BITS)
            .map_err(|e| tag_err(e.into()))?;
        partial.parts += 1;

        if partial.parts == FRAMES_PER_SUBFRAME {
            out.push(take_subframe(header.prn, partial, true));
        }
        Ok(out)
    }
}

fn take_subframe(prn: u16, partial: &mut PartialSubframe, complete: bool) -> Subframe {
    let buf = std::mem::take(&mut partial.buf);
    let parts = partial.parts;
    partial.parts = 0;
    Subframe {
        prn,
        vendor: partial.vendor.unwrap_or(Vendor::Reserved(0)),
        facility: partial.facility,
        alert: partial.alert,
        bit_len: buf.bit_len(),
        data: buf.into_bytes(),
        parts,
        complete,
    }
}

/// Extracts RTCM frames packed into MADOCA L6E data parts.
///
/// Messages are bit-contiguous and may span data-part and subframe
/// boundaries, so the extractor keeps the unconsumed tail across pushes.
#[derive(Default)]
pub struct MadocaExtractor {
    buf: BitWriter,
    consumed: usize,
}

impl MadocaExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a data part and drain every complete RTCM frame.
    pub fn push(
        &mut self,
        data: &[u8],
        bit_len: usize,
        prn: u16,
        tow: Option<u32>,
    ) -> (Vec<Vec<u8>>, Vec<StreamError>) {
        let mut frames = Vec::new();
        let mut errors = Vec::new();
        let mut cur = BitCursor::with_len(data, bit_len);
        if self.buf.put_cursor(&mut cur, bit_len).is_err() {
            return (frames, errors);
        }

        let tag_err = |kind: ErrorKind| {
            let mut e = StreamError::new(Stage::Reassembler, kind).with_prn(prn);
            if let Some(t) = tow {
                e = e.with_tow(t);
            }
            e
        };

        loop {
            let bytes = self.buf.as_bytes();
            let mut cur = BitCursor::with_len(bytes, self.buf.bit_len());
            if cur.advance(self.consumed).is_err() {
                break;
            }
            if cur.remaining() < 48 {
                break;
            }
            let preamble = cur.peek(8).unwrap_or(0);
            if preamble != 0xd3 {
                if cur.rest_is_zero() {
                    // Trailing fill; wait for the next data part.
                    self.reset();
                } else {
                    errors.push(tag_err(ErrorKind::SyncLost));
                    self.reset();
                }
                break;
            }

            let header = cur.peek(24).unwrap_or(0);
            let length = (header & 0x3ff) as usize;
            let frame_bits = (3 + length + 3) * 8;
            if cur.remaining() < frame_bits {
                break;
            }

            let mut frame_cur = cur;
            let frame = match frame_cur.take_bytes(3 + length + 3) {
                Ok(f) => f,
                Err(_) => break,
            };
            let crc_expect = u32::from(frame[3 + length]) << 16
                | u32::from(frame[3 + length + 1]) << 8
                | u32::from(frame[3 + length + 2]);
            let crc_got = crc24q(&frame[..3 + length]);
            if crc_got != crc_expect {
                errors.push(tag_err(ErrorKind::ChecksumFail {
                    expect: crc_expect,
                    got: crc_got,
                }));
                self.reset();
                break;
            }

            self.consumed += frame_bits;
            frames.push(frame);
        }

        self.compact();
        (frames, errors)
    }

    fn reset(&mut self) {
        self.buf = BitWriter::new();
        self.consumed = 0;
    }

    fn compact(&mut self) {
        // Drop consumed whole bytes off the front so the buffer stays
        // bounded by one message plus a data part.
        let drop_bytes = self.consumed / 8;
        if drop_bytes == 0 {
            return;
        }
        let bit_len = self.buf.bit_len() - drop_bytes * 8;
        let bytes = self.buf.as_bytes()[drop_bytes..].to_vec();
        let mut fresh = BitWriter::new();
        let mut cur = BitCursor::with_len(&bytes, bit_len);
        if fresh.put_cursor(&mut cur, bit_len).is_ok() {
            self.buf = fresh;
            self.consumed -= drop_bytes * 8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameFlags, Signal};

    pub(crate) fn build_l6_frame(
        prn: u16,
        vendor: u8,
        facility: u8,
        sfi: bool,
        alert: bool,
        payload_bits: &[u8],
    ) -> PayloadFrame {
        let mut w = BitWriter::new();
        w.put(32, u64::from(PREAMBLE));
        w.put(8, u64::from(prn));
        w.put(3, u64::from(vendor));
        w.put(2, u64::from(facility));
        w.put(2, 0);
        w.put(1, u64::from(sfi));
        w.put(1, u64::from(alert));
        let mut cur = BitCursor::new(payload_bits);
        w.put_cursor(&mut cur, DATA_PART_BITS).unwrap();
        w.put_bytes(&[0u8; 32]); // parity placeholder; the receiver already checked it
        let mut data = w.into_bytes();
        data.resize(250, 0);
        PayloadFrame {
            signal: Signal::L6,
            prn,
            epoch: None,
            cnr: None,
            flags: FrameFlags::empty(),
            data,
        }
    }

    #[test]
    fn header_fields_round_trip() {
        let payload = vec![0u8; 212];
        let frame = build_l6_frame(199, 5, 3, true, false, &payload);
        let (header, _) = decode_header(&frame.data).unwrap();
        assert_eq!(header.prn, 199);
        assert_eq!(header.vendor, Vendor::Clas);
        assert_eq!(header.facility, 3);
        assert!(header.subframe_indicator);
        assert!(!header.alert);
        assert_eq!(facility_name(header.facility), "Hitachi-Ota:1");
    }

    #[test]
    fn five_frames_make_a_subframe() {
        let payload = vec![0xaa; 212];
        let mut asm = SubframeAssembler::new();
        let mut got = Vec::new();
        for i in 0..5 {
            let frame = build_l6_frame(199, 5, 3, i == 0, false, &payload);
            got.extend(asm.push(&frame).unwrap());
        }
        assert_eq!(got.len(), 1);
        let sf = &got[0];
        assert_eq!(sf.bit_len, SUBFRAME_BITS);
        assert_eq!(sf.parts, 5);
        assert!(sf.complete);
        assert_eq!(sf.vendor, Vendor::Clas);
    }

    #[test]
    fn early_indicator_flushes_partial() {
        let payload = vec![0x55; 212];
        let mut asm = SubframeAssembler::new();
        let mut got = Vec::new();
        for i in 0..3 {
            let frame = build_l6_frame(199, 5, 3, i == 0, false, &payload);
            got.extend(asm.push(&frame).unwrap());
        }
        assert!(got.is_empty());
        // New subframe start before the old one had five parts.
        let frame = build_l6_frame(199, 5, 3, true, false, &payload);
        got.extend(asm.push(&frame).unwrap());
        assert_eq!(got.len(), 1);
        assert!(!got[0].complete);
        assert_eq!(got[0].parts, 3);
    }

    #[test]
    fn frames_before_first_indicator_are_ignored() {
        let payload = vec![0x11; 212];
        let mut asm = SubframeAssembler::new();
        let frame = build_l6_frame(199, 5, 3, false, false, &payload);
        assert!(asm.push(&frame).unwrap().is_empty());
        // Nothing buffered: a full subframe still needs five frames.
        let mut got = Vec::new();
        for i in 0..5 {
            let frame = build_l6_frame(199, 5, 3, i == 0, false, &payload);
            got.extend(asm.push(&frame).unwrap());
        }
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn unhealthy_frame_resets_stream() {
        let payload = vec![0x11; 212];
        let mut asm = SubframeAssembler::new();
        for i in 0..3 {
            let frame = build_l6_frame(199, 5, 3, i == 0, false, &payload);
            asm.push(&frame).unwrap();
        }
        let mut bad = build_l6_frame(199, 5, 3, false, false, &payload);
        bad.flags |= FrameFlags::RS_FAILURE;
        assert!(asm.push(&bad).unwrap().is_empty());
        // The stream must re-sync on a fresh indicator.
        let frame = build_l6_frame(199, 5, 3, false, false, &payload);
        assert!(asm.push(&frame).unwrap().is_empty());
    }

    #[test]
    fn per_prn_streams_are_independent() {
        let payload = vec![0x33; 212];
        let mut asm = SubframeAssembler::new();
        let mut got = Vec::new();
        for i in 0..5 {
            got.extend(asm.push(&build_l6_frame(199, 5, 3, i == 0, false, &payload)).unwrap());
            got.extend(asm.push(&build_l6_frame(204, 5, 2, i == 0, false, &payload)).unwrap());
        }
        assert_eq!(got.len(), 2);
        assert_ne!(got[0].prn, got[1].prn);
    }

    fn rtcm_frame(payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0xd3, 0, 0];
        f[1] = ((payload.len() >> 8) & 0x03) as u8;
        f[2] = (payload.len() & 0xff) as u8;
        f.extend_from_slice(payload);
        let crc = crc24q(&f);
        f.push((crc >> 16) as u8);
        f.push((crc >> 8) as u8);
        f.push(crc as u8);
        f
    }

    #[test]
    fn madoca_extraction_across_parts() {
        let frame = rtcm_frame(&[0x41u8; 100]); // 106 bytes = 848 bits
        let mut stream = BitWriter::new();
        stream.put_bytes(&frame);
        stream.put_bytes(&rtcm_frame(&[0x42u8; 150]));
        stream.pad_to_byte();
        let bytes = stream.into_bytes();

        // Split into 1695-bit data parts.
        let mut parts = Vec::new();
        let mut cur = BitCursor::new(&bytes);
        while cur.remaining() > 0 {
            let n = cur.remaining().min(DATA_PART_BITS);
            let mut w = BitWriter::new();
            w.put_cursor(&mut cur, n).unwrap();
            w.pad_to_byte();
            parts.push((w.as_bytes().to_vec(), n));
        }
        assert!(parts.len() >= 2);

        let mut ex = MadocaExtractor::new();
        let mut all = Vec::new();
        for (data, bits) in &parts {
            let (frames, errors) = ex.push(data, *bits, 209, None);
            assert!(errors.is_empty(), "{errors:?}");
            all.extend(frames);
        }
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], rtcm_frame(&[0x41u8; 100]));
        assert_eq!(all[1], rtcm_frame(&[0x42u8; 150]));
    }

    #[test]
    fn madoca_crc_failure_resets() {
        let mut frame = rtcm_frame(&[0x41u8; 20]);
        let mid = frame.len() / 2;
        frame[mid] ^= 0xff;
        let mut ex = MadocaExtractor::new();
        let (frames, errors) = ex.push(&frame, frame.len() * 8, 209, Some(1000));
        assert!(frames.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, ErrorKind::ChecksumFail { .. }));
        assert_eq!(errors[0].tow, Some(1000));
    }
}
