//! RTCM 3 framing, decoding and the CSSR envelope encoder.
//!
//! Frames are `D3`, six zero bits, a 10-bit payload length, the payload and
//! CRC-24Q over header plus payload. The framer tolerates arbitrary garbage
//! between frames and resynchronizes byte by byte.

use std::io::Read;

use log::trace;

use crate::bits::BitCursor;
use crate::crc::crc24q;
use crate::error::{ErrorKind, Stage, StreamError};
use crate::frame::ScanBuffer;

mod eph;
mod msm;
mod ssr;
mod station;

pub use eph::{Ephemeris, GlonassEphemeris, KeplerEphemeris};
pub use msm::{MsmCell, MsmMessage, MsmSatellite};
pub use ssr::{SsrBias, SsrClock, SsrHeader, SsrKind, SsrMessage, SsrOrbit};
pub use station::{AntennaDescriptor, ReferenceStation};

/// Frame sync byte.
pub const SYNC: u8 = 0xd3;
const HEADER_LEN: usize = 3;
const CRC_LEN: usize = 3;
/// Payload length is 10 bits.
pub const MAX_PAYLOAD_LEN: usize = 1023;

/// The CSSR envelope message number.
pub const CSSR_ENVELOPE_TYPE: u16 = 4073;

/// One CRC-checked RTCM frame, stored with its framing bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcmFrame {
    data: Vec<u8>,
}

impl RtcmFrame {
    /// Wrap and validate a complete frame (sync through CRC).
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ErrorKind> {
        if data.len() < HEADER_LEN + CRC_LEN || data[0] != SYNC {
            return Err(ErrorKind::SyncLost);
        }
        if data[1] & 0xfc != 0 {
            return Err(ErrorKind::SyncLost);
        }
        let len = usize::from(u16::from_be_bytes([data[1], data[2]]) & 0x03ff);
        if data.len() != HEADER_LEN + len + CRC_LEN {
            return Err(ErrorKind::LengthFail { len: data.len() });
        }
        let got = crc24q(&data[..HEADER_LEN + len]);
        let expect = u32::from(data[HEADER_LEN + len]) << 16
            | u32::from(data[HEADER_LEN + len + 1]) << 8
            | u32::from(data[HEADER_LEN + len + 2]);
        if got != expect {
            return Err(ErrorKind::ChecksumFail { expect, got });
        }
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn payload(&self) -> &[u8] {
        let len = usize::from(u16::from_be_bytes([self.data[1], self.data[2]]) & 0x03ff);
        &self.data[HEADER_LEN..HEADER_LEN + len]
    }

    /// The 12-bit message type opening the payload.
    pub fn message_type(&self) -> u16 {
        let p = self.payload();
        if p.is_empty() {
            return 0;
        }
        let hi = u16::from(p[0]) << 4;
        let lo = p.get(1).map(|b| u16::from(*b) >> 4).unwrap_or(0);
        hi | lo
    }

    /// Decode the payload into a typed message.
    pub fn decode(&self) -> Result<RtcmMessage, ErrorKind> {
        let payload = self.payload();
        let mut cur = BitCursor::new(payload);
        let msg_type = cur.take(12)? as u16;

        match msg_type {
            1005 => Ok(RtcmMessage::ReferenceStation(station::decode_1005(
                &mut cur,
            )?)),
            1007 | 1008 | 1033 => Ok(RtcmMessage::AntennaDescriptor(
                station::decode_antenna(msg_type, &mut cur)?,
            )),
            1019 | 1020 | 1041 | 1042 | 1044 | 1045 | 1046 => Ok(RtcmMessage::Ephemeris(
                eph::decode(msg_type, &mut cur)?,
            )),
            1057..=1068 => Ok(RtcmMessage::Ssr(ssr::decode(msg_type, &mut cur)?)),
            1071..=1127 => Ok(RtcmMessage::Msm(msm::decode(msg_type, &mut cur)?)),
            CSSR_ENVELOPE_TYPE => Ok(RtcmMessage::CssrEnvelope {
                payload: payload.to_vec(),
            }),
            other => {
                trace!("rtcm: unhandled message type {other}");
                Ok(RtcmMessage::Unknown {
                    msg_type: other,
                    payload: payload.to_vec(),
                })
            },
        }
    }
}

/// Typed RTCM message.
#[derive(Debug, Clone, PartialEq)]
pub enum RtcmMessage {
    ReferenceStation(ReferenceStation),
    AntennaDescriptor(AntennaDescriptor),
    Ephemeris(Ephemeris),
    Ssr(SsrMessage),
    Msm(MsmMessage),
    /// Compact SSR bitstream carried unchanged; the payload starts with the
    /// 4073 message number.
    CssrEnvelope { payload: Vec<u8> },
    Unknown { msg_type: u16, payload: Vec<u8> },
}

/// Frame an arbitrary payload: header, length, CRC-24Q.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
    frame.push(SYNC);
    frame.push((payload.len() >> 8) as u8);
    frame.push((payload.len() & 0xff) as u8);
    frame.extend_from_slice(payload);
    let crc = crc24q(&frame);
    frame.push((crc >> 16) as u8);
    frame.push((crc >> 8) as u8);
    frame.push(crc as u8);
    frame
}

/// Package a CSSR bitstream (which already opens with message number 4073)
/// as an RTCM envelope frame.
pub fn encode_cssr_envelope(cssr_payload: &[u8]) -> Vec<u8> {
    encode_frame(cssr_payload)
}

/// Streaming RTCM framer.
pub struct RtcmFramer<R: Read> {
    scan: ScanBuffer<R>,
}

impl<R: Read> RtcmFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            scan: ScanBuffer::new(reader),
        }
    }
}

impl<R: Read> Iterator for RtcmFramer<R> {
    type Item = Result<RtcmFrame, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Err(e) = self.scan.fill(HEADER_LEN + CRC_LEN) {
                return Some(Err(e));
            }
            if self.scan.len() < HEADER_LEN + CRC_LEN {
                return None;
            }

            let pos = (0..self.scan.len()).find(|&i| self.scan.at(i) == SYNC);
            match pos {
                Some(p) => self.scan.drain(p),
                None => {
                    let n = self.scan.len();
                    self.scan.drain(n);
                    continue;
                },
            }
            if self.scan.len() < HEADER_LEN + CRC_LEN {
                continue;
            }

            // Upper six bits of the length word must be zero.
            if self.scan.at(1) & 0xfc != 0 {
                self.scan.drain(1);
                continue;
            }
            let len = usize::from(
                u16::from_be_bytes([self.scan.at(1), self.scan.at(2)]) & 0x03ff,
            );
            let frame_len = HEADER_LEN + len + CRC_LEN;
            if let Err(e) = self.scan.fill(frame_len) {
                return Some(Err(e));
            }
            if self.scan.len() < frame_len {
                return None;
            }

            let got = crc24q(self.scan.window(0, HEADER_LEN + len));
            let expect = u32::from(self.scan.at(HEADER_LEN + len)) << 16
                | u32::from(self.scan.at(HEADER_LEN + len + 1)) << 8
                | u32::from(self.scan.at(HEADER_LEN + len + 2));
            if got != expect {
                self.scan.drain(1);
                return Some(Err(StreamError::new(
                    Stage::Rtcm,
                    ErrorKind::ChecksumFail { expect, got },
                )));
            }

            let data = self.scan.window(0, frame_len).to_vec();
            self.scan.drain(frame_len);
            return Some(Ok(RtcmFrame { data }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payload_with_type(msg_type: u16, extra: &[u8]) -> Vec<u8> {
        let mut p = vec![(msg_type >> 4) as u8, ((msg_type & 0x0f) as u8) << 4];
        p.extend_from_slice(extra);
        p
    }

    #[test]
    fn framer_finds_frame_in_garbage() {
        let payload = payload_with_type(1005, &[0u8; 17]);
        let mut bytes = vec![0x00, 0xff, 0xd3, 0x12]; // decoys, including a fake sync
        bytes.extend_from_slice(&encode_frame(&payload));
        bytes.push(0x55);

        let mut framer = RtcmFramer::new(&bytes[..]);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.message_type(), 1005);
        assert!(framer.next().is_none());
    }

    #[test]
    fn nonzero_reserved_bits_force_resync() {
        // A D3 followed by a length word with reserved bits set is garbage.
        let mut bytes = vec![0xd3, 0x40, 0x00];
        bytes.extend_from_slice(&encode_frame(&payload_with_type(1074, &[0u8; 8])));
        let mut framer = RtcmFramer::new(&bytes[..]);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.message_type(), 1074);
    }

    #[test]
    fn crc_failure_is_tagged_and_recovered() {
        let mut bytes = encode_frame(&payload_with_type(1005, &[1, 2, 3]));
        bytes[4] ^= 0xff;
        bytes.extend_from_slice(&encode_frame(&payload_with_type(1006, &[4, 5, 6])));
        let mut framer = RtcmFramer::new(&bytes[..]);
        let err = framer.next().unwrap().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ChecksumFail { .. }));
        assert_eq!(framer.next().unwrap().unwrap().message_type(), 1006);
    }

    #[test]
    fn from_bytes_validates() {
        let frame = encode_frame(&payload_with_type(4073, &[0xab; 10]));
        assert!(RtcmFrame::from_bytes(frame.clone()).is_ok());
        let mut bad = frame;
        let last = bad.len() - 1;
        bad[last] ^= 1;
        assert!(matches!(
            RtcmFrame::from_bytes(bad),
            Err(ErrorKind::ChecksumFail { .. })
        ));
    }

    #[test]
    fn cssr_envelope_round_trip() {
        let payload = payload_with_type(4073, &[0x42; 30]);
        let framed = encode_cssr_envelope(&payload);
        let frame = RtcmFrame::from_bytes(framed).unwrap();
        match frame.decode().unwrap() {
            RtcmMessage::CssrEnvelope { payload: back } => assert_eq!(back, payload),
            other => panic!("unexpected {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn round_trip_any_payload(payload in prop::collection::vec(any::<u8>(), 1..=1023)) {
            let framed = encode_frame(&payload);
            let frame = RtcmFrame::from_bytes(framed.clone()).unwrap();
            prop_assert_eq!(frame.payload(), &payload[..]);

            // The framer recovers the same frame from a dirty stream.
            let mut dirty = vec![0x1a, 0xd3];
            dirty.extend_from_slice(&framed);
            let mut framer = RtcmFramer::new(&dirty[..]);
            loop {
                match framer.next() {
                    Some(Ok(f)) => {
                        prop_assert_eq!(f.payload(), &payload[..]);
                        break;
                    },
                    Some(Err(_)) => continue, // decoy sync may fail CRC
                    None => prop_assert!(false, "frame lost"),
                }
            }
        }
    }
}
