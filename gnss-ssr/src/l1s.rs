//! QZSS L1S: SLAS sub-meter corrections and DC Reports.
//!
//! A 250-bit L1S message is preamble (8), message type (6), 212 data bits
//! and CRC-24 over everything before it. The SLAS messages interpreted here
//! are the PRN mask (MT48), data issue numbers (MT49) and the per-station
//! DGPS corrections (MT50); DC Report (MT43) and DCX (MT44) pass through
//! with optional NMEA re-emission for downstream disaster-warning
//! consumers.

use log::trace;

use crate::bits::{BitCursor, OutOfBits};
use crate::crc::crc24q_bits;
use crate::error::{ErrorKind, Stage, StreamError};
use crate::frame::PayloadFrame;
use crate::sat::{Constellation, Satellite};

/// Message length on the wire.
pub const MESSAGE_BITS: usize = 250;
const DATA_BITS: usize = 212;
const CRC_BITS: usize = 24;

/// The rotating SBAS preamble set.
const PREAMBLES: [u8; 3] = [0x53, 0x9a, 0xc6];

/// DGPS pseudorange correction: 12 bits, 0.04 m.
const PRC_SCALE: f64 = 0.04;

/// SLAS ground monitoring stations, indexed by station id.
pub const STATIONS: [&str; 13] = [
    "Sapporo",
    "Sendai",
    "Hitachi-Ota",
    "Komatsu",
    "Kobe",
    "Hiroshima",
    "Fukuoka",
    "Tanegashima",
    "Amami",
    "Itoman",
    "Miyako",
    "Ishigaki",
    "Chichijima",
];

pub fn station_name(id: u8) -> &'static str {
    STATIONS.get(usize::from(id)).copied().unwrap_or("unknown")
}

/// SLAS PRN mask (MT48).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlasMask {
    pub iodp: u8,
    pub sats: Vec<Satellite>,
}

/// Decoded L1S message body.
#[derive(Debug, Clone, PartialEq)]
pub enum L1sBody {
    Test,
    /// JMA disaster/crisis report, raw 212 data bits.
    DcReport(Vec<u8>),
    /// Extended DC report.
    Dcx(Vec<u8>),
    PrnMask(SlasMask),
    /// Issue-of-data per masked satellite.
    DataIssue(Vec<(Satellite, u8)>),
    Dgps {
        station: u8,
        corrections: Vec<(Satellite, Option<f64>)>,
    },
    Other {
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct L1sMessage {
    pub prn: u16,
    pub mt: u8,
    pub body: L1sBody,
}

/// Stateful L1S decoder (the PRN mask persists across messages).
#[derive(Default)]
pub struct L1sDecoder {
    mask: Option<SlasMask>,
}

impl L1sDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> Option<&SlasMask> {
        self.mask.as_ref()
    }

    pub fn decode(&mut self, frame: &PayloadFrame) -> Result<L1sMessage, StreamError> {
        let tag = |kind: ErrorKind| StreamError::new(Stage::Decoder, kind).with_prn(frame.prn);

        if frame.data.len() * 8 < MESSAGE_BITS {
            return Err(tag(ErrorKind::ShortPayload {
                need: MESSAGE_BITS,
                have: frame.data.len() * 8,
            }));
        }

        let mut cur = BitCursor::with_len(&frame.data, MESSAGE_BITS);
        let preamble = cur.take(8).map_err(|e| tag(e.into()))? as u8;
        if !PREAMBLES.contains(&preamble) {
            return Err(tag(ErrorKind::SyncLost));
        }

        let crc_got = crc24q_bits(&frame.data, 8 + 6 + DATA_BITS);
        let mut crc_cur = cur;
        crc_cur
            .advance(6 + DATA_BITS)
            .map_err(|e| tag(e.into()))?;
        let crc_expect = crc_cur.take(CRC_BITS).map_err(|e| tag(e.into()))? as u32;
        if crc_got != crc_expect {
            return Err(tag(ErrorKind::ChecksumFail {
                expect: crc_expect,
                got: crc_got,
            }));
        }

        let mt = cur.take(6).map_err(|e| tag(e.into()))? as u8;
        let body = self.decode_body(mt, &mut cur).map_err(|e| tag(e.into()))?;
        trace!("l1s: prn {} mt {}", frame.prn, mt);
        Ok(L1sMessage {
            prn: frame.prn,
            mt,
            body,
        })
    }

    fn decode_body(&mut self, mt: u8, cur: &mut BitCursor<'_>) -> Result<L1sBody, OutOfBits> {
        Ok(match mt {
            0 => L1sBody::Test,
            43 => L1sBody::DcReport(cur.take_bytes(DATA_BITS / 8)?),
            44 => L1sBody::Dcx(cur.take_bytes(DATA_BITS / 8)?),
            48 => {
                // GPS then QZSS masks, then the issue-of-data PRN.
                let mut sats = Vec::new();
                for prn in 1..=32u16 {
                    if cur.take_bool()? {
                        sats.push(Satellite::new(Constellation::Gps, prn));
                    }
                }
                for i in 0..10u16 {
                    if cur.take_bool()? {
                        sats.push(Satellite::new(Constellation::Qzss, 193 + i));
                    }
                }
                let iodp = cur.take(2)? as u8;
                let mask = SlasMask { iodp, sats };
                self.mask = Some(mask.clone());
                L1sBody::PrnMask(mask)
            },
            49 => {
                let sats = self.masked_sats();
                let mut issues = Vec::new();
                for sat in sats {
                    if cur.remaining() < 8 {
                        break;
                    }
                    issues.push((sat, cur.take(8)? as u8));
                }
                L1sBody::DataIssue(issues)
            },
            50 => {
                let station = cur.take(8)? as u8;
                let sats = self.masked_sats();
                let mut corrections = Vec::new();
                for sat in sats {
                    if cur.remaining() < 12 {
                        break;
                    }
                    let raw = cur.take_signed(12)?;
                    let prc = if raw == -(1 << 11) {
                        None
                    } else {
                        Some(raw as f64 * PRC_SCALE)
                    };
                    corrections.push((sat, prc));
                }
                L1sBody::Dgps {
                    station,
                    corrections,
                }
            },
            _ => L1sBody::Other {
                data: cur.take_bytes(DATA_BITS / 8)?,
            },
        })
    }

    fn masked_sats(&self) -> Vec<Satellite> {
        self.mask.as_ref().map(|m| m.sats.clone()).unwrap_or_default()
    }
}

/// Render a DC Report as the conventional NMEA duplicate.
///
/// The satellite id is the SBAS-overlay PRN minus 128; the payload is the
/// first 63 hex digits (252 bits, zero-padded) of the message.
pub fn dc_report_nmea(prn: u16, frame_data: &[u8]) -> String {
    let id = prn.saturating_sub(128);
    let mut hex = String::with_capacity(63);
    for (i, byte) in frame_data.iter().take(32).enumerate() {
        if i < 31 {
            hex.push_str(&format!("{byte:02X}"));
        } else {
            hex.push_str(&format!("{:X}", byte >> 4));
        }
    }
    let body = format!("QZQSM,{id},{hex}");
    let ck = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${body}*{ck:02X}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;
    use crate::frame::{FrameFlags, Signal};

    pub(crate) fn l1s_frame(prn: u16, mt: u8, fill: impl FnOnce(&mut BitWriter)) -> PayloadFrame {
        let mut w = BitWriter::new();
        w.put(8, u64::from(PREAMBLES[0]));
        w.put(6, u64::from(mt));
        fill(&mut w);
        while w.bit_len() < 8 + 6 + DATA_BITS {
            w.put(1, 0);
        }
        let crc = crc24q_bits(w.as_bytes(), 8 + 6 + DATA_BITS);
        w.put(24, u64::from(crc));
        let mut data = w.into_bytes();
        data.resize(Signal::L1s.data_len(), 0);
        PayloadFrame {
            signal: Signal::L1s,
            prn,
            epoch: None,
            cnr: None,
            flags: FrameFlags::empty(),
            data,
        }
    }

    #[test]
    fn mask_then_dgps() {
        let mut dec = L1sDecoder::new();
        let mask = l1s_frame(186, 48, |w| {
            w.put(32, (1 << (32 - 16)) | (1 << (32 - 26))); // G16, G26
            w.put(10, 0);
            w.put(2, 1); // iodp
        });
        let msg = dec.decode(&mask).unwrap();
        let L1sBody::PrnMask(mask) = &msg.body else {
            panic!("expected mask");
        };
        assert_eq!(mask.sats.len(), 2);
        assert_eq!(mask.sats[0].to_string(), "G16");

        let dgps = l1s_frame(186, 50, |w| {
            w.put(8, 0); // Sapporo
            w.put_signed(12, -77); // -3.08 m
            w.put_signed(12, 25); // 1.00 m
        });
        let msg = dec.decode(&dgps).unwrap();
        let L1sBody::Dgps {
            station,
            corrections,
        } = &msg.body
        else {
            panic!("expected dgps");
        };
        assert_eq!(station_name(*station), "Sapporo");
        assert_eq!(corrections[0].0.to_string(), "G16");
        assert!((corrections[0].1.unwrap() + 3.08).abs() < 1e-9);
        assert!((corrections[1].1.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn crc_failure_rejected() {
        let mut frame = l1s_frame(186, 0, |_| {});
        frame.data[10] ^= 0x40;
        let mut dec = L1sDecoder::new();
        let err = dec.decode(&frame).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ChecksumFail { .. }));
        assert_eq!(err.prn, Some(186));
    }

    #[test]
    fn bad_preamble_is_sync_lost() {
        let mut frame = l1s_frame(186, 0, |_| {});
        frame.data[0] = 0x12;
        let mut dec = L1sDecoder::new();
        assert_eq!(dec.decode(&frame).unwrap_err().kind, ErrorKind::SyncLost);
    }

    #[test]
    fn dgps_invalid_prc_is_none() {
        let mut dec = L1sDecoder::new();
        let mask = l1s_frame(186, 48, |w| {
            w.put(32, 1 << (32 - 1)); // G01
            w.put(10, 0);
            w.put(2, 0);
        });
        dec.decode(&mask).unwrap();
        let dgps = l1s_frame(186, 50, |w| {
            w.put(8, 2);
            w.put_signed(12, -(1 << 11));
        });
        let msg = dec.decode(&dgps).unwrap();
        let L1sBody::Dgps { corrections, .. } = &msg.body else {
            panic!("expected dgps");
        };
        assert_eq!(corrections[0].1, None);
    }

    #[test]
    fn dc_report_nmea_shape() {
        let frame = l1s_frame(183, 43, |w| {
            w.put(32, 0xdead_beef);
        });
        let sentence = dc_report_nmea(frame.prn, &frame.data);
        assert!(sentence.starts_with("$QZQSM,55,"));
        assert!(sentence.contains('*'));
        // 63 hex digits between the second comma and the checksum.
        let payload = sentence.split(',').nth(2).unwrap();
        let payload = payload.split('*').next().unwrap();
        assert_eq!(payload.len(), 63);
    }
}
