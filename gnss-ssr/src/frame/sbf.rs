//! Septentrio SBF framer.
//!
//! Blocks open with `$@`, then a little-endian CRC-16-CCITT, the block
//! id/revision word, and a total length that is a multiple of four. The CRC
//! covers everything after the CRC field. Raw navigation blocks share a
//! common prefix: TOW (ms), continuous week number, SVID and the receiver's
//! own CRC verdict, followed by the navigation bits.

use std::io::Read;

use log::trace;

use crate::crc::crc16_ccitt;
use crate::error::ErrorKind;
use crate::frame::{framer_error, FrameFlags, FrameResult, PayloadFrame, ScanBuffer, Signal};
use crate::time::GpsTime;

const SYNC: [u8; 2] = [0x24, 0x40]; // "$@"
const HEADER_LEN: usize = 8;
const MAX_BLOCK_LEN: usize = 4096;

const BLOCK_GAL_RAW_CNAV: u16 = 4024;
const BLOCK_QZS_RAW_L6: u16 = 4069;
const BLOCK_BDS_RAW_B2B: u16 = 4242;

/// Septentrio SVID numbering offsets.
const SVID_GAL_BASE: u16 = 70;
const SVID_QZS_BASE: u16 = 181;
const SVID_BDS_BASE: u16 = 140;

/// Framer for Septentrio SBF streams.
pub struct SbfFramer<R: Read> {
    scan: ScanBuffer<R>,
}

impl<R: Read> SbfFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            scan: ScanBuffer::new(reader),
        }
    }

    fn emit(
        &self,
        signal: Signal,
        body: &[u8],
    ) -> Result<PayloadFrame, ErrorKind> {
        // Common raw-block prefix after the 8-byte block header.
        if body.len() < 8 + signal.data_len() {
            return Err(ErrorKind::LengthFail { len: body.len() });
        }
        let tow_ms = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let week = u16::from_le_bytes([body[4], body[5]]);
        let svid = u16::from(body[6]);
        let crc_passed = body[7] != 0;

        let prn = match signal {
            Signal::E6b => svid.wrapping_sub(SVID_GAL_BASE),
            Signal::L6 => svid.wrapping_sub(SVID_QZS_BASE).wrapping_add(193),
            Signal::B2b => svid.wrapping_sub(SVID_BDS_BASE),
            _ => svid,
        };

        let mut flags = FrameFlags::empty();
        if !crc_passed {
            flags |= FrameFlags::CHECKSUM;
        }

        Ok(PayloadFrame {
            signal,
            prn,
            epoch: Some(GpsTime::new(week, tow_ms / 1000)),
            cnr: None,
            flags,
            data: body[8..8 + signal.data_len()].to_vec(),
        })
    }
}

impl<R: Read> Iterator for SbfFramer<R> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Err(e) = self.scan.fill(HEADER_LEN) {
                return Some(Err(e));
            }
            if self.scan.len() < HEADER_LEN {
                return None;
            }

            let pos = (0..self.scan.len()).find(|&i| self.scan.at(i) == SYNC[0]);
            match pos {
                Some(p) => self.scan.drain(p),
                None => {
                    let n = self.scan.len();
                    self.scan.drain(n);
                    continue;
                },
            }
            if self.scan.len() < HEADER_LEN {
                continue;
            }
            if self.scan.at(1) != SYNC[1] {
                self.scan.drain(1);
                continue;
            }

            let crc_expect = u16::from_le_bytes([self.scan.at(2), self.scan.at(3)]);
            let id = u16::from_le_bytes([self.scan.at(4), self.scan.at(5)]);
            let block_num = id & 0x1fff;
            let len = usize::from(u16::from_le_bytes([self.scan.at(6), self.scan.at(7)]));
            if len < HEADER_LEN || len % 4 != 0 || len > MAX_BLOCK_LEN {
                self.scan.drain(2);
                return Some(Err(framer_error(ErrorKind::LengthFail { len })));
            }

            if let Err(e) = self.scan.fill(len) {
                return Some(Err(e));
            }
            if self.scan.len() < len {
                return None;
            }

            let got = crc16_ccitt(self.scan.window(4, len - 4));
            if got != crc_expect {
                self.scan.drain(2);
                return Some(Err(framer_error(ErrorKind::ChecksumFail {
                    expect: u32::from(crc_expect),
                    got: u32::from(got),
                })));
            }

            let body = self.scan.window(HEADER_LEN, len - HEADER_LEN).to_vec();
            self.scan.drain(len);

            let signal = match block_num {
                BLOCK_GAL_RAW_CNAV => Signal::E6b,
                BLOCK_QZS_RAW_L6 => Signal::L6,
                BLOCK_BDS_RAW_B2B => Signal::B2b,
                other => {
                    trace!("sbf: skipping block {other} ({len} bytes)");
                    continue;
                },
            };

            return Some(match self.emit(signal, &body) {
                Ok(frame) => Ok(frame),
                Err(kind) => Err(framer_error(kind)),
            });
        }
    }
}
