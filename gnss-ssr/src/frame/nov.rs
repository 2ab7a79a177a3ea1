//! NovAtel OEM7 binary framer.
//!
//! Records are `AA 44 12`, a header-length byte, a fixed header carrying the
//! message id, length and GPS receive epoch, the message body, and a CRC-32
//! (reflected 0xEDB88320, zero fill, no inversion) over the whole record
//! including the sync bytes.

use std::io::Read;

use log::trace;

use crate::crc::crc32_novatel;
use crate::error::ErrorKind;
use crate::frame::{framer_error, FrameFlags, FrameResult, PayloadFrame, ScanBuffer, Signal};
use crate::time::GpsTime;

const SYNC: [u8; 3] = [0xaa, 0x44, 0x12];
const MIN_HEADER_LEN: usize = 28;
const CRC_LEN: usize = 4;
/// Anything longer than this is a corrupted length field, not a record.
const MAX_RECORD_LEN: usize = 16 * 1024;

/// Messages the demultiplexer understands.
const MSG_GALCNAVRAWPAGE: u16 = 2239;
const MSG_QZSSRAWSUBFRAME: u16 = 1330;
const MSG_RANGECMP: u16 = 140;

/// Framer for NovAtel OEM7 binary logs.
pub struct NovFramer<R: Read> {
    scan: ScanBuffer<R>,
}

impl<R: Read> NovFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            scan: ScanBuffer::new(reader),
        }
    }
}

impl<R: Read> Iterator for NovFramer<R> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Err(e) = self.scan.fill(MIN_HEADER_LEN) {
                return Some(Err(e));
            }
            if self.scan.len() < MIN_HEADER_LEN {
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
            if self.scan.len() < MIN_HEADER_LEN {
                continue;
            }
            if self.scan.window(0, 3) != SYNC {
                self.scan.drain(1);
                continue;
            }

            let hdr_len = usize::from(self.scan.at(3));
            let msg_id = u16::from_le_bytes([self.scan.at(4), self.scan.at(5)]);
            let msg_len =
                usize::from(u16::from_le_bytes([self.scan.at(8), self.scan.at(9)]));
            let record_len = hdr_len + msg_len + CRC_LEN;
            if hdr_len < MIN_HEADER_LEN || record_len > MAX_RECORD_LEN {
                self.scan.drain(3);
                return Some(Err(framer_error(ErrorKind::LengthFail { len: record_len })));
            }

            if let Err(e) = self.scan.fill(record_len) {
                return Some(Err(e));
            }
            if self.scan.len() < record_len {
                return None;
            }

            let body_len = hdr_len + msg_len;
            let got = crc32_novatel(self.scan.window(0, body_len));
            let expect = u32::from_le_bytes([
                self.scan.at(body_len),
                self.scan.at(body_len + 1),
                self.scan.at(body_len + 2),
                self.scan.at(body_len + 3),
            ]);
            if got != expect {
                self.scan.drain(3);
                return Some(Err(framer_error(ErrorKind::ChecksumFail { expect, got })));
            }

            let week = u16::from_le_bytes([self.scan.at(14), self.scan.at(15)]);
            let ms = u32::from_le_bytes([
                self.scan.at(16),
                self.scan.at(17),
                self.scan.at(18),
                self.scan.at(19),
            ]);
            let epoch = GpsTime::new(week, ms / 1000);

            let payload = self.scan.window(hdr_len, msg_len).to_vec();
            self.scan.drain(record_len);

            match msg_id {
                MSG_GALCNAVRAWPAGE => {
                    // Signal channel, PRN, then the 492-bit C/NAV page.
                    if payload.len() < 8 + Signal::E6b.data_len() {
                        return Some(Err(framer_error(ErrorKind::LengthFail {
                            len: payload.len(),
                        })));
                    }
                    let prn =
                        u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as u16;
                    let data = payload[8..8 + Signal::E6b.data_len()].to_vec();
                    return Some(Ok(PayloadFrame {
                        signal: Signal::E6b,
                        prn,
                        epoch: Some(epoch),
                        cnr: None,
                        flags: FrameFlags::empty(),
                        data,
                    }));
                },
                MSG_QZSSRAWSUBFRAME => {
                    if payload.len() < 8 + 32 {
                        return Some(Err(framer_error(ErrorKind::LengthFail {
                            len: payload.len(),
                        })));
                    }
                    let prn =
                        u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as u16;
                    let mut data = payload[8..8 + 32].to_vec();
                    data.resize(Signal::Lnav.data_len(), 0);
                    return Some(Ok(PayloadFrame {
                        signal: Signal::Lnav,
                        prn,
                        epoch: Some(epoch),
                        cnr: None,
                        flags: FrameFlags::empty(),
                        data,
                    }));
                },
                MSG_RANGECMP => continue,
                other => {
                    trace!("nov: skipping message id {other} ({msg_len} bytes)");
                    continue;
                },
            }
        }
    }
}
