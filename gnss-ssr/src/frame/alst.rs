//! Allystar HD9310 L6 framer.
//!
//! Frame layout (272 bytes total): sync `F1 D9 02 10`, little-endian payload
//! length (always 264), then PRN (LE u16, offset by 700), frequency id, data
//! length byte, big-endian GPS week and TOW, C/No, receiver flags and 252
//! bytes of L6 data, closed by a two-byte Fletcher checksum over everything
//! after the two vendor sync bytes. The mixed endianness is the vendor's.

use std::io::Read;

use log::trace;

use crate::crc::Fletcher8;
use crate::error::ErrorKind;
use crate::frame::{framer_error, FrameFlags, FrameResult, PayloadFrame, ScanBuffer, Signal};
use crate::time::GpsTime;

const SYNC: [u8; 4] = [0xf1, 0xd9, 0x02, 0x10];
const PAYLOAD_LEN: usize = 264;
const FRAME_LEN: usize = 4 + 2 + PAYLOAD_LEN + 2;
/// Checksummed region: class/id bytes, length field and payload.
const CK_OFFSET: usize = 2;
const CK_LEN: usize = 2 + 2 + PAYLOAD_LEN;
const PRN_OFFSET: u16 = 700;
/// L6 bytes actually used out of the 252 the receiver pads to.
const L6_DATA_LEN: usize = 250;

/// Satellite selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every tracked satellite's frames, in arrival order.
    All,
    /// At most one L6 frame per one-second tick: the pinned PRN if given,
    /// otherwise the strongest C/No (ties to the lowest PRN).
    Best { pin: Option<u16> },
}

/// Framer for Allystar HD9310 receiver streams.
pub struct AlstFramer<R: Read> {
    scan: ScanBuffer<R>,
    selection: Selection,
    tick: Option<u64>,
    held: Option<PayloadFrame>,
    done: bool,
}

impl<R: Read> AlstFramer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_selection(reader, Selection::All)
    }

    pub fn with_selection(reader: R, selection: Selection) -> Self {
        Self {
            scan: ScanBuffer::new(reader),
            selection,
            tick: None,
            held: None,
            done: false,
        }
    }

    /// Pull the next raw frame off the wire, resynchronizing as needed.
    fn read_frame(&mut self) -> Option<FrameResult> {
        loop {
            if let Err(e) = self.scan.fill(FRAME_LEN) {
                return Some(Err(e));
            }
            if self.scan.len() < FRAME_LEN {
                // Trailing partial frame at end-of-stream.
                return None;
            }

            // Hunt for the first sync byte.
            let pos = (0..self.scan.len()).find(|&i| self.scan.at(i) == SYNC[0]);
            match pos {
                Some(p) => self.scan.drain(p),
                None => {
                    let n = self.scan.len();
                    self.scan.drain(n);
                    continue;
                },
            }
            if self.scan.len() < FRAME_LEN {
                continue;
            }
            if self.scan.window(0, 4) != SYNC {
                self.scan.drain(1);
                continue;
            }

            let len = u16::from_le_bytes([self.scan.at(4), self.scan.at(5)]) as usize;
            if len != PAYLOAD_LEN {
                self.scan.drain(2);
                return Some(Err(framer_error(ErrorKind::LengthFail { len })));
            }

            let prn = u16::from_le_bytes([self.scan.at(6), self.scan.at(7)])
                .wrapping_sub(PRN_OFFSET);
            let week = u16::from_be_bytes([self.scan.at(10), self.scan.at(11)]);
            let tow = u32::from_be_bytes([
                self.scan.at(12),
                self.scan.at(13),
                self.scan.at(14),
                self.scan.at(15),
            ]);

            let (ck_a, ck_b) = Fletcher8::compute(self.scan.window(CK_OFFSET, CK_LEN));
            let (rx_a, rx_b) = (self.scan.at(FRAME_LEN - 2), self.scan.at(FRAME_LEN - 1));
            if (ck_a, ck_b) != (rx_a, rx_b) {
                self.scan.drain(2);
                return Some(Err(framer_error(ErrorKind::ChecksumFail {
                    expect: u32::from(rx_a) << 8 | u32::from(rx_b),
                    got: u32::from(ck_a) << 8 | u32::from(ck_b),
                })
                .with_prn(prn)
                .with_tow(tow)));
            }

            let dlen = self.scan.at(9);
            let cnr = f64::from(self.scan.at(16)) * 0.25;
            let rx_flags = self.scan.at(17);

            let mut flags = FrameFlags::empty();
            if dlen.wrapping_sub(2) != 63 {
                flags |= FrameFlags::DATA_LEN;
            }
            if rx_flags & 0x01 != 0 {
                flags |= FrameFlags::RS_FAILURE;
            }
            let epoch = GpsTime::new(week, tow);
            if rx_flags & 0x02 != 0 || !epoch.week_valid() {
                flags |= FrameFlags::WEEK_INVALID;
            }
            if rx_flags & 0x04 != 0 || !epoch.tow_valid() {
                flags |= FrameFlags::TOW_INVALID;
            }

            let data = self.scan.window(18, L6_DATA_LEN).to_vec();
            self.scan.drain(FRAME_LEN);
            trace!("alst: prn {prn} tow {tow} cnr {cnr:.2} flags {flags:?}");

            return Some(Ok(PayloadFrame {
                signal: Signal::L6,
                prn,
                epoch: Some(epoch),
                cnr: Some(cnr),
                flags,
                data,
            }));
        }
    }

    /// Whether `cand` should replace `held` within one tick.
    fn better(held: &PayloadFrame, cand: &PayloadFrame) -> bool {
        match (held.cnr, cand.cnr) {
            (Some(a), Some(b)) if b != a => b > a,
            _ => cand.prn < held.prn,
        }
    }
}

impl<R: Read> Iterator for AlstFramer<R> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        let pin = match self.selection {
            Selection::All => return self.read_frame(),
            Selection::Best { pin } => pin,
        };

        loop {
            if self.done {
                return self.held.take().map(Ok);
            }
            let frame = match self.read_frame() {
                Some(Ok(f)) => f,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    // Tick can never close again; flush what we hold.
                    self.done = true;
                    continue;
                },
            };
            if let Some(pin) = pin {
                if frame.prn != pin {
                    continue;
                }
            }
            let Some(tick) = frame.epoch.filter(|e| e.tow_valid()).map(|e| e.tick()) else {
                continue;
            };

            match self.tick {
                Some(current) if tick == current => {
                    match &self.held {
                        Some(held) if !Self::better(held, &frame) => {},
                        _ => self.held = Some(frame),
                    }
                },
                _ => {
                    // Tick boundary: emit the previous winner, start fresh.
                    let flushed = self.held.take();
                    self.tick = Some(tick);
                    self.held = Some(frame);
                    if let Some(f) = flushed {
                        return Some(Ok(f));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn build_frame(prn: u16, week: u16, tow: u32, cnr_quarter_db: u8) -> Vec<u8> {
        let mut f = Vec::with_capacity(FRAME_LEN);
        f.extend_from_slice(&SYNC);
        f.extend_from_slice(&(PAYLOAD_LEN as u16).to_le_bytes());
        f.extend_from_slice(&(prn + PRN_OFFSET).to_le_bytes());
        f.push(2); // freq id
        f.push(65); // data length byte: value - 2 == 63
        f.extend_from_slice(&week.to_be_bytes());
        f.extend_from_slice(&tow.to_be_bytes());
        f.push(cnr_quarter_db);
        f.push(0); // receiver flags
        f.extend_from_slice(&[0u8; 252]);
        let (a, b) = Fletcher8::compute(&f[CK_OFFSET..CK_OFFSET + CK_LEN]);
        f.push(a);
        f.push(b);
        f
    }

    #[test]
    fn accepts_valid_frame() {
        let bytes = build_frame(199, 2202, 100, 180);
        let mut framer = AlstFramer::new(&bytes[..]);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.prn, 199);
        assert_eq!(frame.epoch, Some(GpsTime::new(2202, 100)));
        assert_eq!(frame.cnr, Some(45.0));
        assert!(frame.is_healthy());
        assert_eq!(frame.data.len(), 250);
        assert!(framer.next().is_none());
    }

    #[test]
    fn resyncs_over_garbage() {
        let mut bytes = vec![0x00, 0xf1, 0x33, 0xd9];
        bytes.extend_from_slice(&build_frame(199, 2202, 100, 180));
        let mut framer = AlstFramer::new(&bytes[..]);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.prn, 199);
    }

    #[test]
    fn corrupt_checksum_is_tagged_and_stream_continues() {
        let mut bytes = build_frame(199, 2202, 100, 180);
        bytes[20] ^= 0xff;
        bytes.extend_from_slice(&build_frame(200, 2202, 100, 180));
        let mut framer = AlstFramer::new(&bytes[..]);
        let err = framer.next().unwrap().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ChecksumFail { .. }));
        assert_eq!(err.prn, Some(199));
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.prn, 200);
    }

    #[test]
    fn zero_length_is_length_fail() {
        let mut bytes = build_frame(199, 2202, 100, 180);
        bytes[4] = 0;
        bytes[5] = 0;
        let mut framer = AlstFramer::new(&bytes[..]);
        let err = framer.next().unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::LengthFail { len: 0 });
    }

    #[test]
    fn best_selection_one_frame_per_tick() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&build_frame(199, 2202, 100, 150));
        bytes.extend_from_slice(&build_frame(200, 2202, 100, 180));
        bytes.extend_from_slice(&build_frame(199, 2202, 101, 170));
        let mut framer =
            AlstFramer::with_selection(&bytes[..], Selection::Best { pin: None });
        let first = framer.next().unwrap().unwrap();
        assert_eq!(first.prn, 200); // strongest in tick 100
        let second = framer.next().unwrap().unwrap();
        assert_eq!(second.prn, 199); // flushed at end-of-stream
        assert!(framer.next().is_none());
    }

    #[test]
    fn best_selection_ties_break_low_prn() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&build_frame(204, 2202, 100, 160));
        bytes.extend_from_slice(&build_frame(199, 2202, 100, 160));
        let mut framer =
            AlstFramer::with_selection(&bytes[..], Selection::Best { pin: None });
        assert_eq!(framer.next().unwrap().unwrap().prn, 199);
    }

    #[test]
    fn pinned_prn_wins_regardless_of_cnr() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&build_frame(199, 2202, 100, 250));
        bytes.extend_from_slice(&build_frame(204, 2202, 100, 10));
        let mut framer =
            AlstFramer::with_selection(&bytes[..], Selection::Best { pin: Some(204) });
        assert_eq!(framer.next().unwrap().unwrap().prn, 204);
        assert!(framer.next().is_none());
    }
}
