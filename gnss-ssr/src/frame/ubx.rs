//! u-blox UBX framer.
//!
//! `B5 62`, class/id, little-endian length, payload, 8-bit Fletcher over
//! class through payload. Two messages matter here: RXM-SFRBX carries raw
//! navigation words (GPS/QZSS LNAV, Galileo E1B I/NAV) selected by GNSS id
//! and signal id, RXM-PMP carries the QZSS L1S message.

use std::io::Read;

use log::trace;

use crate::crc::Fletcher8;
use crate::error::ErrorKind;
use crate::frame::{framer_error, FrameFlags, FrameResult, PayloadFrame, ScanBuffer, Signal};

const SYNC: [u8; 2] = [0xb5, 0x62];
const HEADER_LEN: usize = 6;
const CK_LEN: usize = 2;
const MAX_PAYLOAD_LEN: usize = 2048;

const CLASS_RXM: u8 = 0x02;
const ID_SFRBX: u8 = 0x13;
const ID_PMP: u8 = 0x72;

const GNSS_GPS: u8 = 0;
const GNSS_GALILEO: u8 = 2;
const GNSS_QZSS: u8 = 5;
const SIG_GAL_E1B: u8 = 1;

/// Framer for u-blox UBX streams.
pub struct UbxFramer<R: Read> {
    scan: ScanBuffer<R>,
}

impl<R: Read> UbxFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            scan: ScanBuffer::new(reader),
        }
    }

    fn sfrbx(payload: &[u8]) -> Option<PayloadFrame> {
        if payload.len() < 8 {
            return None;
        }
        let gnss_id = payload[0];
        let sv_id = payload[1];
        let sig_id = payload[2];
        let num_words = usize::from(payload[4]);
        if payload.len() < 8 + num_words * 4 {
            return None;
        }

        let (signal, prn) = match (gnss_id, sig_id) {
            (GNSS_GPS, 0) => (Signal::Lnav, u16::from(sv_id)),
            (GNSS_QZSS, 0) => (Signal::Lnav, 192 + u16::from(sv_id)),
            (GNSS_GALILEO, SIG_GAL_E1B) => (Signal::Inav, u16::from(sv_id)),
            _ => return None,
        };

        // Words arrive LSB-first on the wire; nav bits are MSB-aligned.
        let mut data = Vec::with_capacity(signal.data_len());
        for w in 0..num_words {
            let off = 8 + w * 4;
            let word = u32::from_le_bytes([
                payload[off],
                payload[off + 1],
                payload[off + 2],
                payload[off + 3],
            ]);
            data.extend_from_slice(&word.to_be_bytes());
        }
        data.resize(signal.data_len(), 0);

        Some(PayloadFrame {
            signal,
            prn,
            epoch: None,
            cnr: None,
            flags: FrameFlags::empty(),
            data,
        })
    }

    fn pmp(payload: &[u8]) -> Option<PayloadFrame> {
        if payload.len() < 4 + Signal::L1s.data_len() {
            return None;
        }
        let sv_id = u16::from(payload[1]);
        let cnr = f64::from(payload[2]);
        Some(PayloadFrame {
            signal: Signal::L1s,
            prn: sv_id,
            epoch: None,
            cnr: (cnr > 0.0).then_some(cnr),
            flags: FrameFlags::empty(),
            data: payload[4..4 + Signal::L1s.data_len()].to_vec(),
        })
    }
}

impl<R: Read> Iterator for UbxFramer<R> {
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

            let class = self.scan.at(2);
            let id = self.scan.at(3);
            let len = usize::from(u16::from_le_bytes([self.scan.at(4), self.scan.at(5)]));
            if len > MAX_PAYLOAD_LEN {
                self.scan.drain(2);
                return Some(Err(framer_error(ErrorKind::LengthFail { len })));
            }

            let frame_len = HEADER_LEN + len + CK_LEN;
            if let Err(e) = self.scan.fill(frame_len) {
                return Some(Err(e));
            }
            if self.scan.len() < frame_len {
                return None;
            }

            let (ck_a, ck_b) = Fletcher8::compute(self.scan.window(2, 4 + len));
            let (rx_a, rx_b) = (self.scan.at(frame_len - 2), self.scan.at(frame_len - 1));
            if (ck_a, ck_b) != (rx_a, rx_b) {
                self.scan.drain(2);
                return Some(Err(framer_error(ErrorKind::ChecksumFail {
                    expect: u32::from(rx_a) << 8 | u32::from(rx_b),
                    got: u32::from(ck_a) << 8 | u32::from(ck_b),
                })));
            }

            let payload = self.scan.window(HEADER_LEN, len).to_vec();
            self.scan.drain(frame_len);

            let frame = match (class, id) {
                (CLASS_RXM, ID_SFRBX) => Self::sfrbx(&payload),
                (CLASS_RXM, ID_PMP) => Self::pmp(&payload),
                _ => {
                    trace!("ubx: skipping {class:#04x}/{id:#04x} ({len} bytes)");
                    None
                },
            };
            match frame {
                Some(f) => return Some(Ok(f)),
                None => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
        let mut f = Vec::new();
        f.extend_from_slice(&SYNC);
        f.push(class);
        f.push(id);
        f.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        f.extend_from_slice(payload);
        let (a, b) = Fletcher8::compute(&f[2..]);
        f.push(a);
        f.push(b);
        f
    }

    fn sfrbx_payload(gnss_id: u8, sv_id: u8, sig_id: u8, words: &[u32]) -> Vec<u8> {
        let mut p = vec![gnss_id, sv_id, sig_id, 0, words.len() as u8, 0, 2, 0];
        for w in words {
            p.extend_from_slice(&w.to_le_bytes());
        }
        p
    }

    #[test]
    fn qzss_lnav_subframe() {
        let words = [0x22c1_3e1bu32; 10];
        let bytes = build_frame(CLASS_RXM, ID_SFRBX, &sfrbx_payload(GNSS_QZSS, 2, 0, &words));
        let mut framer = UbxFramer::new(&bytes[..]);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.signal, Signal::Lnav);
        assert_eq!(frame.prn, 194);
        assert_eq!(&frame.data[..4], &[0x22, 0xc1, 0x3e, 0x1b]);
    }

    #[test]
    fn galileo_inav_selected_by_signal_id() {
        let words = [0x1234_5678u32; 8];
        let inav = build_frame(CLASS_RXM, ID_SFRBX, &sfrbx_payload(GNSS_GALILEO, 7, SIG_GAL_E1B, &words));
        let e5b = build_frame(CLASS_RXM, ID_SFRBX, &sfrbx_payload(GNSS_GALILEO, 7, 5, &words));
        let mut bytes = inav;
        bytes.extend_from_slice(&e5b);
        let mut framer = UbxFramer::new(&bytes[..]);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.signal, Signal::Inav);
        assert_eq!(frame.prn, 7);
        assert!(framer.next().is_none()); // E5b filtered out
    }

    #[test]
    fn pmp_l1s_message() {
        let mut payload = vec![1, 186, 45, 0];
        payload.extend_from_slice(&[0xa5; 32]);
        let bytes = build_frame(CLASS_RXM, ID_PMP, &payload);
        let mut framer = UbxFramer::new(&bytes[..]);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(frame.signal, Signal::L1s);
        assert_eq!(frame.prn, 186);
        assert_eq!(frame.cnr, Some(45.0));
    }

    #[test]
    fn bad_checksum_then_recovery() {
        let words = [0u32; 10];
        let mut bytes =
            build_frame(CLASS_RXM, ID_SFRBX, &sfrbx_payload(GNSS_GPS, 16, 0, &words));
        let last = bytes.len() - 1;
        bytes[last] ^= 0x55;
        bytes.extend_from_slice(&build_frame(
            CLASS_RXM,
            ID_SFRBX,
            &sfrbx_payload(GNSS_GPS, 17, 0, &words),
        ));
        let mut framer = UbxFramer::new(&bytes[..]);
        assert!(matches!(
            framer.next().unwrap().unwrap_err().kind,
            ErrorKind::ChecksumFail { .. }
        ));
        assert_eq!(framer.next().unwrap().unwrap().prn, 17);
    }
}
