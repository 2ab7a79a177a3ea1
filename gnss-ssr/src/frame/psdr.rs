//! Pocket SDR log framer.
//!
//! Line-oriented text: `$L6FRM` and `$E6FRM` sentences carry a hex-encoded
//! payload, `$OBS` sentences carry per-satellite C/No that gets attached to
//! the following frames of the same PRN. An optional NMEA-style `*hh` xor
//! checksum closes a sentence; when present it is verified.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use crate::error::ErrorKind;
use crate::frame::{framer_error, FrameFlags, FrameResult, PayloadFrame, Signal};

lazy_static! {
    static ref RE_L6: Regex =
        Regex::new(r"^\$L6FRM,([0-9.]+),(\d+),([0-9A-Fa-f]+)$").unwrap();
    static ref RE_E6: Regex =
        Regex::new(r"^\$E6FRM,([0-9.]+),(\d+),([0-9A-Fa-f]+)$").unwrap();
    static ref RE_OBS: Regex =
        Regex::new(r"^\$OBS,([0-9.]+),[0-9A-Za-z]+,(\d+),([0-9.]+)").unwrap();
}

/// Framer for Pocket SDR text logs.
pub struct PsdrFramer<R: Read> {
    lines: std::io::Lines<BufReader<R>>,
    /// Latest observed C/No per PRN, harvested from `$OBS`.
    cnr: HashMap<u16, f64>,
}

impl<R: Read> PsdrFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            cnr: HashMap::new(),
        }
    }

    fn frame_from(&self, signal: Signal, prn: u16, hex: &str) -> Result<PayloadFrame, ErrorKind> {
        let mut data = decode_hex(hex).ok_or(ErrorKind::LengthFail { len: hex.len() })?;
        if data.len() < signal.data_len() {
            return Err(ErrorKind::LengthFail { len: data.len() });
        }
        data.truncate(signal.data_len());
        Ok(PayloadFrame {
            signal,
            prn,
            epoch: None,
            cnr: self.cnr.get(&prn).copied(),
            flags: FrameFlags::empty(),
            data,
        })
    }
}

impl<R: Read> Iterator for PsdrFramer<R> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => return Some(Err(framer_error(ErrorKind::Io(e.to_string())))),
            };
            let line = line.trim_end();
            if !line.starts_with('$') {
                continue;
            }

            let body = match split_checksum(line) {
                Ok(body) => body,
                Err(kind) => return Some(Err(framer_error(kind))),
            };

            if let Some(c) = RE_OBS.captures(body) {
                if let (Ok(prn), Ok(cnr)) = (c[2].parse::<u16>(), c[3].parse::<f64>()) {
                    self.cnr.insert(prn, cnr);
                }
                continue;
            }

            let (signal, caps) = if let Some(c) = RE_L6.captures(body) {
                (Signal::L6, c)
            } else if let Some(c) = RE_E6.captures(body) {
                (Signal::E6b, c)
            } else {
                trace!("psdr: ignoring sentence {}", &body[..body.len().min(16)]);
                continue;
            };

            let Ok(prn) = caps[2].parse::<u16>() else {
                continue;
            };
            return Some(
                self.frame_from(signal, prn, &caps[3])
                    .map_err(|kind| framer_error(kind).with_prn(prn)),
            );
        }
    }
}

/// Verify and strip an optional trailing `*hh` xor checksum; returns the
/// sentence body including the leading `$`.
fn split_checksum(line: &str) -> Result<&str, ErrorKind> {
    let Some(star) = line.rfind('*') else {
        return Ok(line);
    };
    let (body, ck) = line.split_at(star);
    let expect = u8::from_str_radix(&ck[1..], 16)
        .map_err(|_| ErrorKind::LengthFail { len: ck.len() })?;
    let got = body.bytes().skip(1).fold(0u8, |acc, b| acc ^ b);
    if got != expect {
        return Err(ErrorKind::ChecksumFail {
            expect: u32::from(expect),
            got: u32::from(got),
        });
    }
    Ok(body)
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
