//! Galileo High-Accuracy Service (E6B).
//!
//! Each C/NAV page carries a 448-bit HAS page: a 24-bit header (status,
//! message type, MID, MS, PID) and 424 Reed-Solomon coded bits. Pages with
//! the same MID are collected until MS distinct page ids exist, then the
//! erasure decoder ([crate::galois]) recovers the MS x 53 byte cleartext,
//! which this module parses into mask/orbit/clock/bias blocks.

use std::collections::HashMap;

use log::{debug, trace};

use crate::bits::{BitCursor, OutOfBits};
use crate::cssr::{ClockCorrection, FieldDef, MaskEntry, OrbitCorrection, SignalBias};
use crate::error::{ErrorKind, Stage, StreamError};
use crate::frame::PayloadFrame;
use crate::galois::{self, PAGE_SYMBOLS};
use crate::sat::{Constellation, Satellite};

/// HAS page header size ahead of the coded symbols.
const PAGE_HEADER_BITS: usize = 24;

/// HAS field scales (HAS is one fixed dialect, unlike compact SSR).
const ORBIT_RADIAL: FieldDef = FieldDef::new(13, 0.0025, true, true);
const ORBIT_ALONG: FieldDef = FieldDef::new(12, 0.008, true, true);
const ORBIT_CROSS: FieldDef = FieldDef::new(12, 0.008, true, true);
const CLOCK_C0: FieldDef = FieldDef::new(13, 0.0025, true, true);
const CODE_BIAS: FieldDef = FieldDef::new(11, 0.02, true, true);
const PHASE_BIAS: FieldDef = FieldDef::new(11, 0.01, true, true);

/// Validity interval table, seconds, indexed by the 4-bit field.
pub const VALIDITY_SECONDS: [u16; 16] = [
    5, 10, 15, 20, 30, 60, 90, 120, 180, 240, 300, 600, 900, 1800, 3600, 0,
];

/// One decoded HAS page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasPage {
    pub prn: u16,
    pub status: u8,
    pub mid: u8,
    pub ms: u8,
    pub pid: u8,
    pub encoded: [u8; PAGE_SYMBOLS],
}

/// Decode a HAS page out of a 492-bit E6B payload. Returns `None` for
/// pages that are not HAS message pages (idle/dummy).
pub fn decode_page(frame: &PayloadFrame) -> Result<Option<HasPage>, ErrorKind> {
    let mut cur = BitCursor::new(&frame.data);
    let need = PAGE_HEADER_BITS + PAGE_SYMBOLS * 8;
    if cur.remaining() < need {
        return Err(ErrorKind::ShortPayload {
            need,
            have: cur.remaining(),
        });
    }
    let status = cur.take(2)? as u8;
    cur.advance(2)?; // reserved
    let mt = cur.take(2)? as u8;
    let mid = cur.take(5)? as u8;
    let ms = cur.take(5)? as u8 + 1;
    let pid = cur.take(8)? as u8;

    if mt != 1 {
        trace!("has: prn {} non-correction page (mt {mt})", frame.prn);
        return Ok(None);
    }
    if pid == 0 {
        // PID is 1-based; zero marks a dummy page.
        return Err(ErrorKind::LengthFail { len: 0 });
    }
    if mid == 0 {
        return Ok(None);
    }

    let mut encoded = [0u8; PAGE_SYMBOLS];
    for b in encoded.iter_mut() {
        *b = cur.take(8)? as u8;
    }
    Ok(Some(HasPage {
        prn: frame.prn,
        status,
        mid,
        ms,
        pid,
        encoded,
    }))
}

/// HAS satellite/signal mask, one per mask id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HasMask {
    pub id: u8,
    pub entries: Vec<MaskEntry>,
    pub nav_message: u8,
}

impl HasMask {
    pub fn n_sat(&self) -> usize {
        self.entries.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = (Satellite, u8)> + '_ {
        self.entries
            .iter()
            .flat_map(|e| e.signals.iter().map(move |s| (e.sat, *s)))
    }
}

/// Header of a decoded HAS message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HasHeader {
    pub toh: u16,
    pub mask_flag: bool,
    pub orbit_flag: bool,
    pub clock_flag: bool,
    pub clock_subset_flag: bool,
    pub code_bias_flag: bool,
    pub phase_bias_flag: bool,
    pub mask_id: u8,
    pub iod_set: u8,
}

/// One fully decoded HAS message.
#[derive(Debug, Clone, PartialEq)]
pub struct HasMessage {
    pub mid: u8,
    pub ms: u8,
    pub header: HasHeader,
    pub mask: Option<HasMask>,
    pub validity: Option<u16>,
    pub orbits: Vec<OrbitCorrection>,
    pub clocks: Vec<ClockCorrection>,
    pub code_biases: Vec<SignalBias>,
    pub phase_biases: Vec<SignalBias>,
}

struct PageGroup {
    ms: u8,
    pages: Vec<(u8, [u8; PAGE_SYMBOLS])>,
}

/// Collects pages, runs the erasure decoder and parses message bodies.
///
/// Groups are keyed per (PRN, MID); a group is dropped on successful decode
/// or replaced whenever a differing MS shows up for its MID.
#[derive(Default)]
pub struct HasDecoder {
    groups: HashMap<(u16, u8), PageGroup>,
    masks: HashMap<u8, HasMask>,
}

impl HasDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self, id: u8) -> Option<&HasMask> {
        self.masks.get(&id)
    }

    /// Feed one E6B payload frame.
    pub fn push(&mut self, frame: &PayloadFrame) -> (Vec<HasMessage>, Vec<StreamError>) {
        let mut messages = Vec::new();
        let mut errors = Vec::new();
        let tag = |kind: ErrorKind, prn: u16| StreamError::new(Stage::Reassembler, kind).with_prn(prn);

        let page = match decode_page(frame) {
            Ok(Some(p)) => p,
            Ok(None) => return (messages, errors),
            Err(kind) => {
                errors.push(tag(kind, frame.prn));
                return (messages, errors);
            },
        };

        let key = (page.prn, page.mid);
        let group = self.groups.entry(key).or_insert_with(|| PageGroup {
            ms: page.ms,
            pages: Vec::new(),
        });
        if group.ms != page.ms {
            // First-seen MS wins until it doesn't: a changed MS restarts
            // the group around the new value.
            errors.push(tag(
                ErrorKind::MsMismatch {
                    group: group.ms,
                    page: page.ms,
                },
                page.prn,
            ));
            *group = PageGroup {
                ms: page.ms,
                pages: Vec::new(),
            };
        }
        if group.pages.iter().any(|(pid, _)| *pid == page.pid) {
            return (messages, errors);
        }
        group.pages.push((page.pid, page.encoded));
        trace!(
            "has: prn {} mid {} {}/{} pages",
            page.prn,
            page.mid,
            group.pages.len(),
            group.ms
        );

        if group.pages.len() < usize::from(group.ms) {
            return (messages, errors);
        }

        let group = self.groups.remove(&key).unwrap_or(PageGroup {
            ms: page.ms,
            pages: Vec::new(),
        });
        match galois::erasure_decode(usize::from(group.ms), &group.pages) {
            Ok(cleartext) => {
                debug!(
                    "has: prn {} mid {} decoded {} bytes",
                    page.prn,
                    page.mid,
                    cleartext.len()
                );
                match self.parse_message(page.mid, group.ms, &cleartext) {
                    Ok(msg) => messages.push(msg),
                    Err(kind) => errors.push(tag(kind, page.prn)),
                }
            },
            Err(e) => {
                debug!("has: prn {} mid {} RS decode failed: {e}", page.prn, page.mid);
                errors.push(tag(ErrorKind::RsUncorrectable, page.prn));
            },
        }
        (messages, errors)
    }

    fn parse_message(&mut self, mid: u8, ms: u8, data: &[u8]) -> Result<HasMessage, ErrorKind> {
        let mut cur = BitCursor::new(data);
        let header = parse_header(&mut cur)?;

        let mut msg = HasMessage {
            mid,
            ms,
            header,
            mask: None,
            validity: None,
            orbits: Vec::new(),
            clocks: Vec::new(),
            code_biases: Vec::new(),
            phase_biases: Vec::new(),
        };

        if header.mask_flag {
            let mask = parse_mask(&mut cur, header.mask_id)?;
            self.masks.insert(mask.id, mask.clone());
            msg.mask = Some(mask);
        }

        // Correction blocks index into the referenced mask.
        let needs_mask = header.orbit_flag
            || header.clock_flag
            || header.code_bias_flag
            || header.phase_bias_flag;
        if !needs_mask {
            return Ok(msg);
        }
        let Some(mask) = self.masks.get(&header.mask_id).cloned() else {
            return Err(ErrorKind::MaskAbsent);
        };

        if header.orbit_flag {
            let validity = cur.take(4)? as usize;
            msg.validity = Some(VALIDITY_SECONDS[validity]);
            for entry in &mask.entries {
                let iode_bits = match entry.sat.constellation {
                    Constellation::Galileo => 10,
                    _ => 8,
                };
                let iode = cur.take(iode_bits)? as u16;
                msg.orbits.push(OrbitCorrection {
                    sat: entry.sat,
                    iode,
                    radial: ORBIT_RADIAL.read(&mut cur)?,
                    along: ORBIT_ALONG.read(&mut cur)?,
                    cross: ORBIT_CROSS.read(&mut cur)?,
                });
            }
        }

        if header.clock_flag {
            let _validity = cur.take(4)?;
            let multiplier = cur.take(2)? as f64 + 1.0;
            for entry in &mask.entries {
                let c0 = CLOCK_C0.read(&mut cur)?.map(|v| v * multiplier);
                msg.clocks.push(ClockCorrection {
                    sat: entry.sat,
                    c0,
                });
            }
        }

        if header.code_bias_flag {
            let _validity = cur.take(4)?;
            for (sat, signal) in mask.cells() {
                msg.code_biases.push(SignalBias {
                    sat,
                    signal,
                    bias: CODE_BIAS.read(&mut cur)?,
                    discontinuity: None,
                });
            }
        }

        if header.phase_bias_flag {
            let _validity = cur.take(4)?;
            for (sat, signal) in mask.cells() {
                let bias = PHASE_BIAS.read(&mut cur)?;
                let disc = cur.take(2)? as u8;
                msg.phase_biases.push(SignalBias {
                    sat,
                    signal,
                    bias,
                    discontinuity: Some(disc),
                });
            }
        }

        Ok(msg)
    }
}

fn parse_header(cur: &mut BitCursor<'_>) -> Result<HasHeader, OutOfBits> {
    let toh = cur.take(12)? as u16;
    let mask_flag = cur.take_bool()?;
    let orbit_flag = cur.take_bool()?;
    let clock_flag = cur.take_bool()?;
    let clock_subset_flag = cur.take_bool()?;
    let code_bias_flag = cur.take_bool()?;
    let phase_bias_flag = cur.take_bool()?;
    cur.advance(4)?; // reserved
    let mask_id = cur.take(5)? as u8;
    let iod_set = cur.take(5)? as u8;
    Ok(HasHeader {
        toh,
        mask_flag,
        orbit_flag,
        clock_flag,
        clock_subset_flag,
        code_bias_flag,
        phase_bias_flag,
        mask_id,
        iod_set,
    })
}

fn parse_mask(cur: &mut BitCursor<'_>, mask_id: u8) -> Result<HasMask, OutOfBits> {
    let n_sys = cur.take(4)? as usize;
    let mut entries = Vec::new();
    let mut nav_message = 0;
    for _ in 0..n_sys {
        let gnss_id = cur.take(4)? as u8;
        let constellation = match gnss_id {
            0 => Constellation::Gps,
            2 => Constellation::Galileo,
            other => Constellation::from_cssr_id(other).unwrap_or(Constellation::Gps),
        };

        let mut sats = Vec::new();
        for i in 0..40u16 {
            if cur.take_bool()? {
                sats.push(i + 1);
            }
        }
        let mut sigs = Vec::new();
        for i in 0..16u8 {
            if cur.take_bool()? {
                sigs.push(i);
            }
        }
        let cell_mask = cur.take_bool()?;
        for prn in sats {
            let signals = if cell_mask {
                let mut selected = Vec::new();
                for sig in &sigs {
                    if cur.take_bool()? {
                        selected.push(*sig);
                    }
                }
                selected
            } else {
                sigs.clone()
            };
            entries.push(MaskEntry {
                sat: Satellite::new(constellation, prn),
                signals,
            });
        }
        nav_message = cur.take(3)? as u8;
    }
    Ok(HasMask {
        id: mask_id,
        entries,
        nav_message,
    })
}
