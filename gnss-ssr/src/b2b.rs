//! BeiDou PPP-B2b decoder.
//!
//! B2b messages are independent 486-bit frames: MT1 installs the satellite
//! slot mask, MT2/3/4 carry orbit, code bias and clock corrections against
//! it, MT63 is null filler. There is no cross-message reassembly; only the
//! mask context is shared, with the same IODSSR gating as the L6 dialects.

use log::debug;

use crate::bits::BitCursor;
use crate::cssr::{FieldDef, SignalBias};
use crate::error::{ErrorKind, Stage, StreamError};
use crate::frame::PayloadFrame;
use crate::sat::{Constellation, Satellite};

const RADIAL: FieldDef = FieldDef::new(15, 0.0016, true, true);
const ALONG: FieldDef = FieldDef::new(13, 0.0064, true, true);
const CROSS: FieldDef = FieldDef::new(13, 0.0064, true, true);
const CLOCK_C0: FieldDef = FieldDef::new(15, 0.0016, true, true);
const CODE_BIAS: FieldDef = FieldDef::new(12, 0.017, true, true);

/// Clock correction blocks per MT4 frame.
const MT4_SLOTS: usize = 23;

/// Satellite slot numbering across the concatenated MT1 masks.
const BDS_SLOTS: u16 = 63;
const GPS_SLOTS: u16 = 37;
const GAL_SLOTS: u16 = 37;
const GLO_SLOTS: u16 = 37;

/// Map a 1-based slot number to its satellite.
pub fn slot_to_satellite(slot: u16) -> Option<Satellite> {
    match slot {
        0 => None,
        s if s <= BDS_SLOTS => Some(Satellite::new(Constellation::Beidou, s)),
        s if s <= BDS_SLOTS + GPS_SLOTS => {
            Some(Satellite::new(Constellation::Gps, s - BDS_SLOTS))
        },
        s if s <= BDS_SLOTS + GPS_SLOTS + GAL_SLOTS => {
            Some(Satellite::new(Constellation::Galileo, s - BDS_SLOTS - GPS_SLOTS))
        },
        s if s <= BDS_SLOTS + GPS_SLOTS + GAL_SLOTS + GLO_SLOTS => Some(Satellite::new(
            Constellation::Glonass,
            s - BDS_SLOTS - GPS_SLOTS - GAL_SLOTS,
        )),
        _ => None,
    }
}

/// The B2b satellite slot mask.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct B2bMask {
    pub iodp: u8,
    pub iodssr: u8,
    /// Masked satellites in slot order; MT4 indexes this list.
    pub sats: Vec<Satellite>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct B2bOrbit {
    pub sat: Satellite,
    pub iodn: u16,
    pub iod_corr: u8,
    pub radial: Option<f64>,
    pub along: Option<f64>,
    pub cross: Option<f64>,
    pub ura: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct B2bClock {
    pub sat: Satellite,
    pub iod_corr: u8,
    pub c0: Option<f64>,
}

/// One decoded B2b message.
#[derive(Debug, Clone, PartialEq)]
pub enum B2bMessage {
    Mask(B2bMask),
    Orbit { tod: u32, sats: Vec<B2bOrbit> },
    CodeBias { tod: u32, biases: Vec<SignalBias> },
    Clock { tod: u32, sats: Vec<B2bClock> },
    Null,
}

impl B2bMessage {
    pub fn type_number(&self) -> u8 {
        match self {
            B2bMessage::Mask(_) => 1,
            B2bMessage::Orbit { .. } => 2,
            B2bMessage::CodeBias { .. } => 3,
            B2bMessage::Clock { .. } => 4,
            B2bMessage::Null => 63,
        }
    }
}

/// Stateful decoder for one B2b broadcast stream.
#[derive(Default)]
pub struct B2bDecoder {
    mask: Option<B2bMask>,
}

impl B2bDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> Option<&B2bMask> {
        self.mask.as_ref()
    }

    /// Decode one B2b payload frame.
    pub fn decode(&mut self, frame: &PayloadFrame) -> Result<B2bMessage, StreamError> {
        let tag = |kind: ErrorKind| StreamError::new(Stage::Decoder, kind).with_prn(frame.prn);
        let mut cur = BitCursor::with_len(&frame.data, 486.min(frame.data.len() * 8));

        let mt = cur.take(6).map_err(|e| tag(e.into()))? as u8;
        match mt {
            1 => self.decode_mask(&mut cur).map_err(tag),
            2 => self.decode_orbit(&mut cur).map_err(tag),
            3 => self.decode_code_bias(&mut cur).map_err(tag),
            4 => self.decode_clock(&mut cur).map_err(tag),
            63 => Ok(B2bMessage::Null),
            other => Err(tag(ErrorKind::UnknownSubtype(other))),
        }
    }

    fn decode_mask(&mut self, cur: &mut BitCursor<'_>) -> Result<B2bMessage, ErrorKind> {
        let _tod = cur.take(17)? as u32;
        let iodp = cur.take(4)? as u8;
        let iodssr = cur.take(2)? as u8;

        let mut sats = Vec::new();
        let total = BDS_SLOTS + GPS_SLOTS + GAL_SLOTS + GLO_SLOTS;
        for slot in 1..=total {
            if cur.take_bool()? {
                if let Some(sat) = slot_to_satellite(slot) {
                    sats.push(sat);
                }
            }
        }

        let mask = B2bMask { iodp, iodssr, sats };
        debug!(
            "b2b: mask installed iodp={} iodssr={} n_sat={}",
            mask.iodp,
            mask.iodssr,
            mask.sats.len()
        );
        self.mask = Some(mask.clone());
        Ok(B2bMessage::Mask(mask))
    }

    /// IODSSR gate shared by MT2/3/4.
    fn gate(&self, iodssr: u8) -> Result<&B2bMask, ErrorKind> {
        let Some(mask) = self.mask.as_ref() else {
            return Err(ErrorKind::MaskAbsent);
        };
        if mask.iodssr != iodssr {
            return Err(ErrorKind::IodssrMismatch {
                active: mask.iodssr,
                msg: iodssr,
            });
        }
        Ok(mask)
    }

    fn decode_orbit(&self, cur: &mut BitCursor<'_>) -> Result<B2bMessage, ErrorKind> {
        let tod = cur.take(17)? as u32;
        let iodssr = cur.take(2)? as u8;
        self.gate(iodssr)?;

        let mut sats = Vec::new();
        for _ in 0..6 {
            let slot = cur.take(9)? as u16;
            let iodn = cur.take(10)? as u16;
            let iod_corr = cur.take(3)? as u8;
            let radial = RADIAL.read(cur)?;
            let along = ALONG.read(cur)?;
            let cross = CROSS.read(cur)?;
            let ura_raw = cur.take(6)? as u8;
            let Some(sat) = slot_to_satellite(slot) else {
                // Slot 0 pads unused blocks.
                continue;
            };
            sats.push(B2bOrbit {
                sat,
                iodn,
                iod_corr,
                radial,
                along,
                cross,
                ura: crate::cssr::ura_to_meters(ura_raw),
            });
        }
        Ok(B2bMessage::Orbit { tod, sats })
    }

    fn decode_code_bias(&self, cur: &mut BitCursor<'_>) -> Result<B2bMessage, ErrorKind> {
        let tod = cur.take(17)? as u32;
        let iodssr = cur.take(2)? as u8;
        self.gate(iodssr)?;

        let n_sat = cur.take(5)? as usize;
        let mut biases = Vec::new();
        for _ in 0..n_sat {
            let slot = cur.take(9)? as u16;
            let n_sig = cur.take(4)? as usize;
            let sat = slot_to_satellite(slot);
            for _ in 0..n_sig {
                let signal = cur.take(4)? as u8;
                let bias = CODE_BIAS.read(cur)?;
                if let Some(sat) = sat {
                    biases.push(SignalBias {
                        sat,
                        signal,
                        bias,
                        discontinuity: None,
                    });
                }
            }
        }
        Ok(B2bMessage::CodeBias { tod, biases })
    }

    fn decode_clock(&self, cur: &mut BitCursor<'_>) -> Result<B2bMessage, ErrorKind> {
        let tod = cur.take(17)? as u32;
        let iodssr = cur.take(2)? as u8;
        let iodp = cur.take(4)? as u8;
        let mask = self.gate(iodssr)?;
        if iodp != mask.iodp {
            return Err(ErrorKind::IodssrMismatch {
                active: mask.iodp,
                msg: iodp,
            });
        }

        let sub_slot = cur.take(5)? as usize;
        let mut sats = Vec::new();
        for i in 0..MT4_SLOTS {
            let iod_corr = cur.take(3)? as u8;
            let c0 = CLOCK_C0.read(cur)?;
            let position = sub_slot * MT4_SLOTS + i;
            let Some(sat) = mask.sats.get(position) else {
                continue;
            };
            sats.push(B2bClock {
                sat: *sat,
                iod_corr,
                c0,
            });
        }
        Ok(B2bMessage::Clock { tod, sats })
    }
}
