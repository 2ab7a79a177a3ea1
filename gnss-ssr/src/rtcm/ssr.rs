//! RTCM state-space representation messages 1057-1068.
//!
//! Unlike compact SSR, each message carries its own satellite list and IOD;
//! no external mask is involved. GPS messages use a 20-bit epoch, GLONASS
//! 17 bits; satellite ids are 6 and 5 bits respectively.

use crate::bits::BitCursor;
use crate::cssr::FieldDef;
use crate::error::ErrorKind;
use crate::sat::{Constellation, Satellite};

/// Orbit terms: 0.1 mm and 0.4 mm steps, dot terms 1/1000 of those per
/// second.
const RADIAL: FieldDef = FieldDef::new(22, 1e-4, true, true);
const ALONG: FieldDef = FieldDef::new(20, 4e-4, true, true);
const CROSS: FieldDef = FieldDef::new(20, 4e-4, true, true);
const DOT_RADIAL: FieldDef = FieldDef::new(21, 1e-6, true, true);
const DOT_ALONG: FieldDef = FieldDef::new(19, 4e-6, true, true);
const DOT_CROSS: FieldDef = FieldDef::new(19, 4e-6, true, true);

const CLOCK_C0: FieldDef = FieldDef::new(22, 1e-4, true, true);
const CLOCK_C1: FieldDef = FieldDef::new(21, 1e-6, true, true);
const CLOCK_C2: FieldDef = FieldDef::new(27, 2e-8, true, true);

const CODE_BIAS: FieldDef = FieldDef::new(14, 0.01, true, true);
const HR_CLOCK: FieldDef = FieldDef::new(22, 1e-4, true, true);

/// Common SSR message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SsrHeader {
    /// Seconds of week (GPS) or of day (GLONASS).
    pub epoch: u32,
    pub update_interval: u8,
    pub multiple: bool,
    pub satellite_datum: bool,
    pub iod_ssr: u8,
    pub provider: u16,
    pub solution: u8,
    pub n_sat: u8,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SsrOrbit {
    pub sat: Satellite,
    pub iode: u16,
    pub radial: Option<f64>,
    pub along: Option<f64>,
    pub cross: Option<f64>,
    pub dot_radial: Option<f64>,
    pub dot_along: Option<f64>,
    pub dot_cross: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SsrClock {
    pub sat: Satellite,
    pub c0: Option<f64>,
    pub c1: Option<f64>,
    pub c2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SsrBias {
    pub sat: Satellite,
    pub signal: u8,
    pub bias: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SsrKind {
    Orbit(Vec<SsrOrbit>),
    Clock(Vec<SsrClock>),
    CodeBias(Vec<SsrBias>),
    CombinedOrbitClock(Vec<SsrOrbit>, Vec<SsrClock>),
    Ura(Vec<(Satellite, Option<f64>)>),
    HighRateClock(Vec<(Satellite, Option<f64>)>),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SsrMessage {
    pub msg_type: u16,
    pub constellation: Constellation,
    pub header: SsrHeader,
    pub kind: SsrKind,
}

impl SsrMessage {
    pub fn n_sat(&self) -> usize {
        usize::from(self.header.n_sat)
    }
}

struct Geometry {
    constellation: Constellation,
    epoch_bits: usize,
    sat_bits: usize,
}

fn geometry(msg_type: u16) -> Geometry {
    if (1063..=1068).contains(&msg_type) {
        Geometry {
            constellation: Constellation::Glonass,
            epoch_bits: 17,
            sat_bits: 5,
        }
    } else {
        Geometry {
            constellation: Constellation::Gps,
            epoch_bits: 20,
            sat_bits: 6,
        }
    }
}

pub(super) fn decode(msg_type: u16, cur: &mut BitCursor<'_>) -> Result<SsrMessage, ErrorKind> {
    let geo = geometry(msg_type);
    // 1057/1060 and the GLONASS counterparts carry the datum flag.
    let kind_index = if msg_type >= 1063 {
        msg_type - 1063
    } else {
        msg_type - 1057
    };
    let has_datum = kind_index == 0 || kind_index == 3;

    let epoch = cur.take(geo.epoch_bits)? as u32;
    let update_interval = cur.take(4)? as u8;
    let multiple = cur.take_bool()?;
    let satellite_datum = if has_datum { cur.take_bool()? } else { false };
    let iod_ssr = cur.take(4)? as u8;
    let provider = cur.take(16)? as u16;
    let solution = cur.take(4)? as u8;
    let n_sat = cur.take(6)? as u8;

    let header = SsrHeader {
        epoch,
        update_interval,
        multiple,
        satellite_datum,
        iod_ssr,
        provider,
        solution,
        n_sat,
    };

    let sat = |cur: &mut BitCursor<'_>| -> Result<Satellite, ErrorKind> {
        let id = cur.take(geo.sat_bits)? as u16;
        Ok(Satellite::new(geo.constellation, id))
    };
    let orbit = |cur: &mut BitCursor<'_>| -> Result<SsrOrbit, ErrorKind> {
        let s = sat(cur)?;
        Ok(SsrOrbit {
            sat: s,
            iode: cur.take(8)? as u16,
            radial: RADIAL.read(cur)?,
            along: ALONG.read(cur)?,
            cross: CROSS.read(cur)?,
            dot_radial: DOT_RADIAL.read(cur)?,
            dot_along: DOT_ALONG.read(cur)?,
            dot_cross: DOT_CROSS.read(cur)?,
        })
    };
    let clock = |cur: &mut BitCursor<'_>| -> Result<SsrClock, ErrorKind> {
        let s = sat(cur)?;
        Ok(SsrClock {
            sat: s,
            c0: CLOCK_C0.read(cur)?,
            c1: CLOCK_C1.read(cur)?,
            c2: CLOCK_C2.read(cur)?,
        })
    };

    let n = usize::from(n_sat);
    let kind = match kind_index {
        0 => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                v.push(orbit(cur)?);
            }
            SsrKind::Orbit(v)
        },
        1 => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                v.push(clock(cur)?);
            }
            SsrKind::Clock(v)
        },
        2 => {
            let mut v = Vec::new();
            for _ in 0..n {
                let s = sat(cur)?;
                let n_bias = cur.take(5)? as usize;
                for _ in 0..n_bias {
                    let signal = cur.take(5)? as u8;
                    v.push(SsrBias {
                        sat: s,
                        signal,
                        bias: CODE_BIAS.read(cur)?,
                    });
                }
            }
            SsrKind::CodeBias(v)
        },
        3 => {
            let mut orbits = Vec::with_capacity(n);
            let mut clocks = Vec::with_capacity(n);
            for _ in 0..n {
                let o = orbit(cur)?;
                clocks.push(SsrClock {
                    sat: o.sat,
                    c0: CLOCK_C0.read(cur)?,
                    c1: CLOCK_C1.read(cur)?,
                    c2: CLOCK_C2.read(cur)?,
                });
                orbits.push(o);
            }
            SsrKind::CombinedOrbitClock(orbits, clocks)
        },
        4 => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                let s = sat(cur)?;
                let raw = cur.take(6)? as u8;
                v.push((s, crate::cssr::ura_to_meters(raw)));
            }
            SsrKind::Ura(v)
        },
        _ => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                let s = sat(cur)?;
                v.push((s, HR_CLOCK.read(cur)?));
            }
            SsrKind::HighRateClock(v)
        },
    };

    Ok(SsrMessage {
        msg_type,
        constellation: geo.constellation,
        header,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;

    fn write_header(w: &mut BitWriter, epoch_bits: usize, datum: bool, n_sat: u8) {
        w.put(epoch_bits, 518_400);
        w.put(4, 2); // update interval
        w.put(1, 0); // multiple
        if datum {
            w.put(1, 0);
        }
        w.put(4, 9); // IOD SSR
        w.put(16, 1023); // provider
        w.put(4, 1); // solution
        w.put(6, u64::from(n_sat));
    }

    #[test]
    fn hr_clock_1062() {
        let mut w = BitWriter::new();
        w.put(12, 1062);
        write_header(&mut w, 20, false, 2);
        w.put(6, 5);
        w.put_signed(22, 12345); // 1.2345 m
        w.put(6, 7);
        w.put_signed(22, -(1 << 21)); // invalid
        let payload = w.into_bytes();

        let mut cur = BitCursor::new(&payload);
        let msg_type = cur.take(12).unwrap() as u16;
        let msg = decode(msg_type, &mut cur).unwrap();
        assert_eq!(msg.header.iod_ssr, 9);
        assert_eq!(msg.n_sat(), 2);
        let SsrKind::HighRateClock(v) = &msg.kind else {
            panic!("expected hr clock");
        };
        assert_eq!(v[0].0.to_string(), "G05");
        assert!((v[0].1.unwrap() - 1.2345).abs() < 1e-9);
        assert_eq!(v[1].1, None);
    }

    #[test]
    fn glonass_code_bias_1065() {
        let mut w = BitWriter::new();
        w.put(12, 1065);
        write_header(&mut w, 17, false, 1);
        w.put(5, 3); // R03
        w.put(5, 2); // two biases
        w.put(5, 0);
        w.put_signed(14, 150); // 1.50 m
        w.put(5, 1);
        w.put_signed(14, -42);
        let payload = w.into_bytes();

        let mut cur = BitCursor::new(&payload);
        let msg_type = cur.take(12).unwrap() as u16;
        let msg = decode(msg_type, &mut cur).unwrap();
        assert_eq!(msg.constellation, Constellation::Glonass);
        let SsrKind::CodeBias(biases) = &msg.kind else {
            panic!("expected code bias");
        };
        assert_eq!(biases.len(), 2);
        assert_eq!(biases[0].sat.to_string(), "R03");
        assert!((biases[0].bias.unwrap() - 1.5).abs() < 1e-9);
        assert!((biases[1].bias.unwrap() + 0.42).abs() < 1e-9);
    }

    #[test]
    fn orbit_1057_with_datum_flag() {
        let mut w = BitWriter::new();
        w.put(12, 1057);
        write_header(&mut w, 20, true, 1);
        w.put(6, 12);
        w.put(8, 33); // IODE
        w.put_signed(22, 10_000); // 1.0 m radial
        w.put_signed(20, -2500); // -1.0 m along
        w.put_signed(20, 2500);
        w.put_signed(21, 0);
        w.put_signed(19, 0);
        w.put_signed(19, 0);
        let payload = w.into_bytes();

        let mut cur = BitCursor::new(&payload);
        let msg_type = cur.take(12).unwrap() as u16;
        let msg = decode(msg_type, &mut cur).unwrap();
        let SsrKind::Orbit(orbits) = &msg.kind else {
            panic!("expected orbit");
        };
        assert_eq!(orbits[0].iode, 33);
        assert!((orbits[0].radial.unwrap() - 1.0).abs() < 1e-9);
        assert!((orbits[0].along.unwrap() + 1.0).abs() < 1e-9);
    }
}
