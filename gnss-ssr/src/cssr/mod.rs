//! Compact SSR decoder.
//!
//! Two nearly-parallel dialects share this machinery: CLAS (L6D, subtypes
//! 1-12) and MADOCA-PPP (L6E, subtypes 1-14). Subtype 1 installs the mask;
//! every other subtype is a dense array indexed by it. The decoder owns the
//! mask table for its stream, enforces IODSSR gating and keeps the per-epoch
//! bit accounting that is surfaced at each subtype-1 boundary.
//!
//! BeiDou PPP-B2b maps onto the same concepts with its own message framing;
//! see [crate::b2b].

use log::debug;

use crate::bits::{BitCursor, OutOfBits};
use crate::error::{ErrorKind, Stage, StreamError};
use crate::sat::Satellite;

pub mod fields;
pub mod mask;

pub use fields::{DialectFields, FieldDef};
pub use mask::{signal_name, Mask, MaskEntry};

/// RTCM message number every compact SSR message opens with.
pub const CSSR_MESSAGE_NUMBER: u16 = 4073;

/// Compact SSR dialect carried on QZSS L6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dialect {
    Clas,
    MadocaPpp,
}

impl Dialect {
    pub fn fields(&self) -> &'static DialectFields {
        match self {
            Dialect::Clas => &fields::CLAS,
            Dialect::MadocaPpp => &fields::MADOCA_PPP,
        }
    }

    fn max_subtype(&self) -> u8 {
        match self {
            Dialect::Clas => 12,
            Dialect::MadocaPpp => 14,
        }
    }
}

/// Common header of every non-mask subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubtypeHeader {
    /// Epoch time: seconds of week for the mask subtype, seconds of hour
    /// elsewhere.
    pub tow: u32,
    pub update_interval: u8,
    pub multiple: bool,
    pub iodssr: u8,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrbitCorrection {
    pub sat: Satellite,
    pub iode: u16,
    pub radial: Option<f64>,
    pub along: Option<f64>,
    pub cross: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockCorrection {
    pub sat: Satellite,
    pub c0: Option<f64>,
}

/// A per-(satellite, signal) bias; phase biases also carry the
/// discontinuity indicator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalBias {
    pub sat: Satellite,
    pub signal: u8,
    pub bias: Option<f64>,
    pub discontinuity: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UraValue {
    pub sat: Satellite,
    /// Meters, decoded from the 6-bit class/value encoding; `None` when the
    /// field reads "not monitored".
    pub ura: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StecPolynomial {
    pub sat: Satellite,
    pub quality: u8,
    /// c00, then c01/c10, c11, c02/c20 as the STEC type admits, TECU.
    pub coeffs: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPoint {
    pub trop_wet: Option<f64>,
    pub stec_residual: Vec<(Satellite, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TropPolynomial {
    pub quality: u8,
    /// t00, then t01/t10, t11 as the type admits, meters.
    pub coeffs: Vec<Option<f64>>,
}

/// Decoded body of one compact SSR message.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CssrBody {
    Mask(Mask),
    Orbit(Vec<OrbitCorrection>),
    Clock(Vec<ClockCorrection>),
    CodeBias(Vec<SignalBias>),
    PhaseBias(Vec<SignalBias>),
    CombinedBias {
        network: Option<u8>,
        code: Vec<SignalBias>,
        phase: Vec<SignalBias>,
    },
    Ura(Vec<UraValue>),
    Stec {
        area: u8,
        polynomials: Vec<StecPolynomial>,
    },
    Grid {
        area: u8,
        points: Vec<GridPoint>,
    },
    ServiceInfo {
        counter: u8,
        data: Vec<u8>,
    },
    CombinedOrbitClock {
        network: Option<u8>,
        orbit: Vec<OrbitCorrection>,
        clock: Vec<ClockCorrection>,
    },
    Atmospheric {
        network: u8,
        troposphere: Option<TropPolynomial>,
        grid: Vec<GridPoint>,
        stec: Vec<StecPolynomial>,
    },
    /// MADOCA-PPP wide-area ionosphere polynomial set.
    Ionosphere(Vec<StecPolynomial>),
}

/// One decoded message: subtype tag, header, body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CssrMessage {
    pub subtype: u8,
    pub header: SubtypeHeader,
    pub body: CssrBody,
}

/// Cumulative bit accounting for one mask epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpochStats {
    pub n_sat: usize,
    pub n_sig: usize,
    pub bit_sat: usize,
    pub bit_sig: usize,
    pub bit_other: usize,
    pub bit_null: usize,
    pub bit_total: usize,
}

impl EpochStats {
    fn add_sat(&mut self, bits: usize) {
        self.bit_sat += bits;
        self.bit_total += bits;
    }

    fn add_sig(&mut self, bits: usize) {
        self.bit_sig += bits;
        self.bit_total += bits;
    }

    fn add_other(&mut self, bits: usize) {
        self.bit_other += bits;
        self.bit_total += bits;
    }

    fn add_null(&mut self, bits: usize) {
        self.bit_null += bits;
        self.bit_total += bits;
    }

    /// The accounting invariant.
    pub fn consistent(&self) -> bool {
        self.bit_sat + self.bit_sig + self.bit_other + self.bit_null == self.bit_total
    }
}

impl core::fmt::Display for EpochStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "n_sat={} n_sig={} bit_sat={} bit_sig={} bit_other={} bit_null={} bit_total={}",
            self.n_sat,
            self.n_sig,
            self.bit_sat,
            self.bit_sig,
            self.bit_other,
            self.bit_null,
            self.bit_total
        )
    }
}

/// Result of decoding one subframe's bit buffer.
#[derive(Debug, Default)]
pub struct SubframeOutput {
    pub messages: Vec<CssrMessage>,
    pub errors: Vec<StreamError>,
    /// Closed epoch statistics, present when this subframe carried a mask
    /// that superseded an open epoch.
    pub stats: Option<EpochStats>,
}

/// Stateful compact SSR decoder for one stream.
pub struct CssrDecoder {
    dialect: Dialect,
    mask: Option<Mask>,
    stats: EpochStats,
    epoch_open: bool,
}

impl CssrDecoder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            mask: None,
            stats: EpochStats::default(),
            epoch_open: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    /// Running statistics of the currently open epoch.
    pub fn stats(&self) -> &EpochStats {
        &self.stats
    }

    /// Decode the concatenated messages of one subframe buffer.
    ///
    /// `prn`/`tow` tag any error records. Messages are consumed greedily;
    /// trailing all-zero bits close the buffer as null padding.
    pub fn decode_subframe(
        &mut self,
        data: &[u8],
        bit_len: usize,
        prn: u16,
        tow: Option<u32>,
    ) -> SubframeOutput {
        let mut out = SubframeOutput::default();
        let mut cur = BitCursor::with_len(data, bit_len);

        loop {
            let remaining = cur.remaining();
            if remaining < 16 || cur.rest_is_zero() {
                if self.epoch_open {
                    self.stats.add_null(remaining);
                }
                break;
            }

            let mark = cur.position();
            // The message-number read cannot fail: 16 bits were checked.
            let msgnum = cur.take(12).unwrap_or(0) as u16;
            let subtype = cur.take(4).unwrap_or(0) as u8;
            if msgnum != CSSR_MESSAGE_NUMBER {
                // Not a message boundary; the rest of this buffer cannot be
                // sized and is abandoned.
                out.errors
                    .push(self.error(ErrorKind::UnknownSubtype(subtype), prn, tow));
                if self.epoch_open {
                    self.stats.add_null(cur.remaining() + 16);
                }
                break;
            }

            let pre_msgs = out.messages.len();
            let pre_total = self.stats.bit_total;
            let flow = self.decode_message(&mut cur, subtype, mark, prn, tow, &mut out);

            // Reconcile: whatever this message consumed beyond what the
            // subtype decoders booked is dead air. A freshly installed mask
            // resets the ledger and books itself.
            let mask_installed = subtype == 1 && out.messages.len() > pre_msgs;
            if self.epoch_open && !mask_installed {
                let consumed = cur.position() - mark;
                let accounted = self.stats.bit_total - pre_total;
                if accounted < consumed {
                    self.stats.add_null(consumed - accounted);
                }
            }

            match flow {
                Flow::Continue => {},
                Flow::Abandon => {
                    if self.epoch_open {
                        self.stats.add_null(cur.remaining());
                    }
                    break;
                },
            }
        }

        debug_assert!(self.stats.consistent());
        out
    }

    fn error(&self, kind: ErrorKind, prn: u16, tow: Option<u32>) -> StreamError {
        let mut e = StreamError::new(Stage::Decoder, kind).with_prn(prn);
        if let Some(t) = tow {
            e = e.with_tow(t);
        }
        e
    }

    fn decode_message(
        &mut self,
        cur: &mut BitCursor<'_>,
        subtype: u8,
        mark: usize,
        prn: u16,
        tow: Option<u32>,
        out: &mut SubframeOutput,
    ) -> Flow {
        let fields = self.dialect.fields();

        if subtype == 0 || subtype > self.dialect.max_subtype() {
            out.errors
                .push(self.error(ErrorKind::UnknownSubtype(subtype), prn, tow));
            return Flow::Abandon;
        }

        if subtype == 1 {
            return match self.decode_mask(cur, mark) {
                Ok((msg, closed)) => {
                    if let Some(stats) = closed {
                        out.stats = Some(stats);
                    }
                    out.messages.push(msg);
                    Flow::Continue
                },
                Err(e) => {
                    out.errors.push(self.error(e.into(), prn, tow));
                    Flow::Abandon
                },
            };
        }

        // Common header of every non-mask subtype.
        let header = match read_header(cur, fields, fields.epoch_time) {
            Ok(h) => h,
            Err(e) => {
                out.errors.push(self.error(e.into(), prn, tow));
                return Flow::Abandon;
            },
        };
        if self.epoch_open {
            self.stats
                .add_other(16 + fields.subtype_header_bits());
        }

        let Some(active) = self.mask.clone() else {
            // No geometry to size the body with.
            out.errors.push(self.error(ErrorKind::MaskAbsent, prn, tow));
            return Flow::Abandon;
        };

        if header.iodssr != active.iodssr {
            out.errors.push(self.error(
                ErrorKind::IodssrMismatch {
                    active: active.iodssr,
                    msg: header.iodssr,
                },
                prn,
                tow,
            ));
            // Skip the body, sized against the only geometry we have.
            return match subtype_body_bits(subtype, fields, &active) {
                Some(bits) if bits <= cur.remaining() => {
                    if cur.advance(bits).is_err() {
                        return Flow::Abandon;
                    }
                    if self.epoch_open {
                        self.stats.add_other(bits);
                    }
                    Flow::Continue
                },
                _ => Flow::Abandon,
            };
        }

        let decoded = self.decode_body(cur, subtype, &active);
        match decoded {
            Ok(body) => {
                debug!(
                    "cssr {:?} st{} decoded ({} bits)",
                    self.dialect,
                    subtype,
                    cur.position() - mark
                );
                out.messages.push(CssrMessage {
                    subtype,
                    header,
                    body,
                });
                Flow::Continue
            },
            Err(e) => {
                out.errors.push(self.error(e.into(), prn, tow));
                Flow::Abandon
            },
        }
    }

    /// Subtype 1. Returns the decoded message and, when it supersedes an
    /// open epoch, that epoch's closed statistics.
    fn decode_mask(
        &mut self,
        cur: &mut BitCursor<'_>,
        mark: usize,
    ) -> Result<(CssrMessage, Option<EpochStats>), OutOfBits> {
        let fields = self.dialect.fields();
        let header = read_header(cur, fields, fields.epoch_time_mask)?;
        let iodp = cur.take(fields.iodp as usize)? as u8;
        let mask = Mask::decode(cur, fields, header.iodssr, iodp)?;

        let closed = self.epoch_open.then(|| self.stats);
        self.stats = EpochStats {
            n_sat: mask.n_sat(),
            n_sig: mask.n_sig(),
            ..EpochStats::default()
        };
        self.epoch_open = true;
        self.stats.add_other(cur.position() - mark);

        debug!(
            "cssr {:?} mask installed: iodssr={} n_sat={} n_sig={}",
            self.dialect,
            mask.iodssr,
            mask.n_sat(),
            mask.n_sig()
        );
        self.mask = Some(mask.clone());
        Ok((
            CssrMessage {
                subtype: 1,
                header,
                body: CssrBody::Mask(mask),
            },
            closed,
        ))
    }

    fn decode_body(
        &mut self,
        cur: &mut BitCursor<'_>,
        subtype: u8,
        mask: &Mask,
    ) -> Result<CssrBody, OutOfBits> {
        let fields = self.dialect.fields();
        match subtype {
            2 => {
                let mut sats = Vec::with_capacity(mask.n_sat());
                for sat in mask.satellites() {
                    let mark = cur.position();
                    sats.push(read_orbit(cur, fields, sat)?);
                    self.stats.add_sat(cur.position() - mark);
                }
                Ok(CssrBody::Orbit(sats))
            },
            3 => {
                let mut sats = Vec::with_capacity(mask.n_sat());
                for sat in mask.satellites() {
                    let mark = cur.position();
                    let c0 = fields.clock_c0.read(cur)?;
                    self.stats.add_sat(cur.position() - mark);
                    sats.push(ClockCorrection { sat, c0 });
                }
                Ok(CssrBody::Clock(sats))
            },
            4 => {
                let mut cells = Vec::with_capacity(mask.n_sig());
                for (sat, signal) in mask.cells() {
                    let mark = cur.position();
                    let bias = fields.code_bias.read(cur)?;
                    self.stats.add_sig(cur.position() - mark);
                    cells.push(SignalBias {
                        sat,
                        signal,
                        bias,
                        discontinuity: None,
                    });
                }
                Ok(CssrBody::CodeBias(cells))
            },
            5 => {
                let mut cells = Vec::with_capacity(mask.n_sig());
                for (sat, signal) in mask.cells() {
                    let mark = cur.position();
                    let bias = fields.phase_bias.read(cur)?;
                    let disc = cur.take(fields.phase_discontinuity as usize)? as u8;
                    self.stats.add_sig(cur.position() - mark);
                    cells.push(SignalBias {
                        sat,
                        signal,
                        bias,
                        discontinuity: Some(disc),
                    });
                }
                Ok(CssrBody::PhaseBias(cells))
            },
            6 => {
                let mark = cur.position();
                let code_avail = cur.take_bool()?;
                let phase_avail = cur.take_bool()?;
                let network = cur.take_bool()?;
                let (net_id, included) = if network {
                    let id = cur.take(8)? as u8;
                    let included = read_sat_subset(cur, mask)?;
                    (Some(id), included)
                } else {
                    (None, mask.entries.clone())
                };
                self.stats.add_other(cur.position() - mark);

                let mut code = Vec::new();
                let mut phase = Vec::new();
                for entry in &included {
                    for signal in &entry.signals {
                        let mark = cur.position();
                        if code_avail {
                            code.push(SignalBias {
                                sat: entry.sat,
                                signal: *signal,
                                bias: fields.code_bias.read(cur)?,
                                discontinuity: None,
                            });
                        }
                        if phase_avail {
                            let bias = fields.phase_bias.read(cur)?;
                            let disc = cur.take(fields.phase_discontinuity as usize)? as u8;
                            phase.push(SignalBias {
                                sat: entry.sat,
                                signal: *signal,
                                bias,
                                discontinuity: Some(disc),
                            });
                        }
                        self.stats.add_sig(cur.position() - mark);
                    }
                }
                Ok(CssrBody::CombinedBias {
                    network: net_id,
                    code,
                    phase,
                })
            },
            7 => {
                let mut sats = Vec::with_capacity(mask.n_sat());
                for sat in mask.satellites() {
                    let mark = cur.position();
                    let raw = cur.take(fields.ura as usize)? as u8;
                    self.stats.add_sat(cur.position() - mark);
                    sats.push(UraValue {
                        sat,
                        ura: ura_to_meters(raw),
                    });
                }
                Ok(CssrBody::Ura(sats))
            },
            8 => {
                let mark = cur.position();
                let stec_type = cur.take(2)? as u8;
                let area = cur.take(5)? as u8;
                let included = read_sat_subset(cur, mask)?;
                self.stats.add_other(cur.position() - mark);

                let mut polynomials = Vec::new();
                for entry in &included {
                    let mark = cur.position();
                    polynomials.push(read_stec_poly(cur, fields, entry.sat, stec_type)?);
                    self.stats.add_sat(cur.position() - mark);
                }
                Ok(CssrBody::Stec { area, polynomials })
            },
            9 => {
                let mark = cur.position();
                let _trop_type = cur.take(2)? as u8;
                let wide_range = cur.take_bool()?;
                let area = cur.take(5)? as u8;
                let included = read_sat_subset(cur, mask)?;
                let n_grid = cur.take(6)? as usize;
                self.stats.add_other(cur.position() - mark);

                let residual = if wide_range {
                    fields.stec_residual_large
                } else {
                    fields.stec_residual_small
                };
                let mut points = Vec::with_capacity(n_grid);
                for _ in 0..n_grid {
                    let mark = cur.position();
                    let trop_wet = fields.trop_wet.read(cur)?;
                    self.stats.add_other(cur.position() - mark);
                    let mut stec_residual = Vec::with_capacity(included.len());
                    for entry in &included {
                        let mark = cur.position();
                        stec_residual.push((entry.sat, residual.read(cur)?));
                        self.stats.add_sat(cur.position() - mark);
                    }
                    points.push(GridPoint {
                        trop_wet,
                        stec_residual,
                    });
                }
                Ok(CssrBody::Grid { area, points })
            },
            10 => {
                let mark = cur.position();
                let counter = cur.take(3)? as u8;
                let size = cur.take(2)? as usize;
                let data = cur.take_bytes((size + 1) * 5)?;
                self.stats.add_other(cur.position() - mark);
                Ok(CssrBody::ServiceInfo { counter, data })
            },
            11 => {
                let mark = cur.position();
                let orbit_avail = cur.take_bool()?;
                let clock_avail = cur.take_bool()?;
                let network = cur.take_bool()?;
                let (net_id, included) = if network {
                    let id = cur.take(8)? as u8;
                    let included = read_sat_subset(cur, mask)?;
                    (Some(id), included)
                } else {
                    (None, mask.entries.clone())
                };
                self.stats.add_other(cur.position() - mark);

                let mut orbit = Vec::new();
                let mut clock = Vec::new();
                for entry in &included {
                    let mark = cur.position();
                    if orbit_avail {
                        orbit.push(read_orbit(cur, fields, entry.sat)?);
                    }
                    if clock_avail {
                        clock.push(ClockCorrection {
                            sat: entry.sat,
                            c0: fields.clock_c0.read(cur)?,
                        });
                    }
                    self.stats.add_sat(cur.position() - mark);
                }
                Ok(CssrBody::CombinedOrbitClock {
                    network: net_id,
                    orbit,
                    clock,
                })
            },
            12 => {
                let mark = cur.position();
                let trop_avail = cur.take_bool()?;
                let stec_avail = cur.take_bool()?;
                let network = cur.take(8)? as u8;
                let included = read_sat_subset(cur, mask)?;
                self.stats.add_other(cur.position() - mark);

                let mut troposphere = None;
                let mut grid = Vec::new();
                if trop_avail {
                    let mark = cur.position();
                    let trop_type = cur.take(2)? as u8;
                    let quality = cur.take(fields.stec_quality as usize)? as u8;
                    let mut coeffs = vec![fields.trop_t00.read(cur)?];
                    if trop_type >= 1 {
                        coeffs.push(fields.trop_t01.read(cur)?);
                        coeffs.push(fields.trop_t10.read(cur)?);
                    }
                    if trop_type >= 2 {
                        coeffs.push(fields.trop_t11.read(cur)?);
                    }
                    troposphere = Some(TropPolynomial { quality, coeffs });
                    let n_grid = cur.take(6)? as usize;
                    self.stats.add_other(cur.position() - mark);
                    for _ in 0..n_grid {
                        let mark = cur.position();
                        let trop_wet = fields.trop_wet.read(cur)?;
                        self.stats.add_other(cur.position() - mark);
                        grid.push(GridPoint {
                            trop_wet,
                            stec_residual: Vec::new(),
                        });
                    }
                }

                let mut stec = Vec::new();
                if stec_avail {
                    let mark = cur.position();
                    let stec_type = cur.take(2)? as u8;
                    self.stats.add_other(cur.position() - mark);
                    for entry in &included {
                        let mark = cur.position();
                        stec.push(read_stec_poly(cur, fields, entry.sat, stec_type)?);
                        self.stats.add_sat(cur.position() - mark);
                    }
                }
                Ok(CssrBody::Atmospheric {
                    network,
                    troposphere,
                    grid,
                    stec,
                })
            },
            13 => {
                // MADOCA-PPP wide-area ionosphere.
                let mark = cur.position();
                let stec_type = cur.take(2)? as u8;
                let included = read_sat_subset(cur, mask)?;
                self.stats.add_other(cur.position() - mark);
                let mut polys = Vec::new();
                for entry in &included {
                    let mark = cur.position();
                    polys.push(read_stec_poly(cur, fields, entry.sat, stec_type)?);
                    self.stats.add_sat(cur.position() - mark);
                }
                Ok(CssrBody::Ionosphere(polys))
            },
            14 => {
                let mark = cur.position();
                let counter = cur.take(3)? as u8;
                let size = cur.take(2)? as usize;
                let data = cur.take_bytes((size + 1) * 5)?;
                self.stats.add_other(cur.position() - mark);
                Ok(CssrBody::ServiceInfo { counter, data })
            },
            _ => unreachable!("gated by max_subtype"),
        }
    }
}

enum Flow {
    Continue,
    Abandon,
}

fn read_header(
    cur: &mut BitCursor<'_>,
    fields: &DialectFields,
    epoch_bits: u8,
) -> Result<SubtypeHeader, OutOfBits> {
    let tow = cur.take(epoch_bits as usize)? as u32;
    let update_interval = cur.take(fields.update_interval as usize)? as u8;
    let multiple = cur.take_bool()?;
    let iodssr = cur.take(fields.iodssr as usize)? as u8;
    Ok(SubtypeHeader {
        tow,
        update_interval,
        multiple,
        iodssr,
    })
}

fn read_orbit(
    cur: &mut BitCursor<'_>,
    fields: &DialectFields,
    sat: Satellite,
) -> Result<OrbitCorrection, OutOfBits> {
    let iode = cur.take(fields.iode as usize)? as u16;
    Ok(OrbitCorrection {
        sat,
        iode,
        radial: fields.orbit_radial.read(cur)?,
        along: fields.orbit_along.read(cur)?,
        cross: fields.orbit_cross.read(cur)?,
    })
}

fn read_stec_poly(
    cur: &mut BitCursor<'_>,
    fields: &DialectFields,
    sat: Satellite,
    stec_type: u8,
) -> Result<StecPolynomial, OutOfBits> {
    let quality = cur.take(fields.stec_quality as usize)? as u8;
    let mut coeffs = vec![fields.stec_c00.read(cur)?];
    if stec_type >= 1 {
        coeffs.push(fields.stec_c01.read(cur)?);
        coeffs.push(fields.stec_c10.read(cur)?);
    }
    if stec_type >= 2 {
        coeffs.push(fields.stec_c11.read(cur)?);
    }
    if stec_type >= 3 {
        coeffs.push(fields.stec_c02.read(cur)?);
        coeffs.push(fields.stec_c20.read(cur)?);
    }
    Ok(StecPolynomial {
        sat,
        quality,
        coeffs,
    })
}

/// One bit per masked satellite selecting a subset, in mask order.
fn read_sat_subset(
    cur: &mut BitCursor<'_>,
    mask: &Mask,
) -> Result<Vec<MaskEntry>, OutOfBits> {
    let mut included = Vec::new();
    for entry in &mask.entries {
        if cur.take_bool()? {
            included.push(entry.clone());
        }
    }
    Ok(included)
}

/// 6-bit URA class/value to meters, GPS convention; all-ones reads "not
/// monitored".
pub fn ura_to_meters(raw: u8) -> Option<f64> {
    if raw == 0x3f {
        return None;
    }
    let class = f64::from((raw >> 3) & 0x7);
    let value = f64::from(raw & 0x7);
    Some((3f64.powf(class) * (1.0 + value / 4.0) - 1.0) * 1e-3)
}

/// Body length in bits of the fixed-geometry subtypes, for skipping a
/// gated message. Subtypes with internal flags cannot be sized from the
/// mask alone.
fn subtype_body_bits(subtype: u8, fields: &DialectFields, mask: &Mask) -> Option<usize> {
    let n_sat = mask.n_sat();
    let n_sig = mask.n_sig();
    match subtype {
        2 => Some(n_sat * fields.orbit_bits()),
        3 => Some(n_sat * fields.clock_c0.bits()),
        4 => Some(n_sig * fields.code_bias.bits()),
        5 => Some(n_sig * (fields.phase_bias.bits() + fields.phase_discontinuity as usize)),
        7 => Some(n_sat * fields.ura as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;
    use crate::cssr::mask::tests::write_gnss_block;

    fn write_message_header(w: &mut BitWriter, subtype: u8) {
        w.put(12, u64::from(CSSR_MESSAGE_NUMBER));
        w.put(4, u64::from(subtype));
    }

    fn write_subtype_header(w: &mut BitWriter, fields: &DialectFields, epoch_bits: u8, iodssr: u8) {
        w.put(epoch_bits as usize, 3600);
        w.put(fields.update_interval as usize, 2);
        w.put(1, 0);
        w.put(fields.iodssr as usize, u64::from(iodssr));
    }

    /// Mask over two GPS satellites with three signals, no cell mask.
    fn write_st1(w: &mut BitWriter, iodssr: u8) {
        let fields = &fields::CLAS;
        write_message_header(w, 1);
        write_subtype_header(w, fields, fields.epoch_time_mask, iodssr);
        w.put(fields.iodp as usize, 0);
        w.put(4, 1); // one GNSS
        write_gnss_block(w, 0, &[1, 16], &[0, 7, 9], None);
    }

    fn write_st3(w: &mut BitWriter, iodssr: u8, values: &[i64]) {
        let fields = &fields::CLAS;
        write_message_header(w, 3);
        write_subtype_header(w, fields, fields.epoch_time, iodssr);
        for v in values {
            w.put_signed(fields.clock_c0.bits(), *v);
        }
    }

    fn finish(w: &mut BitWriter) -> (Vec<u8>, usize) {
        let len = w.bit_len();
        w.pad_to_byte();
        (w.as_bytes().to_vec(), w.bit_len().max(len))
    }

    #[test]
    fn mask_then_clock_decodes_against_it() {
        let mut w = BitWriter::new();
        write_st1(&mut w, 5);
        write_st3(&mut w, 5, &[302, -302]);
        let (bytes, bits) = finish(&mut w);

        let mut dec = CssrDecoder::new(Dialect::Clas);
        let out = dec.decode_subframe(&bytes, bits, 199, Some(100));
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.messages.len(), 2);

        let CssrBody::Mask(mask) = &out.messages[0].body else {
            panic!("expected mask");
        };
        assert_eq!(mask.n_sat(), 2);
        assert_eq!(mask.n_sig(), 6);

        let CssrBody::Clock(clocks) = &out.messages[1].body else {
            panic!("expected clock");
        };
        assert!((clocks[0].c0.unwrap() - 0.4832).abs() < 1e-9);
        assert!((clocks[1].c0.unwrap() + 0.4832).abs() < 1e-9);
    }

    #[test]
    fn iodssr_mismatch_keeps_mask_and_skips_body() {
        let mut w = BitWriter::new();
        write_st1(&mut w, 5);
        write_st3(&mut w, 6, &[302, -302]); // stale IODSSR
        write_st3(&mut w, 5, &[100, 200]); // current again
        let (bytes, bits) = finish(&mut w);

        let mut dec = CssrDecoder::new(Dialect::Clas);
        let out = dec.decode_subframe(&bytes, bits, 199, None);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(
            out.errors[0].kind,
            ErrorKind::IodssrMismatch { active: 5, msg: 6 }
        );
        // Mask unchanged, later message with matching IODSSR still decodes.
        assert_eq!(dec.mask().unwrap().iodssr, 5);
        assert_eq!(out.messages.len(), 2);
        let CssrBody::Clock(clocks) = &out.messages[1].body else {
            panic!("expected clock");
        };
        assert!((clocks[0].c0.unwrap() - 0.16).abs() < 1e-9);
    }

    #[test]
    fn subtype_before_any_mask_waits() {
        let mut w = BitWriter::new();
        write_st3(&mut w, 5, &[302, -302]);
        let (bytes, bits) = finish(&mut w);

        let mut dec = CssrDecoder::new(Dialect::Clas);
        let out = dec.decode_subframe(&bytes, bits, 199, None);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, ErrorKind::MaskAbsent);
        assert!(out.messages.is_empty());
    }

    #[test]
    fn stats_surface_on_next_mask_and_account_all_bits() {
        let mut w = BitWriter::new();
        write_st1(&mut w, 5);
        write_st3(&mut w, 5, &[302, -302]);
        let (bytes, bits) = finish(&mut w);

        let mut dec = CssrDecoder::new(Dialect::Clas);
        let first = dec.decode_subframe(&bytes, bits, 199, None);
        assert!(first.stats.is_none());
        assert!(dec.stats().consistent());
        assert_eq!(dec.stats().bit_total, bits);
        assert_eq!(dec.stats().n_sat, 2);

        // A new mask closes the epoch and surfaces its statistics.
        let mut w2 = BitWriter::new();
        write_st1(&mut w2, 6);
        let (bytes2, bits2) = finish(&mut w2);
        let second = dec.decode_subframe(&bytes2, bits2, 199, None);
        let stats = second.stats.expect("closed epoch stats");
        assert!(stats.consistent());
        assert_eq!(stats.bit_total, bits);
        assert_eq!(stats.n_sat, 2);
        assert_eq!(stats.n_sig, 6);
        assert!(stats.bit_sat > 0);
        assert_eq!(dec.mask().unwrap().iodssr, 6);
    }

    #[test]
    fn orbit_invalid_sentinel_is_none() {
        let fields = &fields::CLAS;
        let mut w = BitWriter::new();
        write_st1(&mut w, 1);
        write_message_header(&mut w, 2);
        write_subtype_header(&mut w, fields, fields.epoch_time, 1);
        for _ in 0..2 {
            w.put(fields.iode as usize, 82);
            w.put_signed(fields.orbit_radial.bits(), -(1 << 14)); // invalid
            w.put_signed(fields.orbit_along.bits(), -406);
            w.put_signed(fields.orbit_cross.bits(), 98);
        }
        let (bytes, bits) = finish(&mut w);

        let mut dec = CssrDecoder::new(Dialect::Clas);
        let out = dec.decode_subframe(&bytes, bits, 199, None);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let CssrBody::Orbit(orbits) = &out.messages[1].body else {
            panic!("expected orbit");
        };
        assert_eq!(orbits[0].iode, 82);
        assert_eq!(orbits[0].radial, None);
        assert!((orbits[0].along.unwrap() + 2.5984).abs() < 1e-9);
        assert!((orbits[0].cross.unwrap() - 0.6272).abs() < 1e-9);
    }

    #[test]
    fn unknown_subtype_abandons_subframe() {
        let mut w = BitWriter::new();
        write_st1(&mut w, 1);
        write_message_header(&mut w, 13); // not a CLAS subtype
        w.put(32, 0xdead_beef);
        let (bytes, bits) = finish(&mut w);

        let mut dec = CssrDecoder::new(Dialect::Clas);
        let out = dec.decode_subframe(&bytes, bits, 199, None);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, ErrorKind::UnknownSubtype(13));
        assert!(dec.stats().consistent());
    }

    #[test]
    fn ura_encoding() {
        assert_eq!(ura_to_meters(0x3f), None);
        let v = ura_to_meters(0).unwrap();
        assert!(v.abs() < 1e-12);
        // class 2, value 1 -> (9 * 1.25 - 1) mm
        let v = ura_to_meters(0b010_001).unwrap();
        assert!((v - 0.010_25).abs() < 1e-9);
    }

    #[test]
    fn null_padding_counts_toward_epoch() {
        let mut w = BitWriter::new();
        write_st1(&mut w, 1);
        w.put(40, 0); // trailing null pad
        let (bytes, bits) = finish(&mut w);

        let mut dec = CssrDecoder::new(Dialect::Clas);
        let out = dec.decode_subframe(&bytes, bits, 199, None);
        assert!(out.errors.is_empty());
        assert!(dec.stats().bit_null >= 40);
        assert!(dec.stats().consistent());
        assert_eq!(dec.stats().bit_total, bits);
    }
}
