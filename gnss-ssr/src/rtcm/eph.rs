//! Broadcast ephemeris messages.
//!
//! Fixed constellation-specific layouts: 1019 GPS, 1020 GLONASS, 1041
//! NavIC, 1042 BeiDou, 1044 QZSS, 1045/1046 Galileo F/NAV and I/NAV.
//! Keplerian elements are converted from semicircles to radians on decode;
//! GLONASS state vectors from km to meters.

use core::f64::consts::PI;

use crate::bits::{BitCursor, OutOfBits};
use crate::error::ErrorKind;
use crate::sat::{Constellation, Satellite};

/// Keplerian broadcast ephemeris (GPS, QZSS, NavIC, BeiDou, Galileo).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeplerEphemeris {
    pub sat: Satellite,
    pub week: u16,
    pub ura: u8,
    pub iode: u16,
    pub iodc: u16,
    /// Seconds of week.
    pub toe: u32,
    pub toc: u32,
    /// Clock polynomial, s, s/s, s/s^2.
    pub af0: f64,
    pub af1: f64,
    pub af2: f64,
    /// Orbit radius and shape.
    pub sqrt_a: f64,
    pub e: f64,
    /// Angles in radians, rates in rad/s.
    pub m0: f64,
    pub delta_n: f64,
    pub omega0: f64,
    pub omega_dot: f64,
    pub omega: f64,
    pub i0: f64,
    pub idot: f64,
    /// Harmonic corrections, m and rad.
    pub crs: f64,
    pub crc: f64,
    pub cus: f64,
    pub cuc: f64,
    pub cis: f64,
    pub cic: f64,
    /// Group delay, s (BGD for Galileo, TGD1 for BeiDou).
    pub tgd: f64,
    pub health: u8,
}

/// GLONASS broadcast ephemeris (message 1020).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlonassEphemeris {
    pub sat: Satellite,
    /// Frequency channel, -7..=13.
    pub frequency_channel: i8,
    /// Ephemeris reference time within the day, 15-minute units.
    pub tb: u8,
    pub healthy: bool,
    /// ECEF PZ-90 position (m), velocity (m/s), acceleration (m/s^2).
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub acceleration: [f64; 3],
    /// Clock offset and relative frequency bias.
    pub tau: f64,
    pub gamma: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ephemeris {
    Kepler(KeplerEphemeris),
    Glonass(GlonassEphemeris),
}

impl Ephemeris {
    pub fn sat(&self) -> Satellite {
        match self {
            Ephemeris::Kepler(e) => e.sat,
            Ephemeris::Glonass(e) => e.sat,
        }
    }
}

/// Two's-complement field scaled by 2^exp.
fn p2(cur: &mut BitCursor<'_>, bits: usize, exp: i32) -> Result<f64, OutOfBits> {
    Ok(cur.take_signed(bits)? as f64 * (exp as f64).exp2())
}

/// Unsigned field scaled by 2^exp.
fn up2(cur: &mut BitCursor<'_>, bits: usize, exp: i32) -> Result<f64, OutOfBits> {
    Ok(cur.take(bits)? as f64 * (exp as f64).exp2())
}

/// Semicircle field to radians.
fn sc(cur: &mut BitCursor<'_>, bits: usize, exp: i32) -> Result<f64, OutOfBits> {
    Ok(p2(cur, bits, exp)? * PI)
}

/// GLONASS sign-magnitude field scaled by 2^exp.
fn sign_mag(cur: &mut BitCursor<'_>, bits: usize, exp: i32) -> Result<f64, OutOfBits> {
    let sign = cur.take_bool()?;
    let mag = cur.take(bits - 1)? as f64 * (exp as f64).exp2();
    Ok(if sign { -mag } else { mag })
}

pub(super) fn decode(msg_type: u16, cur: &mut BitCursor<'_>) -> Result<Ephemeris, ErrorKind> {
    match msg_type {
        1019 => gps_like(cur, Constellation::Gps, 6, 0).map(Ephemeris::Kepler),
        1044 => gps_like(cur, Constellation::Qzss, 4, 192).map(Ephemeris::Kepler),
        1041 => gps_like(cur, Constellation::Irnss, 6, 0).map(Ephemeris::Kepler),
        1042 => beidou(cur).map(Ephemeris::Kepler),
        1045 | 1046 => galileo(cur).map(Ephemeris::Kepler),
        1020 => glonass(cur).map(Ephemeris::Glonass),
        other => Err(ErrorKind::UnknownSubtype((other % 100) as u8)),
    }
}

/// GPS LNAV layout, shared by QZSS and NavIC with a different PRN field.
fn gps_like(
    cur: &mut BitCursor<'_>,
    constellation: Constellation,
    prn_bits: usize,
    prn_offset: u16,
) -> Result<KeplerEphemeris, ErrorKind> {
    let prn = cur.take(prn_bits)? as u16 + prn_offset;
    let week = cur.take(10)? as u16;
    let ura = cur.take(4)? as u8;
    let _code_on_l2 = cur.take(2)?;
    let idot = sc(cur, 14, -43)?;
    let iode = cur.take(8)? as u16;
    let toc = cur.take(16)? as u32 * 16;
    let af2 = p2(cur, 8, -55)?;
    let af1 = p2(cur, 16, -43)?;
    let af0 = p2(cur, 22, -31)?;
    let iodc = cur.take(10)? as u16;
    let crs = p2(cur, 16, -5)?;
    let delta_n = sc(cur, 16, -43)?;
    let m0 = sc(cur, 32, -31)?;
    let cuc = p2(cur, 16, -29)?;
    let e = up2(cur, 32, -33)?;
    let cus = p2(cur, 16, -29)?;
    let sqrt_a = up2(cur, 32, -19)?;
    let toe = cur.take(16)? as u32 * 16;
    let cic = p2(cur, 16, -29)?;
    let omega0 = sc(cur, 32, -31)?;
    let cis = p2(cur, 16, -29)?;
    let i0 = sc(cur, 32, -31)?;
    let crc = p2(cur, 16, -5)?;
    let omega = sc(cur, 32, -31)?;
    let omega_dot = sc(cur, 24, -43)?;
    let tgd = p2(cur, 8, -31)?;
    let health = cur.take(6)? as u8;
    let _l2p = cur.take_bool()?;
    let _fit = cur.take_bool()?;

    Ok(KeplerEphemeris {
        sat: Satellite::new(constellation, prn),
        week,
        ura,
        iode,
        iodc,
        toe,
        toc,
        af0,
        af1,
        af2,
        sqrt_a,
        e,
        m0,
        delta_n,
        omega0,
        omega_dot,
        omega,
        i0,
        idot,
        crs,
        crc,
        cus,
        cuc,
        cis,
        cic,
        tgd,
        health,
    })
}

fn beidou(cur: &mut BitCursor<'_>) -> Result<KeplerEphemeris, ErrorKind> {
    let prn = cur.take(6)? as u16;
    let week = cur.take(13)? as u16;
    let ura = cur.take(4)? as u8;
    let idot = sc(cur, 14, -43)?;
    let iode = cur.take(5)? as u16;
    let toc = cur.take(17)? as u32 * 8;
    let af2 = p2(cur, 11, -66)?;
    let af1 = p2(cur, 22, -50)?;
    let af0 = p2(cur, 24, -33)?;
    let iodc = cur.take(5)? as u16;
    let crs = p2(cur, 18, -6)?;
    let delta_n = sc(cur, 16, -43)?;
    let m0 = sc(cur, 32, -31)?;
    let cuc = p2(cur, 18, -31)?;
    let e = up2(cur, 32, -33)?;
    let cus = p2(cur, 18, -31)?;
    let sqrt_a = up2(cur, 32, -19)?;
    let toe = cur.take(17)? as u32 * 8;
    let cic = p2(cur, 18, -31)?;
    let omega0 = sc(cur, 32, -31)?;
    let cis = p2(cur, 18, -31)?;
    let i0 = sc(cur, 32, -31)?;
    let crc = p2(cur, 18, -6)?;
    let omega = sc(cur, 32, -31)?;
    let omega_dot = sc(cur, 24, -43)?;
    let tgd = p2(cur, 10, 0)? * 1e-10; // 0.1 ns steps
    let _tgd2 = p2(cur, 10, 0)?;
    let health = cur.take(1)? as u8;

    Ok(KeplerEphemeris {
        sat: Satellite::new(Constellation::Beidou, prn),
        week,
        ura,
        iode,
        iodc,
        toe,
        toc,
        af0,
        af1,
        af2,
        sqrt_a,
        e,
        m0,
        delta_n,
        omega0,
        omega_dot,
        omega,
        i0,
        idot,
        crs,
        crc,
        cus,
        cuc,
        cis,
        cic,
        tgd,
        health,
    })
}

/// 1045 (F/NAV) and 1046 (I/NAV) share the element layout; the health and
/// group-delay tail differs but both reduce to the same record here.
fn galileo(cur: &mut BitCursor<'_>) -> Result<KeplerEphemeris, ErrorKind> {
    let prn = cur.take(6)? as u16;
    let week = cur.take(12)? as u16;
    let iodnav = cur.take(10)? as u16;
    let sisa = cur.take(8)? as u8;
    let idot = sc(cur, 14, -43)?;
    let toc = cur.take(14)? as u32 * 60;
    let af2 = p2(cur, 6, -59)?;
    let af1 = p2(cur, 21, -46)?;
    let af0 = p2(cur, 31, -34)?;
    let crs = p2(cur, 16, -5)?;
    let delta_n = sc(cur, 16, -43)?;
    let m0 = sc(cur, 32, -31)?;
    let cuc = p2(cur, 16, -29)?;
    let e = up2(cur, 32, -33)?;
    let cus = p2(cur, 16, -29)?;
    let sqrt_a = up2(cur, 32, -19)?;
    let toe = cur.take(14)? as u32 * 60;
    let cic = p2(cur, 16, -29)?;
    let omega0 = sc(cur, 32, -31)?;
    let cis = p2(cur, 16, -29)?;
    let i0 = sc(cur, 32, -31)?;
    let crc = p2(cur, 16, -5)?;
    let omega = sc(cur, 32, -31)?;
    let omega_dot = sc(cur, 24, -43)?;
    let tgd = p2(cur, 10, -32)?;
    let health = cur.take(2)? as u8;

    Ok(KeplerEphemeris {
        sat: Satellite::new(Constellation::Galileo, prn),
        week,
        ura: sisa,
        iode: iodnav,
        iodc: iodnav,
        toe,
        toc,
        af0,
        af1,
        af2,
        sqrt_a,
        e,
        m0,
        delta_n,
        omega0,
        omega_dot,
        omega,
        i0,
        idot,
        crs,
        crc,
        cus,
        cuc,
        cis,
        cic,
        tgd,
        health,
    })
}

fn glonass(cur: &mut BitCursor<'_>) -> Result<GlonassEphemeris, ErrorKind> {
    const KM: f64 = 1e3;

    let prn = cur.take(6)? as u16;
    let channel = cur.take(5)? as i8 - 7;
    let _alm_health = cur.take_bool()?;
    let _alm_health_avail = cur.take_bool()?;
    let _p1 = cur.take(2)?;
    let _tk = cur.take(12)?;
    let bn = cur.take_bool()?;
    let _p2 = cur.take_bool()?;
    let tb = cur.take(7)? as u8;

    let mut velocity = [0f64; 3];
    let mut position = [0f64; 3];
    let mut acceleration = [0f64; 3];
    for axis in 0..3 {
        velocity[axis] = sign_mag(cur, 24, -20)? * KM;
        position[axis] = sign_mag(cur, 27, -11)? * KM;
        acceleration[axis] = sign_mag(cur, 5, -30)? * KM;
    }

    let _p3 = cur.take_bool()?;
    let gamma = sign_mag(cur, 11, -40)?;
    let _mp = cur.take(2)?;
    let _ln3 = cur.take_bool()?;
    let tau = sign_mag(cur, 22, -30)?;
    let _delta_tau = sign_mag(cur, 5, -30)?;
    let _en = cur.take(5)?;

    Ok(GlonassEphemeris {
        sat: Satellite::new(Constellation::Glonass, prn),
        frequency_channel: channel,
        tb,
        healthy: !bn,
        position,
        velocity,
        acceleration,
        tau,
        gamma,
    })
}
