//! Multiple Signal Messages (MSM4-MSM7).
//!
//! The variable layout is driven by three masks: 64 satellite bits, 32
//! signal bits and a satellite-major cell mask. Each data field is then a
//! block across all satellites (or cells), not interleaved per satellite.

use crate::bits::BitCursor;
use crate::cssr::FieldDef;
use crate::error::ErrorKind;
use crate::sat::Constellation;

const C_LIGHT: f64 = 299_792_458.0;
/// Range covered by one millisecond of travel time.
const RANGE_MS: f64 = C_LIGHT * 1e-3;

/// Fine pseudorange / phase-range fields, in milliseconds.
const FINE_PR_4: FieldDef = FieldDef::new(15, 1.0 / (1 << 24) as f64, true, true);
const FINE_PH_4: FieldDef = FieldDef::new(22, 1.0 / (1 << 29) as f64, true, true);
const FINE_PR_67: FieldDef = FieldDef::new(20, 1.0 / (1 << 29) as f64, true, true);
const FINE_PH_67: FieldDef = FieldDef::new(24, 1.0 / (1u64 << 31) as f64, true, true);
/// Fine phase-range rate, m/s.
const FINE_RATE: FieldDef = FieldDef::new(15, 1e-4, true, true);
/// Rough phase-range rate, m/s.
const ROUGH_RATE: FieldDef = FieldDef::new(14, 1.0, true, true);

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MsmSatellite {
    /// In-constellation satellite id (1-64).
    pub id: u8,
    /// Rough range, ms, `None` when the integer part reads invalid.
    pub rough_range_ms: Option<f64>,
    /// Rough phase-range rate, m/s (MSM5/7).
    pub rough_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MsmCell {
    pub sat_id: u8,
    /// Signal id from the signal mask (1-32).
    pub signal_id: u8,
    /// Meters.
    pub pseudorange: Option<f64>,
    /// Meters (phase range).
    pub phase_range: Option<f64>,
    /// m/s (MSM5/7).
    pub phase_range_rate: Option<f64>,
    /// dB-Hz.
    pub cnr: Option<f64>,
    pub lock: u16,
    pub half_cycle_ambiguity: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MsmMessage {
    pub msg_type: u16,
    pub constellation: Constellation,
    /// 4..=7.
    pub msm: u8,
    pub station_id: u16,
    /// Raw 30-bit epoch field (GPS: ms of week; GLONASS: day + ms of day).
    pub epoch: u32,
    pub multiple: bool,
    pub satellites: Vec<MsmSatellite>,
    pub cells: Vec<MsmCell>,
}

fn classify(msg_type: u16) -> Result<(Constellation, u8), ErrorKind> {
    let constellation = match (msg_type - 1071) / 10 {
        0 => Constellation::Gps,
        1 => Constellation::Glonass,
        2 => Constellation::Galileo,
        3 => Constellation::Sbas,
        4 => Constellation::Qzss,
        5 => Constellation::Beidou,
        _ => return Err(ErrorKind::UnknownSubtype((msg_type % 100) as u8)),
    };
    let msm = ((msg_type - 1070) % 10) as u8;
    if !(4..=7).contains(&msm) {
        // MSM1-3 carry no full observables and are not supported here.
        return Err(ErrorKind::UnknownSubtype(msm));
    }
    Ok((constellation, msm))
}

pub(super) fn decode(msg_type: u16, cur: &mut BitCursor<'_>) -> Result<MsmMessage, ErrorKind> {
    let (constellation, msm) = classify(msg_type)?;

    let station_id = cur.take(12)? as u16;
    let epoch = cur.take(30)? as u32;
    let multiple = cur.take_bool()?;
    let _iods = cur.take(3)?;
    cur.advance(7)?; // reserved
    let _clock_steering = cur.take(2)?;
    let _ext_clock = cur.take(2)?;
    let _smoothing = cur.take_bool()?;
    let _smoothing_interval = cur.take(3)?;

    let mut sat_ids = Vec::new();
    for i in 1..=64u8 {
        if cur.take_bool()? {
            sat_ids.push(i);
        }
    }
    let mut sig_ids = Vec::new();
    for i in 1..=32u8 {
        if cur.take_bool()? {
            sig_ids.push(i);
        }
    }

    // Satellite-major cell mask.
    let mut cell_map = Vec::with_capacity(sat_ids.len() * sig_ids.len());
    for sat in &sat_ids {
        for sig in &sig_ids {
            if cur.take_bool()? {
                cell_map.push((*sat, *sig));
            }
        }
    }

    let ns = sat_ids.len();
    let nc = cell_map.len();

    // Satellite data, one field block at a time.
    let mut rough_int = vec![None; ns];
    for v in rough_int.iter_mut() {
        let raw = cur.take(8)?;
        *v = (raw != 255).then_some(raw as f64);
    }
    if msm == 5 || msm == 7 {
        for _ in 0..ns {
            cur.advance(4)?; // extended info
        }
    }
    let mut rough_mod = vec![0f64; ns];
    for v in rough_mod.iter_mut() {
        *v = cur.take(10)? as f64 / 1024.0;
    }
    let mut rough_rate = vec![None; ns];
    if msm == 5 || msm == 7 {
        for v in rough_rate.iter_mut() {
            *v = ROUGH_RATE.read(cur)?;
        }
    }

    let satellites: Vec<MsmSatellite> = sat_ids
        .iter()
        .enumerate()
        .map(|(i, id)| MsmSatellite {
            id: *id,
            rough_range_ms: rough_int[i].map(|int| int + rough_mod[i]),
            rough_rate: rough_rate[i],
        })
        .collect();

    // Cell data blocks.
    let (fine_pr, fine_ph, lock_bits, cnr_bits, cnr_scale, has_rate) = match msm {
        4 => (FINE_PR_4, FINE_PH_4, 4usize, 6usize, 1.0, false),
        5 => (FINE_PR_4, FINE_PH_4, 4, 6, 1.0, true),
        6 => (FINE_PR_67, FINE_PH_67, 10, 10, 1.0 / 16.0, false),
        _ => (FINE_PR_67, FINE_PH_67, 10, 10, 1.0 / 16.0, true),
    };

    let mut pr = vec![None; nc];
    for v in pr.iter_mut() {
        *v = fine_pr.read(cur)?;
    }
    let mut ph = vec![None; nc];
    for v in ph.iter_mut() {
        *v = fine_ph.read(cur)?;
    }
    let mut lock = vec![0u16; nc];
    for v in lock.iter_mut() {
        *v = cur.take(lock_bits)? as u16;
    }
    let mut half = vec![false; nc];
    for v in half.iter_mut() {
        *v = cur.take_bool()?;
    }
    let mut cnr = vec![None; nc];
    for v in cnr.iter_mut() {
        let raw = cur.take(cnr_bits)?;
        *v = (raw != 0).then_some(raw as f64 * cnr_scale);
    }
    let mut rate = vec![None; nc];
    if has_rate {
        for v in rate.iter_mut() {
            *v = FINE_RATE.read(cur)?;
        }
    }

    let sat_index = |id: u8| satellites.iter().position(|s| s.id == id);
    let cells = cell_map
        .iter()
        .enumerate()
        .map(|(j, (sat, sig))| {
            let rough = sat_index(*sat).and_then(|i| satellites[i].rough_range_ms);
            let rough_rate = sat_index(*sat).and_then(|i| satellites[i].rough_rate);
            MsmCell {
                sat_id: *sat,
                signal_id: *sig,
                pseudorange: match (rough, pr[j]) {
                    (Some(r), Some(f)) => Some((r + f) * RANGE_MS),
                    _ => None,
                },
                phase_range: match (rough, ph[j]) {
                    (Some(r), Some(f)) => Some((r + f) * RANGE_MS),
                    _ => None,
                },
                phase_range_rate: match (rough_rate, rate[j]) {
                    (Some(r), Some(f)) => Some(r + f),
                    _ => None,
                },
                cnr: cnr[j],
                lock: lock[j],
                half_cycle_ambiguity: half[j],
            }
        })
        .collect();

    Ok(MsmMessage {
        msg_type,
        constellation,
        msm,
        station_id,
        epoch,
        multiple,
        satellites,
        cells,
    })
}
