//! Station metadata messages: reference station position and
//! antenna/receiver descriptors.

use crate::bits::{BitCursor, OutOfBits};
use crate::error::ErrorKind;

/// Message 1005: reference station antenna reference point, ECEF.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferenceStation {
    pub station_id: u16,
    pub itrf_year: u8,
    pub gps: bool,
    pub glonass: bool,
    pub galileo: bool,
    pub reference_indicator: bool,
    /// Meters.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub oscillator: bool,
    pub quarter_cycle: u8,
}

pub(super) fn decode_1005(cur: &mut BitCursor<'_>) -> Result<ReferenceStation, ErrorKind> {
    const SCALE: f64 = 1e-4; // 0.1 mm

    let station_id = cur.take(12)? as u16;
    let itrf_year = cur.take(6)? as u8;
    let gps = cur.take_bool()?;
    let glonass = cur.take_bool()?;
    let galileo = cur.take_bool()?;
    let reference_indicator = cur.take_bool()?;
    let x = cur.take_signed(38)? as f64 * SCALE;
    let oscillator = cur.take_bool()?;
    cur.advance(1)?; // reserved
    let y = cur.take_signed(38)? as f64 * SCALE;
    let quarter_cycle = cur.take(2)? as u8;
    let z = cur.take_signed(38)? as f64 * SCALE;

    Ok(ReferenceStation {
        station_id,
        itrf_year,
        gps,
        glonass,
        galileo,
        reference_indicator,
        x,
        y,
        z,
        oscillator,
        quarter_cycle,
    })
}

/// Messages 1007/1008/1033: antenna and receiver descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AntennaDescriptor {
    pub msg_type: u16,
    pub station_id: u16,
    pub antenna: String,
    pub setup_id: u8,
    pub antenna_serial: Option<String>,
    pub receiver: Option<String>,
    pub firmware: Option<String>,
    pub receiver_serial: Option<String>,
}

fn counted_string(cur: &mut BitCursor<'_>) -> Result<String, OutOfBits> {
    let n = cur.take(8)? as usize;
    let bytes = cur.take_bytes(n)?;
    Ok(bytes.iter().map(|b| char::from(*b)).collect())
}

pub(super) fn decode_antenna(
    msg_type: u16,
    cur: &mut BitCursor<'_>,
) -> Result<AntennaDescriptor, ErrorKind> {
    let station_id = cur.take(12)? as u16;
    let antenna = counted_string(cur)?;
    let setup_id = cur.take(8)? as u8;

    let mut desc = AntennaDescriptor {
        msg_type,
        station_id,
        antenna,
        setup_id,
        antenna_serial: None,
        receiver: None,
        firmware: None,
        receiver_serial: None,
    };
    if msg_type >= 1008 {
        desc.antenna_serial = Some(counted_string(cur)?);
    }
    if msg_type == 1033 {
        desc.receiver = Some(counted_string(cur)?);
        desc.firmware = Some(counted_string(cur)?);
        desc.receiver_serial = Some(counted_string(cur)?);
    }
    Ok(desc)
}
