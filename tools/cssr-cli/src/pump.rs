//! The receiver-reader loop shared by the vendor framer tools: route each
//! frame to raw extraction and/or the diagnostics stream.

use anyhow::{bail, Result};

use gnss_ssr::frame::{to_raw_record, PayloadFrame, Signal};
use gnss_ssr::{ErrorKind, StreamError};

use crate::cli::{self, Diagnostics, Options, PayloadOut};
use crate::render::{hex_dump, Style};

fn payload_signal(p: PayloadOut) -> Option<Signal> {
    match p {
        PayloadOut::L6 => Some(Signal::L6),
        PayloadOut::E6b => Some(Signal::E6b),
        PayloadOut::Inav => Some(Signal::Inav),
        PayloadOut::B2b => Some(Signal::B2b),
        PayloadOut::L1s => Some(Signal::L1s),
        PayloadOut::Lnav => Some(Signal::Lnav),
        PayloadOut::Rtcm => None,
    }
}

/// Drive a framer to end-of-stream. Frames matching the payload selection
/// are written raw; everything is summarized on the diagnostics stream.
pub fn run<I>(frames: I, opts: Options, diag: Diagnostics, style: Style) -> Result<()>
where
    I: Iterator<Item = Result<PayloadFrame, StreamError>>,
{
    let wanted = opts.payload.and_then(payload_signal);

    for item in frames {
        let frame = match item {
            Ok(f) => f,
            Err(e) if matches!(e.kind, ErrorKind::Io(_)) => bail!("{e}"),
            Err(e) => {
                diag.emit(&style.error(&e.to_string()));
                continue;
            },
        };
        if let Some(pin) = opts.prn {
            if frame.prn != pin {
                continue;
            }
        }

        if Some(frame.signal) == wanted {
            let record = to_raw_record(&frame).unwrap_or_else(|| {
                // LNAV has no standalone file format; prefix with the PRN
                // like the other per-satellite formats.
                let mut rec = vec![frame.prn as u8];
                rec.extend_from_slice(&frame.data);
                rec
            });
            cli::write_payload(&record)?;
        }

        let mut line = format!("{} {:?}", frame.prn, frame.signal);
        if let Some(epoch) = frame.epoch {
            line.push_str(&format!(" week={} tow={}", epoch.week, epoch.tow));
        }
        if let Some(cnr) = frame.cnr {
            line.push_str(&format!(" C/No={cnr:.1}"));
        }
        if !frame.is_healthy() {
            line.push(' ');
            line.push_str(&style.warn(&format!("{:?}", frame.flags)));
        }
        diag.emit(&line);
        if opts.detail >= 2 {
            diag.emit(&hex_dump(&frame.data));
        }
    }
    Ok(())
}
