//! QZSS L1S reader: SLAS corrections and DC Reports, with optional NMEA
//! duplication of the latter.

use std::io::Read;

use anyhow::{bail, Result};
use cssr_cli::cli::{self, Diagnostics};
use cssr_cli::render::{hex_dump, Style};
use gnss_ssr::frame::{RawFramer, RawKind};
use gnss_ssr::l1s::{dc_report_nmea, station_name, L1sBody, L1sDecoder};
use gnss_ssr::ErrorKind;

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command(
        "l1sread",
        "Decode a raw QZSS L1S message stream from stdin",
        &[],
    )
    .get_matches();
    let opts = cli::Options::from_matches(&matches, &[]);
    let diag = opts.diagnostics();
    let style = Style::detect(opts.force_color);

    let stdin = std::io::stdin();
    run(stdin.lock(), opts, diag, style)
}

fn run<R: Read>(reader: R, opts: cli::Options, diag: Diagnostics, style: Style) -> Result<()> {
    let mut decoder = L1sDecoder::new();

    for item in RawFramer::new(reader, RawKind::L1s) {
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
        if opts.detail >= 2 {
            diag.emit(&hex_dump(&frame.data));
        }

        let msg = match decoder.decode(&frame) {
            Ok(m) => m,
            Err(e) => {
                diag.emit(&style.warn(&e.to_string()));
                continue;
            },
        };

        match &msg.body {
            L1sBody::Test => diag.emit(&format!("{} MT0 test", msg.prn)),
            L1sBody::DcReport(_) => {
                diag.emit(&format!("{} MT43 {}", msg.prn, style.kind("DC Report")));
                if opts.dup_dcr {
                    println!("{}", dc_report_nmea(msg.prn, &frame.data));
                }
            },
            L1sBody::Dcx(_) => diag.emit(&format!("{} MT44 DCX", msg.prn)),
            L1sBody::PrnMask(mask) => {
                let sats: Vec<String> = mask.sats.iter().map(|s| s.to_string()).collect();
                diag.emit(&format!(
                    "{} MT48 PRN mask IODP={} {}",
                    msg.prn,
                    mask.iodp,
                    sats.join(" ")
                ));
            },
            L1sBody::DataIssue(issues) => {
                let items: Vec<String> =
                    issues.iter().map(|(s, iod)| format!("{s} IOD={iod}")).collect();
                diag.emit(&format!("{} MT49 {}", msg.prn, items.join(" ")));
            },
            L1sBody::Dgps {
                station,
                corrections,
            } => {
                let mut line = format!(
                    "{} MT50 DGPS {}",
                    msg.prn,
                    style.kind(station_name(*station))
                );
                for (sat, prc) in corrections {
                    match prc {
                        Some(v) => line.push_str(&format!(
                            " {} PRC={v:.2} m",
                            style.sat(&sat.to_string())
                        )),
                        None => line.push_str(&format!(" {sat} PRC=invalid")),
                    }
                }
                diag.emit(&line);
            },
            L1sBody::Other { .. } => diag.emit(&format!("{} MT{}", msg.prn, msg.mt)),
        }
    }
    Ok(())
}
