//! RTCM 3 stream reader.

use std::io::Read;

use anyhow::{bail, Result};
use cssr_cli::cli::{self, Diagnostics, PayloadOut};
use cssr_cli::render::{hex_dump, Style};
use cssr_cli::report;
use gnss_ssr::rtcm::{RtcmFramer, RtcmMessage};
use gnss_ssr::ErrorKind;

const PAYLOADS: [PayloadOut; 1] = [PayloadOut::Rtcm];

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command("rtcmread", "Decode an RTCM 3 stream from stdin", &PAYLOADS)
        .get_matches();
    let opts = cli::Options::from_matches(&matches, &PAYLOADS);
    let diag = opts.diagnostics();
    let style = match diag {
        Diagnostics::Stdout => Style::detect(opts.force_color),
        _ => Style::off(),
    };

    let stdin = std::io::stdin();
    run(stdin.lock(), opts, diag, style)
}

fn run<R: Read>(reader: R, opts: cli::Options, diag: Diagnostics, style: Style) -> Result<()> {
    for item in RtcmFramer::new(reader) {
        let frame = match item {
            Ok(f) => f,
            Err(e) if matches!(e.kind, ErrorKind::Io(_)) => bail!("{e}"),
            Err(e) => {
                diag.emit(&style.error(&e.to_string()));
                continue;
            },
        };
        if opts.payload.is_some() {
            cli::write_payload(frame.as_bytes())?;
        }
        if opts.detail >= 2 {
            diag.emit(&hex_dump(frame.as_bytes()));
        }

        match frame.decode() {
            Ok(msg) => {
                diag.emit(&report::rtcm_summary(&msg, &style));
                if opts.detail >= 1 {
                    if let RtcmMessage::Ssr(ssr) = &msg {
                        for line in report::ssr_detail(&ssr.kind) {
                            diag.emit(&line);
                        }
                    }
                    if let RtcmMessage::Msm(msm) = &msg {
                        for cell in &msm.cells {
                            diag.emit(&format!(
                                "  {}{:02} sig{} pr={:?} cnr={:?}",
                                msm.constellation.letter(),
                                cell.sat_id,
                                cell.signal_id,
                                cell.pseudorange,
                                cell.cnr,
                            ));
                        }
                    }
                }
            },
            Err(kind) => {
                diag.emit(&style.warn(&format!(
                    "RTCM {} undecodable: {kind}",
                    frame.message_type()
                )));
            },
        }
    }
    Ok(())
}
