//! Allystar HD9310 stream reader: diagnostics or raw L6 extraction.

use std::io::Read;

use anyhow::{bail, Result};
use cssr_cli::cli::{self, Diagnostics, PayloadOut};
use cssr_cli::render::{hex_dump, Style};
use gnss_ssr::frame::{to_raw_record, AlstFramer, Selection};
use gnss_ssr::ErrorKind;

const PAYLOADS: [PayloadOut; 1] = [PayloadOut::L6];

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command(
        "alstread",
        "Read Allystar HD9310 (QZSS L6) receiver output from stdin",
        &PAYLOADS,
    )
    .get_matches();
    let opts = cli::Options::from_matches(&matches, &PAYLOADS);
    let diag = opts.diagnostics();
    let style = match diag {
        Diagnostics::Stdout => Style::detect(opts.force_color),
        _ => Style::off(),
    };

    // One stream out means one satellite in: best C/No (or the pinned PRN)
    // per second.
    let selection = if opts.payload.is_some() || opts.prn.is_some() {
        Selection::Best { pin: opts.prn }
    } else {
        Selection::All
    };

    let stdin = std::io::stdin();
    run(stdin.lock(), selection, opts, diag, style)
}

fn run<R: Read>(
    reader: R,
    selection: Selection,
    opts: cli::Options,
    diag: Diagnostics,
    style: Style,
) -> Result<()> {
    for item in AlstFramer::with_selection(reader, selection) {
        match item {
            Ok(frame) => {
                if opts.payload.is_some() {
                    if let Some(rec) = to_raw_record(&frame) {
                        cli::write_payload(&rec)?;
                    }
                }
                let mut line = format!("{}", frame.prn);
                if let Some(epoch) = frame.epoch {
                    line.push_str(&format!(" week={} tow={}", epoch.week, epoch.tow));
                }
                if let Some(cnr) = frame.cnr {
                    line.push_str(&format!(" C/No={cnr:.2}"));
                }
                if !frame.is_healthy() {
                    line.push(' ');
                    line.push_str(&style.warn(&format!("{:?}", frame.flags)));
                }
                diag.emit(&line);
                if opts.detail >= 2 {
                    diag.emit(&hex_dump(&frame.data));
                }
            },
            Err(e) if matches!(e.kind, ErrorKind::Io(_)) => bail!("{e}"),
            Err(e) => diag.emit(&style.error(&e.to_string())),
        }
    }
    Ok(())
}
