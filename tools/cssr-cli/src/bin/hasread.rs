//! Galileo HAS reader: raw E6B page stream to decoded correction listings.

use std::io::Read;

use anyhow::{bail, Result};
use cssr_cli::cli::{self, Diagnostics};
use cssr_cli::render::{hex_dump, Style};
use cssr_cli::report;
use gnss_ssr::frame::{RawFramer, RawKind};
use gnss_ssr::has::HasDecoder;
use gnss_ssr::ErrorKind;

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command(
        "hasread",
        "Decode a raw Galileo HAS (E6B) page stream from stdin",
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
    let mut decoder = HasDecoder::new();

    for item in RawFramer::new(reader, RawKind::E6b) {
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

        let (messages, errors) = decoder.push(&frame);
        for msg in messages {
            diag.emit(&format!(
                "E{:02} MID={} MS={} TOH={}",
                frame.prn, msg.mid, msg.ms, msg.header.toh
            ));
            for line in report::has_lines(&msg, &style) {
                diag.emit(&line);
            }
        }
        for e in errors {
            diag.emit(&style.warn(&e.to_string()));
        }
    }
    Ok(())
}
