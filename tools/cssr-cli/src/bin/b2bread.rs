//! BeiDou PPP-B2b reader.

use std::collections::HashMap;
use std::io::Read;

use anyhow::{bail, Result};
use cssr_cli::cli::{self, Diagnostics};
use cssr_cli::render::{hex_dump, Style};
use cssr_cli::report;
use gnss_ssr::b2b::{B2bDecoder, B2bMessage};
use gnss_ssr::frame::{RawFramer, RawKind};
use gnss_ssr::ErrorKind;

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command(
        "b2bread",
        "Decode a raw BeiDou B2b frame stream from stdin",
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
    // One decoder per broadcasting satellite: mask contexts are per stream.
    let mut decoders: HashMap<u16, B2bDecoder> = HashMap::new();

    for item in RawFramer::new(reader, RawKind::B2b) {
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

        let decoder = decoders.entry(frame.prn).or_default();
        match decoder.decode(&frame) {
            Ok(B2bMessage::Null) if opts.detail == 0 => {},
            Ok(msg) => {
                for line in report::b2b_lines(&msg, &style) {
                    diag.emit(&format!("{} {}", frame.prn, line));
                }
            },
            Err(e) => diag.emit(&style.warn(&e.to_string())),
        }
    }
    Ok(())
}
