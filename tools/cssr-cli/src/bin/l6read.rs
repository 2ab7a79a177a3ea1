//! QZSS L6 stream reader: subframe assembly plus compact SSR (CLAS,
//! MADOCA-PPP) or embedded-RTCM (MADOCA) decoding.

use std::collections::HashMap;
use std::io::Read;

use anyhow::{bail, Result};
use clap::Arg;
use cssr_cli::cli::{self, Diagnostics};
use cssr_cli::render::{hex_dump, Style};
use cssr_cli::report;
use gnss_ssr::cssr::{CssrDecoder, Dialect};
use gnss_ssr::frame::{RawFramer, RawKind};
use gnss_ssr::l6::{self, facility_name, MadocaExtractor, SubframeAssembler, Vendor};
use gnss_ssr::rtcm::RtcmFrame;
use gnss_ssr::time::GpsTime;
use gnss_ssr::ErrorKind;

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command("l6read", "Decode a raw QZSS L6 frame stream from stdin", &[])
        .arg(
            Arg::new("week")
                .short('w')
                .long("week")
                .value_parser(clap::value_parser!(u16))
                .help("GPS week used to render civil time (raw files carry none)"),
        )
        .get_matches();
    let opts = cli::Options::from_matches(&matches, &[]);
    let week = matches.get_one::<u16>("week").copied();
    let diag = opts.diagnostics();
    let style = Style::detect(opts.force_color);

    let stdin = std::io::stdin();
    run(stdin.lock(), opts, week, diag, style)
}

struct L6Pipeline {
    assembler: SubframeAssembler,
    decoders: HashMap<u16, CssrDecoder>,
    extractors: HashMap<u16, MadocaExtractor>,
    subframe_count: HashMap<u16, u64>,
}

fn run<R: Read>(
    reader: R,
    opts: cli::Options,
    week: Option<u16>,
    diag: Diagnostics,
    style: Style,
) -> Result<()> {
    let mut pipe = L6Pipeline {
        assembler: SubframeAssembler::new(),
        decoders: HashMap::new(),
        extractors: HashMap::new(),
        subframe_count: HashMap::new(),
    };

    for item in RawFramer::new(reader, RawKind::L6) {
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

        let (header, _) = match l6::decode_header(&frame.data) {
            Ok(h) => h,
            Err(kind) => {
                diag.emit(&style.error(&format!("framer: {kind} prn={}", frame.prn)));
                continue;
            },
        };
        let mut prefix = format!(
            "{} {}{}",
            header.prn,
            facility_name(header.facility),
            if header.alert { "*" } else { " " },
        );
        prefix.push_str(&format!(" {}", style.kind(&header.vendor.to_string())));

        if opts.detail >= 2 {
            diag.emit(&hex_dump(&frame.data));
        }

        match header.vendor {
            Vendor::Clas | Vendor::MadocaPpp => {
                let dialect = if header.vendor == Vendor::Clas {
                    Dialect::Clas
                } else {
                    Dialect::MadocaPpp
                };
                let subframes = match pipe.assembler.push(&frame) {
                    Ok(s) => s,
                    Err(e) => {
                        diag.emit(&style.error(&e.to_string()));
                        continue;
                    },
                };
                for sf in subframes {
                    let n = pipe.subframe_count.entry(sf.prn).or_insert(0);
                    *n += 1;
                    let decoder = pipe
                        .decoders
                        .entry(sf.prn)
                        .or_insert_with(|| CssrDecoder::new(dialect));
                    let out = decoder.decode_subframe(&sf.data, sf.bit_len, sf.prn, None);

                    let mut line = format!("{prefix}  SF{n} DP1");
                    if !sf.complete {
                        line.push_str(" (partial)");
                    }
                    let listing = report::subtype_listing(&out);
                    if !listing.is_empty() {
                        line.push(' ');
                        line.push_str(&listing);
                    }
                    diag.emit(&line);

                    if let Some(stats) = out.stats {
                        diag.emit(&stats.to_string());
                    }
                    if opts.detail >= 1 {
                        for msg in &out.messages {
                            for detail in report::cssr_detail(msg) {
                                diag.emit(&detail);
                            }
                        }
                    }
                    for e in out.errors {
                        diag.emit(&style.warn(&e.to_string()));
                    }
                }
            },
            Vendor::Madoca => {
                let extractor = pipe.extractors.entry(header.prn).or_default();
                // Data part starts right after the 49 header bits.
                let (frames, errors) =
                    extract_from(extractor, &frame.data, 49, header.prn);
                let mut line = prefix.clone();
                let mut time_shown = false;
                for raw in frames {
                    match RtcmFrame::from_bytes(raw) {
                        Ok(f) => match f.decode() {
                            Ok(msg) => {
                                if !time_shown {
                                    if let Some(t) = epoch_text(&msg, week) {
                                        line.push_str(&format!(" {t}"));
                                        time_shown = true;
                                    }
                                }
                                line.push(' ');
                                line.push_str(&report::rtcm_summary(&msg, &style));
                            },
                            Err(kind) => line.push_str(&style.warn(&format!(" [{kind}]"))),
                        },
                        Err(kind) => line.push_str(&style.warn(&format!(" [{kind}]"))),
                    }
                }
                diag.emit(&line);
                for e in errors {
                    diag.emit(&style.warn(&e.to_string()));
                }
            },
            other => {
                diag.emit(&format!("{prefix} ({other})"));
            },
        }
    }
    Ok(())
}

fn extract_from(
    extractor: &mut MadocaExtractor,
    data: &[u8],
    header_bits: usize,
    prn: u16,
) -> (Vec<Vec<u8>>, Vec<gnss_ssr::StreamError>) {
    // Re-slice the data part past the header for the extractor.
    use gnss_ssr::bits::{BitCursor, BitWriter};
    let mut cur = BitCursor::new(data);
    if cur.advance(header_bits).is_err() {
        return (Vec::new(), Vec::new());
    }
    let mut w = BitWriter::new();
    let n = gnss_ssr::l6::DATA_PART_BITS.min(cur.remaining());
    if w.put_cursor(&mut cur, n).is_err() {
        return (Vec::new(), Vec::new());
    }
    let bytes = w.as_bytes().to_vec();
    extractor.push(&bytes, n, prn, None)
}

/// Civil time of an SSR epoch, when the caller anchored a week.
fn epoch_text(msg: &gnss_ssr::rtcm::RtcmMessage, week: Option<u16>) -> Option<String> {
    let week = week?;
    let gnss_ssr::rtcm::RtcmMessage::Ssr(ssr) = msg else {
        return None;
    };
    Some(GpsTime::new(week, ssr.header.epoch).to_string())
}
