//! Septentrio SBF stream reader.

use anyhow::Result;
use cssr_cli::cli::{self, Diagnostics, PayloadOut};
use cssr_cli::pump;
use cssr_cli::render::Style;
use gnss_ssr::frame::SbfFramer;

const PAYLOADS: [PayloadOut; 3] = [PayloadOut::L6, PayloadOut::E6b, PayloadOut::B2b];

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command(
        "septread",
        "Read Septentrio SBF blocks (GALRawCNAV, QZSRawL6, BDSRawB2b) from stdin",
        &PAYLOADS,
    )
    .get_matches();
    let opts = cli::Options::from_matches(&matches, &PAYLOADS);
    let diag = opts.diagnostics();
    let style = match diag {
        Diagnostics::Stdout => Style::detect(opts.force_color),
        _ => Style::off(),
    };

    let stdin = std::io::stdin();
    pump::run(SbfFramer::new(stdin.lock()), opts, diag, style)
}
