//! Pocket SDR log reader.

use anyhow::Result;
use cssr_cli::cli::{self, Diagnostics, PayloadOut};
use cssr_cli::pump;
use cssr_cli::render::Style;
use gnss_ssr::frame::PsdrFramer;

const PAYLOADS: [PayloadOut; 2] = [PayloadOut::L6, PayloadOut::E6b];

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command(
        "psdrread",
        "Read Pocket SDR text logs ($L6FRM, $E6FRM, $OBS) from stdin",
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
    pump::run(PsdrFramer::new(stdin.lock()), opts, diag, style)
}
