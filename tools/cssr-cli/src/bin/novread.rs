//! NovAtel OEM7 stream reader.

use anyhow::Result;
use cssr_cli::cli::{self, Diagnostics, PayloadOut};
use cssr_cli::render::Style;
use cssr_cli::pump;
use gnss_ssr::frame::NovFramer;

const PAYLOADS: [PayloadOut; 2] = [PayloadOut::E6b, PayloadOut::Lnav];

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command(
        "novread",
        "Read NovAtel OEM7 binary logs (GALCNAVRAWPAGE, QZSSRAWSUBFRAME) from stdin",
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
    pump::run(NovFramer::new(stdin.lock()), opts, diag, style)
}
