//! u-blox UBX stream reader.

use anyhow::Result;
use cssr_cli::cli::{self, Diagnostics, PayloadOut};
use cssr_cli::pump;
use cssr_cli::render::Style;
use gnss_ssr::frame::UbxFramer;

const PAYLOADS: [PayloadOut; 3] = [PayloadOut::L1s, PayloadOut::Inav, PayloadOut::Lnav];

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli::command(
        "ubxread",
        "Read u-blox UBX frames (RXM-SFRBX, RXM-PMP) from stdin",
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
    pump::run(UbxFramer::new(stdin.lock()), opts, diag, style)
}
