#[macro_use]
extern crate afl;
extern crate gnss_ssr;

use gnss_ssr::frame::{AlstFramer, Selection};
use gnss_ssr::rtcm::RtcmFramer;
use gnss_ssr::ErrorKind;

/// Feed arbitrary bytes through the framers, whole and with the first byte
/// shaved off to shift alignments: no input may panic, and tagged errors
/// must never abort the stream.
fn parse(data: &[u8]) {
    for skip in [0usize, 1] {
        let slice = &data[skip.min(data.len())..];

        let framer = AlstFramer::with_selection(slice, Selection::Best { pin: None });
        for item in framer {
            if let Err(e) = item {
                assert!(!matches!(e.kind, ErrorKind::Io(_)));
            }
        }

        let framer = RtcmFramer::new(slice);
        for item in framer {
            match item {
                Ok(frame) => {
                    // Whatever framed must re-validate and decode without
                    // panicking.
                    let _ = gnss_ssr::rtcm::RtcmFrame::from_bytes(frame.as_bytes().to_vec());
                    let _ = frame.decode();
                },
                Err(e) => assert!(!matches!(e.kind, ErrorKind::Io(_))),
            }
        }
    }
}

fn main() {
    fuzz!(|data: &[u8]| {
        if data.len() > 2 {
            parse(&data[1..]);
        }
    });
}
