#![cfg_attr(docsrs, feature(doc_cfg))]
//! Decoding, reassembly and re-serialization of GNSS augmentation streams.
//!
//! The pipeline runs in four stages, each a lazy transformation pulled on
//! demand by the next:
//!
//! 1. **Framers** ([frame]) turn vendor receiver streams (Allystar HD9310,
//!    NovAtel OEM7, Septentrio SBF, u-blox UBX, Pocket SDR logs, raw
//!    payload files) into per-satellite payload frames.
//! 2. **Reassemblers** ([l6], [has]) chain L6 subframes and collect Galileo
//!    HAS pages through Reed-Solomon erasure decoding ([galois]).
//! 3. **Correction decoders** ([cssr], [b2b], [l1s]) parse the bit-packed
//!    state-space representations against their stateful mask contexts.
//! 4. **RTCM 3** ([rtcm]) frames, parses and re-emits the industry wire
//!    format, including the type-4073 compact SSR envelope.
//!
//! No stage spawns tasks or shares mutable state; the only blocking point
//! is the byte-source read inside a framer. Malformed input never aborts a
//! stream: errors are tagged records ([error::StreamError]) carried in-band
//! next to the decoded data.
//!
//! ```
//! use gnss_ssr::frame::{RawFramer, RawKind};
//! use gnss_ssr::l6::SubframeAssembler;
//! use gnss_ssr::cssr::{CssrDecoder, Dialect};
//!
//! let mut assembler = SubframeAssembler::new();
//! let mut decoder = CssrDecoder::new(Dialect::Clas);
//! for frame in RawFramer::new(std::io::empty(), RawKind::L6) {
//!     let frame = frame.expect("raw files cannot fail framing");
//!     for subframe in assembler.push(&frame).unwrap_or_default() {
//!         let out = decoder.decode_subframe(
//!             &subframe.data,
//!             subframe.bit_len,
//!             subframe.prn,
//!             None,
//!         );
//!         for message in out.messages {
//!             println!("ST{}", message.subtype);
//!         }
//!     }
//! }
//! ```

pub mod b2b;
pub mod bits;
pub mod crc;
pub mod cssr;
pub mod error;
pub mod frame;
pub mod galois;
pub mod has;
pub mod l1s;
pub mod l6;
pub mod rtcm;
pub mod sat;
pub mod time;

pub use error::{ErrorKind, Stage, StreamError};
pub use frame::{FrameFlags, PayloadFrame, Signal};
pub use sat::{Constellation, Satellite};
pub use time::GpsTime;
