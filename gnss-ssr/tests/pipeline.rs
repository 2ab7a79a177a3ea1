//! End-to-end pipeline tests over synthetic streams: receiver bytes in,
//! decoded correction records out.

use gnss_ssr::bits::{BitCursor, BitWriter};
use gnss_ssr::crc::Fletcher8;
use gnss_ssr::cssr::{CssrBody, CssrDecoder, Dialect, CSSR_MESSAGE_NUMBER};
use gnss_ssr::frame::{AlstFramer, RawFramer, RawKind, Selection};
use gnss_ssr::galois::{encode_page, PAGE_SYMBOLS};
use gnss_ssr::has::HasDecoder;
use gnss_ssr::l6::{SubframeAssembler, DATA_PART_BITS, PREAMBLE};
use gnss_ssr::rtcm::{encode_cssr_envelope, RtcmFrame, RtcmMessage};

/// A valid Allystar frame wrapping 250 bytes of L6 data.
fn alst_frame(prn: u16, week: u16, tow: u32, cnr: u8, l6: &[u8; 250]) -> Vec<u8> {
    let mut f = Vec::with_capacity(272);
    f.extend_from_slice(&[0xf1, 0xd9, 0x02, 0x10]);
    f.extend_from_slice(&264u16.to_le_bytes());
    f.extend_from_slice(&(prn + 700).to_le_bytes());
    f.push(2);
    f.push(65);
    f.extend_from_slice(&week.to_be_bytes());
    f.extend_from_slice(&tow.to_be_bytes());
    f.push(cnr);
    f.push(0);
    f.extend_from_slice(l6);
    f.extend_from_slice(&[0, 0]); // receiver pads to 252
    let (a, b) = Fletcher8::compute(&f[2..270]);
    f.push(a);
    f.push(b);
    f
}

/// A 250-byte L6 frame around one 1695-bit data part.
fn l6_frame(prn: u16, vendor: u8, facility: u8, sfi: bool, part: &BitCursor<'_>) -> [u8; 250] {
    let mut w = BitWriter::new();
    w.put(32, u64::from(PREAMBLE));
    w.put(8, u64::from(prn));
    w.put(3, u64::from(vendor));
    w.put(2, u64::from(facility));
    w.put(2, 0);
    w.put(1, u64::from(sfi));
    w.put(1, 0); // alert
    let mut cur = *part;
    w.put_cursor(&mut cur, DATA_PART_BITS).unwrap();
    w.put_bytes(&[0u8; 32]);
    let bytes = w.into_bytes();
    let mut out = [0u8; 250];
    out.copy_from_slice(&bytes[..250]);
    out
}

/// A CLAS subframe: mask over two GPS satellites plus a clock subtype,
/// zero-padded to five data parts.
fn clas_subframe_bits() -> Vec<u8> {
    let mut w = BitWriter::new();

    // ST1.
    w.put(12, u64::from(CSSR_MESSAGE_NUMBER));
    w.put(4, 1);
    w.put(20, 300_000); // epoch
    w.put(4, 2);
    w.put(1, 0);
    w.put(4, 7); // IODSSR
    w.put(4, 0); // IODP
    w.put(4, 1); // one GNSS block
    w.put(4, 0); // GPS
    w.put(40, (1 << 39) | (1 << 24)); // G01, G16
    w.put(16, (1 << 15) | (1 << 6)); // signals 0 and 9
    w.put(1, 0); // no cell mask

    // ST3.
    w.put(12, u64::from(CSSR_MESSAGE_NUMBER));
    w.put(4, 3);
    w.put(12, 1200);
    w.put(4, 2);
    w.put(1, 0);
    w.put(4, 7);
    w.put_signed(15, 302);
    w.put_signed(15, -625);

    // Null padding out to a full subframe.
    while w.bit_len() < 5 * DATA_PART_BITS {
        w.put(1, 0);
    }
    w.into_bytes()
}

#[test]
fn allystar_to_clas_corrections() {
    let sf_bits = clas_subframe_bits();

    // Five Allystar frames carry the five data parts; a weaker second
    // satellite rides along and must be filtered by best-C/No selection.
    let mut stream = Vec::new();
    let mut cur = BitCursor::new(&sf_bits);
    for i in 0..5u32 {
        let part = cur;
        let l6 = l6_frame(199, 5, 3, i == 0, &part);
        cur.advance(DATA_PART_BITS).unwrap();
        stream.extend_from_slice(&alst_frame(199, 2202, 83_500 + i, 180, &l6));
        let decoy = l6_frame(204, 5, 2, i == 0, &BitCursor::new(&[0u8; 212]));
        stream.extend_from_slice(&alst_frame(204, 2202, 83_500 + i, 100, &decoy));
    }

    let framer = AlstFramer::with_selection(&stream[..], Selection::Best { pin: None });
    let mut assembler = SubframeAssembler::new();
    let mut decoder = CssrDecoder::new(Dialect::Clas);
    let mut decoded = Vec::new();

    for item in framer {
        let frame = item.expect("valid synthetic stream");
        assert_eq!(frame.prn, 199, "best-satellite selection failed");
        for sf in assembler.push(&frame).expect("healthy frames") {
            assert!(sf.complete);
            assert_eq!(sf.bit_len, 5 * DATA_PART_BITS);
            let out = decoder.decode_subframe(&sf.data, sf.bit_len, sf.prn, None);
            assert!(out.errors.is_empty(), "{:?}", out.errors);
            decoded.extend(out.messages);
        }
    }

    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].subtype, 1);
    assert_eq!(decoded[1].subtype, 3);
    let CssrBody::Clock(clocks) = &decoded[1].body else {
        panic!("expected clock");
    };
    assert_eq!(clocks.len(), 2);
    assert_eq!(clocks[0].sat.to_string(), "G01");
    assert!((clocks[0].c0.unwrap() - 0.4832).abs() < 1e-9);
    assert!((clocks[1].c0.unwrap() + 1.0).abs() < 1e-9);

    // The whole subframe is accounted for.
    let stats = decoder.stats();
    assert!(stats.consistent());
    assert_eq!(stats.bit_total, 5 * DATA_PART_BITS);
    assert_eq!(stats.n_sat, 2);
    assert_eq!(stats.n_sig, 4);
    assert!(stats.bit_null > 0);
}

#[test]
fn raw_e6b_to_has_orbit() {
    // HAS message: mask (G01 with three signals) + orbit, over two pages.
    let mut w = BitWriter::new();
    w.put(12, 120);
    w.put(1, 1);
    w.put(1, 1);
    w.put(4, 0);
    w.put(4, 0);
    w.put(5, 1);
    w.put(5, 3);
    w.put(4, 1);
    w.put(4, 0);
    w.put(40, 1 << 39);
    w.put(16, (1 << 15) | (1 << 8) | (1 << 6));
    w.put(1, 0);
    w.put(3, 0);
    w.put(4, 11);
    w.put(8, 82);
    w.put_signed(13, 434);
    w.put_signed(12, -406);
    w.put_signed(12, 98);
    let body = w.into_bytes();

    let mut message = vec![[0u8; PAGE_SYMBOLS]; 2];
    for (i, b) in body.iter().enumerate() {
        message[i / PAGE_SYMBOLS][i % PAGE_SYMBOLS] = *b;
    }

    // Raw E6B records: one systematic page lost, one parity page instead.
    let mut raw = Vec::new();
    for (pid, page) in [(2u8, encode_page(&message, 2)), (77, encode_page(&message, 77))] {
        let mut w = BitWriter::new();
        w.put(2, 1);
        w.put(2, 0);
        w.put(2, 1);
        w.put(5, 17); // MID
        w.put(5, 1); // MS = 2
        w.put(8, u64::from(pid));
        w.put_bytes(&page);
        let mut rec = w.into_bytes();
        rec.resize(62, 0);
        raw.push(12u8); // PRN prefix
        raw.extend_from_slice(&rec);
    }

    let mut decoder = HasDecoder::new();
    let mut messages = Vec::new();
    for item in RawFramer::new(&raw[..], RawKind::E6b) {
        let frame = item.expect("raw stream");
        let (msgs, errs) = decoder.push(&frame);
        assert!(errs.is_empty(), "{errs:?}");
        messages.extend(msgs);
    }

    assert_eq!(messages.len(), 1);
    let msg = &messages[0];
    assert_eq!(msg.mid, 17);
    let mask = msg.mask.as_ref().expect("mask block");
    assert_eq!(mask.entries[0].sat.to_string(), "G01");
    let orbit = &msg.orbits[0];
    assert_eq!(orbit.iode, 82);
    assert!((orbit.radial.unwrap() - 1.0850).abs() < 1e-9);
    assert!((orbit.along.unwrap() + 3.2480).abs() < 1e-9);
    assert!((orbit.cross.unwrap() - 0.7840).abs() < 1e-9);
}

#[test]
fn cssr_payload_round_trips_through_4073_envelope() {
    // Build a CSSR mask message payload, envelope it, reframe it, decode it
    // with a fresh compact SSR decoder.
    let mut w = BitWriter::new();
    w.put(12, u64::from(CSSR_MESSAGE_NUMBER));
    w.put(4, 1);
    w.put(20, 1000);
    w.put(4, 1);
    w.put(1, 0);
    w.put(4, 2);
    w.put(4, 0);
    w.put(4, 1);
    w.put(4, 0);
    w.put(40, 1 << 39);
    w.put(16, 1 << 15);
    w.put(1, 0);
    w.pad_to_byte();
    let payload = w.into_bytes();

    let framed = encode_cssr_envelope(&payload);
    let frame = RtcmFrame::from_bytes(framed).expect("well-formed envelope");
    assert_eq!(frame.message_type(), 4073);
    let RtcmMessage::CssrEnvelope { payload: back } = frame.decode().unwrap() else {
        panic!("expected envelope");
    };
    assert_eq!(back, payload);

    let mut decoder = CssrDecoder::new(Dialect::Clas);
    let out = decoder.decode_subframe(&back, back.len() * 8, 199, None);
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    assert_eq!(out.messages.len(), 1);
    assert_eq!(decoder.mask().unwrap().iodssr, 2);
}

#[test]
fn stale_iodssr_never_mutates_the_mask() {
    let mut decoder = CssrDecoder::new(Dialect::Clas);

    let mut w = BitWriter::new();
    w.put(12, u64::from(CSSR_MESSAGE_NUMBER));
    w.put(4, 1);
    w.put(20, 1000);
    w.put(4, 1);
    w.put(1, 0);
    w.put(4, 2); // IODSSR 2
    w.put(4, 0);
    w.put(4, 1);
    w.put(4, 0);
    w.put(40, 1 << 39);
    w.put(16, 1 << 15);
    w.put(1, 0);
    w.pad_to_byte();
    let bytes = w.into_bytes();
    decoder.decode_subframe(&bytes, bytes.len() * 8, 199, None);
    let before = decoder.mask().unwrap().clone();

    // An orbit subtype with a different IODSSR: rejected, mask untouched.
    let mut w = BitWriter::new();
    w.put(12, u64::from(CSSR_MESSAGE_NUMBER));
    w.put(4, 2);
    w.put(12, 100);
    w.put(4, 1);
    w.put(1, 0);
    w.put(4, 9);
    w.put(8, 1);
    w.put_signed(15, 1);
    w.put_signed(13, 1);
    w.put_signed(13, 1);
    w.pad_to_byte();
    let bytes = w.into_bytes();
    let out = decoder.decode_subframe(&bytes, bytes.len() * 8, 199, None);

    assert_eq!(out.messages.len(), 0);
    assert_eq!(out.errors.len(), 1);
    assert_eq!(decoder.mask().unwrap(), &before);
}
