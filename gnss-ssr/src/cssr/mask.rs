//! The mask: the stateful heart of compact SSR.
//!
//! A mask subtype declares, per GNSS, which satellites and which of their
//! signals the following correction subtypes describe. Downstream subtypes
//! are dense arrays indexed by the mask's implicit ordering, so the entry
//! order here is load-bearing and must follow bit order on the wire.

use crate::bits::{BitCursor, OutOfBits};
use crate::cssr::fields::DialectFields;
use crate::sat::{Constellation, Satellite};

/// One masked satellite and the signals selected for it, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaskEntry {
    pub sat: Satellite,
    pub signals: Vec<u8>,
}

/// Active mask for one stream and dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mask {
    pub iodssr: u8,
    pub iodp: u8,
    pub entries: Vec<MaskEntry>,
}

impl Mask {
    pub fn n_sat(&self) -> usize {
        self.entries.len()
    }

    /// Total number of masked (satellite, signal) cells.
    pub fn n_sig(&self) -> usize {
        self.entries.iter().map(|e| e.signals.len()).sum()
    }

    pub fn satellites(&self) -> impl Iterator<Item = Satellite> + '_ {
        self.entries.iter().map(|e| e.sat)
    }

    /// All (satellite, signal) cells in mask order.
    pub fn cells(&self) -> impl Iterator<Item = (Satellite, u8)> + '_ {
        self.entries
            .iter()
            .flat_map(|e| e.signals.iter().map(move |s| (e.sat, *s)))
    }

    /// Decode a mask subtype body (after the common header and IODP) per the
    /// dialect's mask geometry.
    pub fn decode(
        cur: &mut BitCursor<'_>,
        fields: &DialectFields,
        iodssr: u8,
        iodp: u8,
    ) -> Result<Self, OutOfBits> {
        let n_gnss = cur.take(4)? as usize;
        let mut entries = Vec::new();

        for _ in 0..n_gnss {
            let gnss_id = cur.take(4)? as u8;
            let sat_bits = fields.satellite_mask as usize;
            let sig_bits = fields.signal_mask as usize;

            let mut sats = Vec::new();
            for i in 0..sat_bits {
                if cur.take_bool()? {
                    sats.push(i as u16 + 1);
                }
            }
            let mut sigs = Vec::new();
            for i in 0..sig_bits {
                if cur.take_bool()? {
                    sigs.push(i as u8);
                }
            }

            let cell_mask = cur.take_bool()?;
            let constellation =
                Constellation::from_cssr_id(gnss_id).unwrap_or(Constellation::Gps);

            for prn in &sats {
                let prn = if constellation == Constellation::Qzss {
                    prn + 192
                } else {
                    *prn
                };
                let signals = if cell_mask {
                    let mut selected = Vec::new();
                    for sig in &sigs {
                        if cur.take_bool()? {
                            selected.push(*sig);
                        }
                    }
                    selected
                } else {
                    sigs.clone()
                };
                entries.push(MaskEntry {
                    sat: Satellite::new(constellation, prn),
                    signals,
                });
            }
            // With the cell-mask option the per-satellite rows were consumed
            // inside the loop above, in satellite-major order.
        }

        Ok(Mask {
            iodssr,
            iodp,
            entries,
        })
    }
}

/// Signal name per (constellation, mask signal id), as printed in mask and
/// bias listings.
pub fn signal_name(constellation: Constellation, sig: u8) -> &'static str {
    const GPS: [&str; 16] = [
        "L1 C/A", "L1 P", "L1 Z", "L1C(D)", "L1C(P)", "L1C(D+P)", "L2 CM", "L2 CL", "L2 CM+CL",
        "L2 P", "L2 Z", "L5 I", "L5 Q", "L5 I+Q", "", "",
    ];
    const GLO: [&str; 16] = [
        "G1 C/A", "G1 P", "G2 C/A", "G2 P", "G1a(D)", "G1a(P)", "G1a(D+P)", "G2a(D)", "G2a(P)",
        "G2a(D+P)", "G3 I", "G3 Q", "G3 I+Q", "", "", "",
    ];
    const GAL: [&str; 16] = [
        "E1 B", "E1 C", "E1 B+C", "E5a I", "E5a Q", "E5a I+Q", "E5b I", "E5b Q", "E5b I+Q",
        "E5 I", "E5 Q", "E5 I+Q", "E6 B", "E6 C", "E6 B+C", "",
    ];
    const BDS: [&str; 16] = [
        "B1 I", "B1 Q", "B1 I+Q", "B3 I", "B3 Q", "B3 I+Q", "B2 I", "B2 Q", "B2 I+Q", "B1C(D)",
        "B1C(P)", "B1C(D+P)", "B2a(D)", "B2a(P)", "B2a(D+P)", "",
    ];
    const QZS: [&str; 16] = [
        "L1 C/A", "L1C(D)", "L1C(P)", "L1C(D+P)", "L2 CM", "L2 CL", "L2 CM+CL", "L5 I", "L5 Q",
        "L5 I+Q", "L6D", "L6E", "L6D+E", "", "", "",
    ];
    const SBS: [&str; 16] = [
        "L1 C/A", "L5 I", "L5 Q", "L5 I+Q", "", "", "", "", "", "", "", "", "", "", "", "",
    ];

    let table = match constellation {
        Constellation::Gps => &GPS,
        Constellation::Glonass => &GLO,
        Constellation::Galileo => &GAL,
        Constellation::Beidou => &BDS,
        Constellation::Qzss => &QZS,
        _ => &SBS,
    };
    table[usize::from(sig & 0x0f)]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bits::BitWriter;
    use crate::cssr::fields::CLAS;

    /// Build a single-GNSS mask block the way the decoder reads it.
    pub(crate) fn write_gnss_block(
        w: &mut BitWriter,
        gnss_id: u8,
        sats: &[u16],
        sigs: &[u8],
        cell: Option<&[Vec<u8>]>,
    ) {
        w.put(4, u64::from(gnss_id));
        let mut sat_mask = 0u64;
        for s in sats {
            sat_mask |= 1 << (40 - u64::from(*s));
        }
        w.put(40, sat_mask);
        let mut sig_mask = 0u64;
        for s in sigs {
            sig_mask |= 1 << (15 - u64::from(*s));
        }
        w.put(16, sig_mask);
        match cell {
            None => w.put(1, 0),
            Some(rows) => {
                w.put(1, 1);
                for row in rows {
                    for sig in sigs {
                        w.put(1, u64::from(row.contains(sig)));
                    }
                }
            },
        }
    }

    #[test]
    fn decode_without_cell_mask() {
        let mut w = BitWriter::new();
        w.put(4, 1); // one GNSS
        write_gnss_block(&mut w, 0, &[1, 16], &[0, 7, 9], None);
        let bytes = w.as_bytes().to_vec();
        let mut cur = BitCursor::with_len(&bytes, w.bit_len());

        let mask = Mask::decode(&mut cur, &CLAS, 3, 0).unwrap();
        assert_eq!(mask.n_sat(), 2);
        assert_eq!(mask.n_sig(), 6);
        assert_eq!(mask.entries[0].sat.to_string(), "G01");
        assert_eq!(mask.entries[1].sat.to_string(), "G16");
        assert_eq!(mask.entries[0].signals, vec![0, 7, 9]);
    }

    #[test]
    fn decode_with_cell_mask_subsets() {
        let mut w = BitWriter::new();
        w.put(4, 1);
        write_gnss_block(
            &mut w,
            0,
            &[1, 2],
            &[0, 9],
            Some(&[vec![0], vec![0, 9]]),
        );
        let bytes = w.as_bytes().to_vec();
        let mut cur = BitCursor::with_len(&bytes, w.bit_len());

        let mask = Mask::decode(&mut cur, &CLAS, 1, 0).unwrap();
        assert_eq!(mask.entries[0].signals, vec![0]);
        assert_eq!(mask.entries[1].signals, vec![0, 9]);
        assert_eq!(mask.n_sig(), 3);
    }

    #[test]
    fn qzss_prns_offset() {
        let mut w = BitWriter::new();
        w.put(4, 1);
        write_gnss_block(&mut w, 4, &[7], &[10], None);
        let bytes = w.as_bytes().to_vec();
        let mut cur = BitCursor::with_len(&bytes, w.bit_len());
        let mask = Mask::decode(&mut cur, &CLAS, 0, 0).unwrap();
        assert_eq!(mask.entries[0].sat.prn, 199);
    }

    #[test]
    fn signal_names() {
        assert_eq!(signal_name(Constellation::Gps, 0), "L1 C/A");
        assert_eq!(signal_name(Constellation::Gps, 7), "L2 CL");
        assert_eq!(signal_name(Constellation::Gps, 9), "L2 P");
        assert_eq!(signal_name(Constellation::Galileo, 0), "E1 B");
    }
}
