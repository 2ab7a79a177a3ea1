//! GF(2^8) arithmetic and the Reed-Solomon erasure decoder for Galileo HAS.
//!
//! The field uses the primitive polynomial 0x11d. HAS transmits a message of
//! MS pages (53 bytes each) as rows of a systematic (255, 32) code: page PID
//! carries row PID-1 of the generator matrix applied to the message columns.
//! Reception of any MS distinct pages reduces decoding to solving an MS x MS
//! linear system per message, shared across the 53 byte columns.

use thiserror::Error;

/// Primitive polynomial of the field, x^8 + x^4 + x^3 + x^2 + 1.
pub const PRIMITIVE: u16 = 0x11d;

/// Code length: one row per admissible page id.
pub const RS_N: usize = 255;

/// Maximum message size in pages.
pub const RS_K: usize = 32;

/// Symbols (bytes) carried per page.
pub const PAGE_SYMBOLS: usize = 53;

const fn build_exp() -> [u8; 512] {
    let mut exp = [0u8; 512];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        exp[i + 255] = x as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE;
        }
        i += 1;
    }
    exp
}

const fn build_log(exp: &[u8; 512]) -> [u8; 256] {
    let mut log = [0u8; 256];
    let mut i = 0;
    while i < 255 {
        log[exp[i] as usize] = i as u8;
        i += 1;
    }
    log
}

const EXP: [u8; 512] = build_exp();
const LOG: [u8; 256] = build_log(&EXP);

#[inline]
pub fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        0
    } else {
        EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
    }
}

#[inline]
pub fn gf_inv(a: u8) -> u8 {
    debug_assert!(a != 0);
    EXP[255 - LOG[a as usize] as usize]
}

#[inline]
pub fn gf_div(a: u8, b: u8) -> u8 {
    gf_mul(a, gf_inv(b))
}

/// Generator matrix coefficient for `row` (0-based page index, PID-1) and
/// message page `col`.
///
/// The top [RS_K] rows are the identity (systematic pages); the parity rows
/// are a Cauchy matrix over disjoint row/column labels, so every square
/// submatrix of the truncated generator is invertible and any MS distinct
/// pages determine an MS-page message.
pub fn generator(row: usize, col: usize) -> u8 {
    debug_assert!(row < RS_N && col < RS_K);
    if row < RS_K {
        u8::from(row == col)
    } else {
        gf_inv(row as u8 ^ col as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RsError {
    #[error("need {need} distinct pages, got {got}")]
    PageCount { need: usize, got: usize },

    #[error("duplicate page id {0}")]
    DuplicatePid(u8),

    #[error("page set is not decodable")]
    Singular,
}

/// Encode one page of an `ms`-page message. `pid` is 1-based.
///
/// Pages 1..=ms are the cleartext message pages; higher PIDs are parity.
pub fn encode_page(message: &[[u8; PAGE_SYMBOLS]], pid: u8) -> [u8; PAGE_SYMBOLS] {
    debug_assert!(pid >= 1);
    let row = usize::from(pid) - 1;
    let mut out = [0u8; PAGE_SYMBOLS];
    for (col, page) in message.iter().enumerate() {
        let g = generator(row, col);
        if g == 0 {
            continue;
        }
        for (o, s) in out.iter_mut().zip(page.iter()) {
            *o ^= gf_mul(g, *s);
        }
    }
    out
}

/// Recover the `ms * 53` cleartext bytes from `ms` received pages.
///
/// `pages` holds `(pid, symbols)` in any order. Erasure-only: the erasure
/// pattern is exactly the set of PIDs that were never received.
pub fn erasure_decode(
    ms: usize,
    pages: &[(u8, [u8; PAGE_SYMBOLS])],
) -> Result<Vec<u8>, RsError> {
    if pages.len() != ms || ms == 0 || ms > RS_K {
        return Err(RsError::PageCount {
            need: ms,
            got: pages.len(),
        });
    }
    for (i, (pid, _)) in pages.iter().enumerate() {
        if pages[..i].iter().any(|(p, _)| p == pid) {
            return Err(RsError::DuplicatePid(*pid));
        }
    }

    // Rows of [A | s]: A is the generator restricted to the received PIDs
    // and the first ms message columns, s the received symbols.
    let mut a: Vec<Vec<u8>> = pages
        .iter()
        .map(|(pid, _)| (0..ms).map(|c| generator(usize::from(*pid) - 1, c)).collect())
        .collect();
    let mut s: Vec<[u8; PAGE_SYMBOLS]> = pages.iter().map(|(_, sym)| *sym).collect();

    // Gauss-Jordan over GF(256).
    for col in 0..ms {
        let pivot = (col..ms).find(|&r| a[r][col] != 0).ok_or(RsError::Singular)?;
        a.swap(col, pivot);
        s.swap(col, pivot);

        let inv = gf_inv(a[col][col]);
        for x in a[col].iter_mut() {
            *x = gf_mul(*x, inv);
        }
        for x in s[col].iter_mut() {
            *x = gf_mul(*x, inv);
        }

        for r in 0..ms {
            if r == col || a[r][col] == 0 {
                continue;
            }
            let f = a[r][col];
            for c in 0..ms {
                a[r][c] ^= gf_mul(f, a[col][c]);
            }
            for i in 0..PAGE_SYMBOLS {
                s[r][i] ^= gf_mul(f, s[col][i]);
            }
        }
    }

    let mut out = Vec::with_capacity(ms * PAGE_SYMBOLS);
    for row in &s {
        out.extend_from_slice(row);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_message(ms: usize, seed: u8) -> Vec<[u8; PAGE_SYMBOLS]> {
        (0..ms)
            .map(|p| {
                let mut page = [0u8; PAGE_SYMBOLS];
                for (i, b) in page.iter_mut().enumerate() {
                    *b = (seed ^ (p as u8)).wrapping_mul(31).wrapping_add(i as u8);
                }
                page
            })
            .collect()
    }

    #[test]
    fn field_axioms() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1);
            assert_eq!(gf_div(a, a), 1);
        }
        assert_eq!(gf_mul(0, 7), 0);
    }

    #[test]
    fn systematic_pages_are_cleartext() {
        let msg = sample_message(5, 0x5a);
        for pid in 1..=5u8 {
            assert_eq!(encode_page(&msg, pid), msg[usize::from(pid) - 1]);
        }
    }

    #[test]
    fn parity_only_recovery() {
        let ms = 11;
        let msg = sample_message(ms, 0x17);
        let pages: Vec<_> = (200..200 + ms as u8)
            .map(|pid| (pid, encode_page(&msg, pid)))
            .collect();
        let out = erasure_decode(ms, &pages).unwrap();
        let flat: Vec<u8> = msg.iter().flatten().copied().collect();
        assert_eq!(out, flat);
    }

    #[test]
    fn mixed_out_of_order_recovery() {
        let ms = 4;
        let msg = sample_message(ms, 0xc3);
        let pages = vec![
            (77u8, encode_page(&msg, 77)),
            (2, encode_page(&msg, 2)),
            (255, encode_page(&msg, 255)),
            (1, encode_page(&msg, 1)),
        ];
        let out = erasure_decode(ms, &pages).unwrap();
        let flat: Vec<u8> = msg.iter().flatten().copied().collect();
        assert_eq!(out, flat);
    }

    #[test]
    fn identity_row_beyond_ms_is_singular() {
        // PID 7 of a 4-page message carries a zero-padded message column and
        // contributes nothing; the system must be reported undecodable.
        let ms = 4;
        let msg = sample_message(ms, 1);
        let pages = vec![
            (1u8, encode_page(&msg, 1)),
            (2, encode_page(&msg, 2)),
            (3, encode_page(&msg, 3)),
            (7, [0u8; PAGE_SYMBOLS]),
        ];
        assert_eq!(erasure_decode(ms, &pages), Err(RsError::Singular));
    }

    #[test]
    fn duplicate_pid_rejected() {
        let msg = sample_message(2, 9);
        let pages = vec![(1u8, encode_page(&msg, 1)), (1, encode_page(&msg, 1))];
        assert_eq!(erasure_decode(2, &pages), Err(RsError::DuplicatePid(1)));
    }

    proptest! {
        #[test]
        fn any_ms_distinct_pages_recover(
            ms in 1usize..=8,
            seed in any::<u8>(),
            mut picks in prop::collection::vec(33u8..=255, 8),
        ) {
            picks.sort_unstable();
            picks.dedup();
            prop_assume!(picks.len() >= ms);
            let msg = sample_message(ms, seed);
            let pages: Vec<_> = picks[..ms]
                .iter()
                .map(|&pid| (pid, encode_page(&msg, pid)))
                .collect();
            let out = erasure_decode(ms, &pages).unwrap();
            let flat: Vec<u8> = msg.iter().flatten().copied().collect();
            prop_assert_eq!(out, flat);
        }
    }
}
