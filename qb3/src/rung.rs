//! The triple-length ("BASE") rung codec (spec.md §4.4).
//!
//! Grounded directly in `original_source/denc.h`'s `encode`/`decode`
//! templates and cross-checked against the production `qb3dsz`/`gdecode` in
//! `QB3decode.h`. We keep the original's value-domain split (low/mid/high by
//! comparing the pulled `r`-bit window against the two half-thresholds) but
//! always read incrementally through [`crate::bitstream::BitReader`] rather
//! than decoding a single accumulated word per group; this sidesteps the
//! rung-63/65-bit-codeword special case the original needs for its
//! register-batched fast path (see `encode_value`/`decode_value` below) and
//! stays correct for every rung without a carve-out.
//!
//! Rung 1 is the one case the generic half/quarter split cannot classify:
//! `quarter` collapses to 0, so it needs its own explicit code (see
//! `encode_value_r1`/`decode_value_r1` below), same as the original's
//! hand-tuned `c2codes`/`c2sizes` tables single it out.
//!
//! `DRG0`-`DRG7` in `QB3decode.h` are hand-tuned lookup tables mapping the
//! next `r+2` input bits straight to `(length, value)` for rungs 0-7. Rather
//! than transcribe ~600 lines of hex literals (risking an unverifiable
//! transcription error, since we cannot compile or run this crate), we
//! build the equivalent tables at first use from [`decode_value`] itself via
//! [`std::sync::OnceLock`] — same lookup-by-window-bits fast path, generated
//! from, and therefore always consistent with, the scalar decoder.

use crate::bitstream::{BitReader, BitWriter};
use crate::magsign::BLOCK_LEN;
use crate::step_down;
use std::sync::OnceLock;

/// Mask with the low `n` bits set (`n` may be 0..=64).
#[inline]
fn bitmask(n: u32) -> u64 {
    if n == 0 {
        0
    } else if n >= 64 {
        !0u64
    } else {
        (1u64 << n) - 1
    }
}

/// Index of the highest set bit, i.e. the rung a value requires. `v` must
/// be non-zero (callers pass `max | 1`, per spec.md's `topbit(max | 1)`).
#[inline]
pub fn topbit(v: u64) -> u32 {
    debug_assert!(v != 0);
    63 - v.leading_zeros()
}

/// Encode one mag-sign value at rung `r >= 1` using the triple-length
/// scheme. `v` must be `< 2 << r` (caller's rung must bound it).
pub fn encode_value(w: &mut BitWriter, v: u64, r: u32) {
    debug_assert!(r >= 1 && r < 64);
    if r == 1 {
        encode_value_r1(w, v);
        return;
    }
    let half = 1u64 << (r - 1);
    let full = 1u64 << r;
    if v < half {
        w.push(v | half, r);
    } else if v < full {
        let val = (v >> 1) | ((v & 1) << r);
        w.push(val, r + 1);
    } else {
        let vv = v & bitmask(r);
        if r == 63 {
            // r+2 == 65 bits, one push call can't carry that; split as the
            // original does, low r bits then the 2-bit tail.
            w.push(vv >> 2, r);
            w.push(vv & 0b11, 2);
        } else {
            let val = (vv >> 2) | ((vv & 0b11) << r);
            w.push(val, r + 2);
        }
    }
}

/// Decode one mag-sign value at rung `r >= 1`.
pub fn decode_value(r_in: &mut BitReader, r: u32) -> u64 {
    debug_assert!(r >= 1 && r < 64);
    if r == 1 {
        return decode_value_r1(r_in);
    }
    let half = 1u64 << (r - 1);
    let quarter = half >> 1;
    let w = r_in.pull(r);
    if w >= half {
        w - half
    } else if w >= quarter {
        let extra = r_in.pull(1);
        extra + (w << 1)
    } else {
        let extra = r_in.pull(2);
        (1u64 << r) + (w << 2) + extra
    }
}

/// Rung-1 has its own disambiguation scheme, matching the original's hand-
/// tuned `c2codes`/`c2sizes` compact tables. The generic low/mid/high split
/// above classifies a mid- vs. high-range codeword by comparing the pulled
/// `r`-bit window against `quarter = half >> 1`; at `r == 1`, `quarter`
/// collapses to 0, so that comparison can never select the high range and
/// every high-range value (mag-sign 2 or 3) is misdecoded as mid-range,
/// under-consuming a bit and desyncing the rest of the stream. The 4-value
/// domain at rung 1 (`v` in `0..=3`) instead gets an explicit length-limited
/// prefix code: one value at 1 bit, one at 2 bits, two at 3 bits (a complete
/// code, since `2^-1 + 2^-2 + 2*2^-3 == 1`).
#[inline]
fn encode_value_r1(w: &mut BitWriter, v: u64) {
    match v {
        0 => w.push(0b1, 1),
        1 => w.push(0b10, 2),
        2 => w.push(0b000, 3),
        3 => w.push(0b100, 3),
        _ => unreachable!("mag-sign value {v} out of range for rung 1"),
    }
}

#[inline]
fn decode_value_r1(r_in: &mut BitReader) -> u64 {
    if r_in.pull(1) == 1 {
        return 0;
    }
    if r_in.pull(1) == 1 {
        return 1;
    }
    if r_in.pull(1) == 0 {
        2
    } else {
        3
    }
}

/// Scalar value at rung 0: a single bit, `0` or `1`.
#[inline]
pub fn encode_scalar(w: &mut BitWriter, v: u64, r: u32) {
    if r == 0 {
        w.push(v & 1, 1);
    } else {
        encode_value(w, v, r);
    }
}

#[inline]
pub fn decode_scalar(r_in: &mut BitReader, r: u32) -> u64 {
    if r == 0 {
        r_in.pull(1)
    } else {
        decode_value(r_in, r)
    }
}

/// Encode a full 16-value group at rung `r`. At `r == 0` the whole group is
/// either the single bit `0` (all-zero) or a `1` flag followed by 16 raw
/// bits, per spec.md §4.4.
pub fn encode_group(w: &mut BitWriter, group: &[u64; BLOCK_LEN], r: u32) {
    if r == 0 {
        if group.iter().all(|&v| v == 0) {
            w.push(0, 1);
            return;
        }
        w.push(1, 1);
        let mut acc = 0u64;
        for (i, &v) in group.iter().enumerate() {
            acc |= (v & 1) << i;
        }
        w.push(acc, BLOCK_LEN as u32);
        return;
    }
    for &v in group {
        encode_value(w, v, r);
    }
}

pub fn decode_group(r_in: &mut BitReader, r: u32) -> [u64; BLOCK_LEN] {
    let mut group = [0u64; BLOCK_LEN];
    if r == 0 {
        if r_in.pull(1) == 0 {
            return group;
        }
        let mut acc = r_in.pull(BLOCK_LEN as u32);
        for slot in group.iter_mut() {
            *slot = acc & 1;
            acc >>= 1;
        }
        return group;
    }
    for slot in group.iter_mut() {
        *slot = decode_value(r_in, r);
    }
    group
}

/// Encode a 16-value group, applying step-down canonicalization first.
/// This is the codec [`crate::block`] uses for BASE blocks and for CF/IDX
/// reduced/dictionary groups alike (the upstream `gdecode` applies the
/// step-down check unconditionally, regardless of which mode invoked it).
pub fn encode_group_stepped(w: &mut BitWriter, group: &[u64; BLOCK_LEN], r: u32) {
    let mut g = *group;
    step_down::apply(&mut g, r);
    encode_group(w, &g, r);
}

/// Inverse of [`encode_group_stepped`].
pub fn decode_group_stepped(r_in: &mut BitReader, r: u32) -> [u64; BLOCK_LEN] {
    let mut g = decode_group(r_in, r);
    step_down::undo(&mut g, r);
    g
}

/// A precomputed `(length, value)` lookup keyed by the next `r+2` bits,
/// generated from [`decode_value`] rather than transcribed from the
/// original's `DRG` tables. Valid for `r` in `1..=7` (table-driven fast
/// path required by spec.md §4.4); `r == 0` and `r >= 8` fall back to the
/// scalar path.
fn table_for_rung(r: u32) -> &'static [(u8, u64)] {
    static TABLES: [OnceLock<Vec<(u8, u64)>>; 8] = [
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
    ];
    TABLES[r as usize].get_or_init(|| build_table(r))
}

fn build_table(r: u32) -> Vec<(u8, u64)> {
    let width = r + 2;
    let size = 1usize << width;
    let mut table = Vec::with_capacity(size);
    for window in 0..size as u64 {
        // Materialize `width` bits (plus 64 bits of zero padding, matching
        // the reader's own EOF behavior) and decode through the scalar path
        // so the table is always consistent with it.
        let mut w = BitWriter::new();
        w.push(window, width);
        w.push(0, 64); // padding so decode_value never runs past this window
        let bytes = w.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let before = reader.position();
        let value = decode_value(&mut reader, r);
        let len = (reader.position() - before) as u8;
        table.push((len, value));
    }
    table
}

/// Table-driven decode of one value at rung `r`, for `r` in `1..=7`.
/// Falls back to [`decode_value`] outside that range.
pub fn decode_value_tabled(r_in: &mut BitReader, r: u32) -> u64 {
    if !(1..=7).contains(&r) {
        return decode_value(r_in, r);
    }
    let window = r_in.peek() & bitmask(r + 2);
    let (len, value) = table_for_rung(r)[window as usize];
    r_in.advance(len as usize);
    value
}
