//! CF (common-factor) block extension (spec.md §4.6).
//!
//! Grounded in `QB3decode.h`'s `magsabs`/`magsmul` and the CF branch of its
//! `decode()`, and in `denc.h`'s `gcode` (greatest-common-factor search over
//! mag-sign-absolute values). We use a plain Euclidean GCD rather than
//! `gcode`'s min-heap reduction — same result, simpler to get right without
//! a compiler to check it against.

use crate::bitstream::{BitReader, BitWriter};
use crate::magsign::{magsabs, magsmul, mags, smag, BLOCK_LEN};
use crate::rung::{self, topbit};
use crate::rung_switch;

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Greatest common factor across a group's mag-sign-absolute values,
/// ignoring zeros. `None` if the group is all-zero or no factor `>= 2`
/// applies (a factor of 0 or 1 is never useful, matching the `+2` coding
/// bias in `QB3decode.h`).
pub fn detect(group: &[u64; BLOCK_LEN]) -> Option<u64> {
    let mut g = 0u64;
    for &v in group {
        let abs = magsabs(v);
        if abs == 0 {
            continue;
        }
        g = gcd(g, abs);
        if g < 2 {
            return None;
        }
    }
    if g >= 2 {
        Some(g)
    } else {
        None
    }
}

/// Reduce a group by a detected factor: `reduced[i] = group[i] / cf` in
/// mag-sign space (exact, since `cf` divides every non-zero magnitude).
pub fn reduce(group: &[u64; BLOCK_LEN], cf: u64) -> [u64; BLOCK_LEN] {
    let mut out = [0u64; BLOCK_LEN];
    for (o, &v) in out.iter_mut().zip(group.iter()) {
        let abs = magsabs(v) / cf;
        *o = (abs << 1) - (v & 1);
    }
    out
}

/// Rebuild the original group from a decoded reduced group and factor.
pub fn expand(reduced: &[u64; BLOCK_LEN], cf: u64) -> [u64; BLOCK_LEN] {
    let mut out = [0u64; BLOCK_LEN];
    for (o, &v) in out.iter_mut().zip(reduced.iter()) {
        *o = magsmul(v, cf);
    }
    out
}

/// Encode a CF block. `runbits_c`/`pcf_c` are the band's running state,
/// updated in place. `width` is the sample bit width (for the CF value's
/// own mag-sign encoding).
#[allow(clippy::too_many_arguments)]
pub fn encode(
    w: &mut BitWriter,
    group: &[u64; BLOCK_LEN],
    cf: u64,
    runbits_c: &mut u32,
    pcf_c: &mut u64,
    width: u32,
    ubits: u32,
) {
    rung_switch::encode_signal(w, ubits);

    let reduced = reduce(group, cf);
    let max_reduced = reduced.iter().copied().fold(0u64, u64::max);
    let r_prime = topbit(max_reduced | 1);
    rung_switch::encode_chained(w, *runbits_c, r_prime, ubits);

    if cf == *pcf_c {
        w.push(0, 1);
    } else {
        w.push(1, 1);
        // Keep the CF's own rung equal to the reduced rung unless the CF
        // value itself needs more bits than that; the "own rung" flag
        // lets decode tell the two cases apart.
        let cf_coded = mags(cf - 2, width);
        let cf_rung = topbit(cf_coded | 1);
        if cf_rung != r_prime {
            w.push(1, 1);
            rung_switch::encode_chained(w, r_prime, cf_rung, ubits);
            rung::encode_scalar(w, cf_coded, cf_rung);
        } else {
            w.push(0, 1);
            rung::encode_scalar(w, cf_coded, r_prime);
        }
        *pcf_c = cf;
    }

    rung::encode_group_stepped(w, &reduced, r_prime);
    *runbits_c = topbit(max_reduced | 1);
}

pub struct Decoded {
    pub group: [u64; BLOCK_LEN],
    pub new_runbits: u32,
}

/// Decode a CF block. `r_prime` is the already-decoded reduced rung (the
/// chained read the caller performed to distinguish CF from IDX), and
/// `runbits_c` is only used as the chained switch's base by the caller
/// before invoking this function — it plays no further role in decode.
pub fn decode(
    r: &mut BitReader,
    r_prime: u32,
    pcf_c: &mut u64,
    width: u32,
    ubits: u32,
) -> Decoded {
    let differs = r.pull(1);
    let cf = if differs == 0 {
        *pcf_c
    } else {
        let has_own_rung = r.pull(1);
        let cf_rung = if has_own_rung != 0 {
            let (new_rung, _) = rung_switch::decode_payload(r, r_prime, ubits);
            new_rung
        } else {
            r_prime
        };
        let coded = rung::decode_scalar(r, cf_rung);
        let delta = smag(coded, width);
        let cf = delta + 2;
        *pcf_c = cf;
        cf
    };

    let reduced = rung::decode_group_stepped(r, r_prime);
    let group = expand(&reduced, cf);
    let maxval = group.iter().copied().fold(0u64, u64::max);
    let new_runbits = topbit(maxval | 1);
    Decoded { group, new_runbits }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_factor() {
        let mut group = [0u64; BLOCK_LEN];
        // mag-sign values whose absolute magnitudes are all multiples of 5
        for (i, v) in group.iter_mut().enumerate() {
            *v = mags((i as u64 * 5) & 0xff, 8);
        }
        let cf = detect(&group);
        assert_eq!(cf, Some(5));
    }

    #[test]
    fn no_factor_when_values_coprime() {
        let mut group = [0u64; BLOCK_LEN];
        group[0] = mags(2, 8);
        group[1] = mags(3, 8);
        assert_eq!(detect(&group), None);
    }

    #[test]
    fn reduce_expand_roundtrip() {
        let mut group = [0u64; BLOCK_LEN];
        for (i, v) in group.iter_mut().enumerate() {
            *v = mags((i as u64 * 6) & 0xff, 8);
        }
        let cf = detect(&group).unwrap();
        let reduced = reduce(&group, cf);
        let restored = expand(&reduced, cf);
        assert_eq!(restored, group);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut group = [0u64; BLOCK_LEN];
        for (i, v) in group.iter_mut().enumerate() {
            *v = mags((i as u64 * 7) & 0xff, 8);
        }
        let cf = detect(&group).unwrap();
        let ubits = 3u32;
        let width = 8u32;
        let mut runbits = 7u32;
        let mut pcf = 0u64;
        let mut w = BitWriter::new();
        encode(&mut w, &group, cf, &mut runbits, &mut pcf, width, ubits);
        let bytes = w.into_bytes();
        let mut reader = BitReader::new(&bytes);

        // Mirror the caller-side chained-read protocol used by block.rs.
        let sw = rung_switch::decode(&mut reader, 7, ubits);
        assert!(sw.is_signal);
        let (r_prime, _) = rung_switch::decode_payload(&mut reader, 7, ubits);
        let mut pcf_dec = 0u64;
        let decoded = decode(&mut reader, r_prime, &mut pcf_dec, width, ubits);
        assert_eq!(decoded.group, group);
        assert_eq!(pcf_dec, cf);
    }
}
