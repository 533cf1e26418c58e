//! Step-down canonicalization (spec.md §4.3).
//!
//! `QB3common.h`, which contains the upstream `step()` helper `gdecode` calls,
//! is not part of the retrieved source set, so this is a clean-room
//! implementation of the behavior spec.md §4.3 describes: whenever the
//! bit-`r` sequence across a group's 16 positions is a clean prefix run of
//! ones followed by zeros, the encoder clears the run's last 1-bit, and the
//! decoder detects the resulting shorter run and restores it. Scattered
//! (non-prefix) bit-`r` patterns are left untouched in both directions.

use crate::magsign::BLOCK_LEN;

/// Apply step-down to a post-delta, post-mag-sign group at rung `r`.
/// No-op for `r == 0` (step-down only applies to rungs carrying a real
/// top-bit choice).
pub fn apply(group: &mut [u64; BLOCK_LEN], r: u32) {
    if r == 0 {
        return;
    }
    let bit = |g: &[u64; BLOCK_LEN], i: usize| (g[i] >> r) & 1;
    let mut k = 0usize;
    while k < BLOCK_LEN && bit(group, k) != 0 {
        k += 1;
    }
    if k == 0 || k == BLOCK_LEN {
        return; // all-zero or all-ones at bit r: nothing to canonicalize
    }
    if (k..BLOCK_LEN).all(|i| bit(group, i) == 0) {
        group[k - 1] ^= 1u64 << r;
    }
}

/// Invert [`apply`].
pub fn undo(group: &mut [u64; BLOCK_LEN], r: u32) {
    if r == 0 {
        return;
    }
    let bit = |g: &[u64; BLOCK_LEN], i: usize| (g[i] >> r) & 1;
    if bit(group, BLOCK_LEN - 1) != 0 {
        return; // last position carries the top bit: no flip happened
    }
    let mut j = 0usize;
    while j < BLOCK_LEN && bit(group, j) != 0 {
        j += 1;
    }
    if (j..BLOCK_LEN).all(|i| bit(group, i) == 0) {
        group[j] ^= 1u64 << r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(mut group: [u64; BLOCK_LEN], r: u32) {
        let original = group;
        apply(&mut group, r);
        undo(&mut group, r);
        assert_eq!(group, original, "r={r}");
    }

    #[test]
    fn idempotent_on_clean_step() {
        // bit-2 pattern: 1,1,1,0,0,... (k=3)
        let group = [
            0b100, 0b101, 0b110, 0b001, 0b011, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        roundtrip(group, 2);
    }

    #[test]
    fn idempotent_on_all_ones() {
        let group = [0b100; BLOCK_LEN];
        roundtrip(group, 2);
    }

    #[test]
    fn idempotent_on_all_zero_at_bit() {
        let group = [0b011; BLOCK_LEN];
        roundtrip(group, 2);
    }

    #[test]
    fn leaves_scattered_pattern_untouched() {
        let mut group = [0u64; BLOCK_LEN];
        group[0] = 0b100;
        group[5] = 0b100; // non-prefix: a 1 appears after a 0 in scan order
        let before = group;
        apply(&mut group, 2);
        assert_eq!(group, before);
    }

    #[test]
    fn flips_single_leading_value() {
        let mut group = [0u64; BLOCK_LEN];
        group[0] = 0b101; // k = 1
        apply(&mut group, 2);
        assert_eq!(group[0], 0b001);
        undo(&mut group, 2);
        assert_eq!(group[0], 0b101);
    }
}
