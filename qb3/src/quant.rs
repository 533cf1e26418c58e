//! Quantizer: round-to/away-from-zero integer division per sample on
//! encode, with saturating multiply on decode (spec.md §3, §9).

/// Quantize a signed sample value by `quanta` (>= 1). `away` selects
/// round-away-from-zero on exact halves; otherwise rounds to nearest with
/// ties toward zero.
pub fn quantize(v: i64, quanta: i64, away: bool) -> i64 {
    if quanta <= 1 {
        return v;
    }
    let q = v / quanta;
    let r = v % quanta;
    if r == 0 {
        return q;
    }
    let half = quanta / 2;
    let abs_r = r.abs();
    let round_up = if quanta % 2 == 0 {
        abs_r > half || (away && abs_r == half)
    } else {
        abs_r > half
    };
    if round_up {
        q + v.signum()
    } else {
        q
    }
}

/// Reconstruct a quantized value, saturating to `[min, max]` (the sample
/// type's representable range) rather than wrapping.
pub fn dequantize(q: i64, quanta: i64, min: i64, max: i64) -> i64 {
    if quanta <= 1 {
        return q.clamp(min, max);
    }
    match q.checked_mul(quanta) {
        Some(v) => v.clamp(min, max),
        None => {
            if q > 0 {
                max
            } else {
                min
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quanta_one_is_identity() {
        for v in [-10, 0, 5, 100] {
            assert_eq!(quantize(v, 1, false), v);
            assert_eq!(dequantize(v, 1, i64::MIN, i64::MAX), v);
        }
    }

    #[test]
    fn round_half_to_zero_by_default() {
        // 10 / 4 = 2.5 exactly; default (away=false) rounds ties toward zero
        assert_eq!(quantize(10, 4, false), 2);
        assert_eq!(quantize(-10, 4, false), -2);
    }

    #[test]
    fn round_half_away_from_zero_when_requested() {
        assert_eq!(quantize(10, 4, true), 3);
        assert_eq!(quantize(-10, 4, true), -3);
    }

    #[test]
    fn rounds_down_below_half() {
        assert_eq!(quantize(9, 4, false), 2); // 2.25 -> 2
        assert_eq!(quantize(11, 4, false), 3); // 2.75 -> 3
    }

    #[test]
    fn dequantize_saturates_at_bounds() {
        assert_eq!(dequantize(100, 1000, 0, 60000), 60000);
        assert_eq!(dequantize(-100, 1000, -500, 500), -500);
    }

    #[test]
    fn dequantize_exact_when_in_range() {
        assert_eq!(dequantize(5, 1000, 0, 60000), 5000);
    }
}
