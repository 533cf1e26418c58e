//! Rung-switch codec (spec.md §4.5): signals whether a block's rung changed
//! from the previous block of the same band, and doubles as the signal
//! mechanism that introduces a CF or IDX block instead of BASE.
//!
//! Grounded in `QB3decode.h`'s `decode()`: a leading "changed" bit, then (if
//! set) a mag-sign delta coded with [`crate::rung::encode_value`] /
//! [`crate::rung::decode_value`] at rung `UBITS - 1`. `UBITS = log2(W)`, so
//! the delta domain wraps exactly mod `W` (`2^UBITS == W`), matching
//! spec.md's "`Δ = (r_new - r_old) mod W`". A changed-flag with an all-zero
//! decoded delta is reserved as the CF/IDX signal (never produced by a
//! genuine rung change, since that path always takes the "same rung"
//! shortcut instead).

use crate::bitstream::{BitReader, BitWriter};
use crate::magsign::{mags, smag};
use crate::rung;

/// Outcome of decoding one rung-switch.
pub struct Switch {
    pub rung: u32,
    /// True if this switch's payload was the reserved "delta == 0, but the
    /// changed flag was set" signal rather than a genuine rung change.
    pub is_signal: bool,
}

/// Decode a rung-switch with its leading changed-flag bit.
pub fn decode(r: &mut BitReader, current_rung: u32, ubits: u32) -> Switch {
    if r.pull(1) == 0 {
        return Switch { rung: current_rung, is_signal: false };
    }
    let (new_rung, is_signal) = decode_payload(r, current_rung, ubits);
    Switch { rung: new_rung, is_signal }
}

/// Encode a rung-switch with its leading changed-flag bit. `old_rung ==
/// new_rung` always takes the "same" shortcut (a single `0` bit); callers
/// that need to force a genuine change-flagged zero-delta (the CF/IDX
/// signal) should use [`encode_signal`] instead.
pub fn encode(w: &mut BitWriter, old_rung: u32, new_rung: u32, ubits: u32) {
    if old_rung == new_rung {
        w.push(0, 1);
        return;
    }
    w.push(1, 1);
    encode_payload(w, old_rung, new_rung, ubits);
}

/// Emit the reserved CF/IDX signal: changed flag set, zero delta.
pub fn encode_signal(w: &mut BitWriter, ubits: u32) {
    w.push(1, 1);
    rung::encode_scalar(w, 0, ubits - 1);
}

/// Read a rung-switch payload with no leading changed-flag bit (used for
/// the chained reads inside CF/IDX: reduced rung, CF's own rung, IDX's own
/// rung). Returns the new rung and whether the decoded delta was zero.
pub fn decode_payload(r: &mut BitReader, base_rung: u32, ubits: u32) -> (u32, bool) {
    let width = 1u64 << ubits;
    let v = rung::decode_scalar(r, ubits - 1);
    let is_zero = v == 0;
    let delta = smag(v, ubits);
    let new_rung = ((base_rung as u64 + delta) & (width - 1)) as u32;
    (new_rung, is_zero)
}

fn encode_payload(w: &mut BitWriter, base_rung: u32, new_rung: u32, ubits: u32) {
    let width = 1i64 << ubits;
    let delta = (new_rung as i64 - base_rung as i64).rem_euclid(width) as u64;
    let v = mags(delta, ubits);
    rung::encode_scalar(w, v, ubits - 1);
}

/// Encode a chained (no leading flag) rung-switch payload, used inside
/// CF/IDX signaling.
pub fn encode_chained(w: &mut BitWriter, base_rung: u32, new_rung: u32, ubits: u32) {
    encode_payload(w, base_rung, new_rung, ubits);
}
