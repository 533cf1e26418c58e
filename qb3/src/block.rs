//! Per-block orchestration (spec.md §4.8): delta + mag-sign, mode choice
//! between BASE/CF/IDX, and rung-switch emission. One block is 16 samples
//! of a single band, in the scan order from [`crate::magsign::X_LUT`] /
//! [`crate::magsign::Y_LUT`].
//!
//! Grounded in `QB3decode.h`'s `decode()` main loop, which tries the same
//! three shapes in the same signal order (plain rung-switch, then the CF/IDX
//! signal with its differentiating sentinel).

use crate::bitstream::{BitReader, BitWriter};
use crate::cf;
use crate::idx;
use crate::magsign::{self, BLOCK_LEN};
use crate::rung::{self, topbit};
use crate::rung_switch;

/// Running per-band state carried across a band's blocks for the lifetime
/// of an image (spec.md §3, §5): never reset mid-image, only at encoder
/// reset between images of identical shape.
#[derive(Debug, Clone, Copy)]
pub struct BandState {
    pub runbits: u32,
    pub prev: u64,
    pub pcf: u64,
}

impl BandState {
    pub fn new(width: u32) -> Self {
        BandState { runbits: width - 1, prev: 0, pcf: 0 }
    }
}

/// Which block shapes the encoder is allowed to choose between, mirroring
/// `QB3M_BASE` / `QB3M_CF` / `QB3M_BEST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extensions {
    BaseOnly,
    Cf,
    Best,
}

struct Candidate {
    bytes: Vec<u8>,
    bits: usize,
    runbits: u32,
    pcf: u64,
}

fn try_base(group: &[u64; BLOCK_LEN], base_runbits: u32, ubits: u32) -> Candidate {
    let max = group.iter().copied().fold(0u64, u64::max);
    let new_rung = topbit(max | 1);
    let mut w = BitWriter::new();
    rung_switch::encode(&mut w, base_runbits, new_rung, ubits);
    rung::encode_group_stepped(&mut w, group, new_rung);
    let bits = w.position();
    Candidate { bytes: w.into_bytes(), bits, runbits: new_rung, pcf: 0 }
}

fn try_cf(
    group: &[u64; BLOCK_LEN],
    base_runbits: u32,
    base_pcf: u64,
    width: u32,
    ubits: u32,
) -> Option<Candidate> {
    let factor = cf::detect(group)?;
    let mut runbits = base_runbits;
    let mut pcf = base_pcf;
    let mut w = BitWriter::new();
    cf::encode(&mut w, group, factor, &mut runbits, &mut pcf, width, ubits);
    let bits = w.position();
    Some(Candidate { bytes: w.into_bytes(), bits, runbits, pcf })
}

fn try_idx(group: &[u64; BLOCK_LEN], base_runbits: u32, ubits: u32) -> Option<Candidate> {
    let dict = idx::build(group)?;
    let mut runbits = base_runbits;
    let mut w = BitWriter::new();
    idx::encode(&mut w, &dict, &mut runbits, ubits);
    let bits = w.position();
    Some(Candidate { bytes: w.into_bytes(), bits, runbits, pcf: 0 })
}

/// Copy `nbits` bits from a byte buffer into `dst`, via chunks of at most
/// 32 bits. Used to splice the winning mode's scratch encoding into the
/// image's main bit writer once the cheapest candidate is chosen.
fn splice(dst: &mut BitWriter, bytes: &[u8], nbits: usize) {
    let mut r = BitReader::new(bytes);
    let mut remaining = nbits;
    while remaining > 0 {
        let chunk = remaining.min(32) as u32;
        dst.push(r.pull(chunk), chunk);
        remaining -= chunk as usize;
    }
}

/// Encode one block of `raw` (pre-delta, post core-band-subtraction)
/// samples for a band, choosing the cheapest shape `allowed` permits.
pub fn encode_band_block(
    w: &mut BitWriter,
    raw: &[u64; BLOCK_LEN],
    state: &mut BandState,
    width: u32,
    ubits: u32,
    allowed: Extensions,
) {
    let mut group = *raw;
    state.prev = magsign::dsign(&mut group, state.prev, width);

    let mut best = try_base(&group, state.runbits, ubits);

    if allowed != Extensions::BaseOnly {
        if let Some(c) = try_cf(&group, state.runbits, state.pcf, width, ubits) {
            if c.bits < best.bits {
                best = c;
            }
        }
    }
    if allowed == Extensions::Best {
        if let Some(c) = try_idx(&group, state.runbits, ubits) {
            if c.bits < best.bits {
                best = c;
            }
        }
    }

    splice(w, &best.bytes, best.bits);
    state.runbits = best.runbits;
    // BASE and IDX candidates leave `pcf` at the 0 sentinel ("unused"); a
    // winning CF candidate always carries a real value, since CF values are
    // biased away from 0 and 1.
    if best.pcf != 0 {
        state.pcf = best.pcf;
    }
}

/// Decode one block, returning the reconstructed (pre-core-band-addition)
/// samples.
pub fn decode_band_block(
    r: &mut BitReader,
    state: &mut BandState,
    width: u32,
    ubits: u32,
) -> [u64; BLOCK_LEN] {
    let sw = rung_switch::decode(r, state.runbits, ubits);
    let mut group = if !sw.is_signal {
        let g = rung::decode_group_stepped(r, sw.rung);
        state.runbits = sw.rung;
        g
    } else {
        let (r_prime, _) = rung_switch::decode_payload(r, state.runbits, ubits);
        if r_prime == idx::sentinel(ubits) {
            let decoded = idx::decode(r, state.runbits, ubits);
            state.runbits = decoded.new_runbits;
            decoded.group
        } else {
            let decoded = cf::decode(r, r_prime, &mut state.pcf, width, ubits);
            state.runbits = decoded.new_runbits;
            decoded.group
        }
    };

    state.prev = magsign::undsign(&mut group, state.prev, width);
    group
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_sequence(blocks: &[[u64; BLOCK_LEN]], width: u32, ubits: u32, allowed: Extensions) {
        let mut enc_state = BandState::new(width);
        let mut w = BitWriter::new();
        for block in blocks {
            encode_band_block(&mut w, block, &mut enc_state, width, ubits, allowed);
        }
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        let mut dec_state = BandState::new(width);
        for block in blocks {
            let decoded = decode_band_block(&mut r, &mut dec_state, width, ubits);
            assert_eq!(&decoded, block);
        }
    }

    #[test]
    fn all_zero_block_roundtrips() {
        roundtrip_sequence(&[[0u64; BLOCK_LEN]], 8, 3, Extensions::Best);
    }

    #[test]
    fn gradient_sequence_roundtrips() {
        let mut blocks = Vec::new();
        for b in 0..4 {
            let mut block = [0u64; BLOCK_LEN];
            for (i, v) in block.iter_mut().enumerate() {
                *v = ((b * 16 + i) % 256) as u64;
            }
            blocks.push(block);
        }
        roundtrip_sequence(&blocks, 8, 3, Extensions::Best);
    }

    #[test]
    fn cf_eligible_block_roundtrips_under_best() {
        let mut block = [0u64; BLOCK_LEN];
        for (i, v) in block.iter_mut().enumerate() {
            *v = ((i as u64) * 1000) % 60000;
        }
        roundtrip_sequence(&[block], 16, 4, Extensions::Best);
    }

    #[test]
    fn idx_eligible_block_roundtrips_under_best() {
        let block: [u64; BLOCK_LEN] =
            [5, 5, 5, 5, 100, 100, 100, 100, 5, 5, 5, 5, 100, 100, 100, 100];
        roundtrip_sequence(&[block], 8, 3, Extensions::Best);
    }

    #[test]
    fn base_only_mode_never_picks_extensions() {
        let block: [u64; BLOCK_LEN] =
            [5, 5, 5, 5, 100, 100, 100, 100, 5, 5, 5, 5, 100, 100, 100, 100];
        roundtrip_sequence(&[block], 8, 3, Extensions::BaseOnly);
    }

    #[test]
    fn rung63_edge_case_64bit() {
        let mut block = [0u64; BLOCK_LEN];
        block[0] = u64::MAX;
        roundtrip_sequence(&[block], 64, 6, Extensions::Best);
    }

    #[test]
    fn mixed_block_sequence_preserves_state_across_blocks() {
        let b1: [u64; BLOCK_LEN] = [1000, 2000, 3000, 4000, 5000, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let b2: [u64; BLOCK_LEN] =
            [5, 5, 5, 5, 100, 100, 100, 100, 5, 5, 5, 5, 100, 100, 100, 100];
        let b3 = [7u64; BLOCK_LEN];
        roundtrip_sequence(&[b1, b2, b3], 16, 4, Extensions::Best);
    }
}
