//! IDX (small-alphabet index) block extension (spec.md §4.7).
//!
//! Grounded in the IDX branch of `QB3decode.h`'s `decode()`: the reduced-rung
//! field is forced to the sentinel `NORM_MASK` (`W - 1`) to distinguish IDX
//! from CF after the shared signal, a second chained switch carries the
//! dictionary's own rung, then 16 fixed-rung-2 indices followed by the
//! dictionary values themselves at the dictionary's rung.

use crate::bitstream::{BitReader, BitWriter};
use crate::magsign::BLOCK_LEN;
use crate::rung::{self, topbit};
use crate::rung_switch;

/// Fixed rung used to code the 16 indices into the dictionary (values 0..7,
/// so 3 bits suffice -- `rung::encode_value` at rung 2 covers `0..=7`).
const INDEX_RUNG: u32 = 2;
const MAX_DICT_LEN: usize = 8;

/// Sentinel written in place of a real reduced rung to flag "this is IDX,
/// not CF" to the shared chained-switch read both extensions share.
pub fn sentinel(ubits: u32) -> u32 {
    (1u32 << ubits) - 1
}

pub struct Dictionary {
    pub values: Vec<u64>,
    pub indices: [u8; BLOCK_LEN],
}

/// Build a dictionary for `group` if it has at most [`MAX_DICT_LEN`] distinct
/// values; `None` otherwise (caller falls back to BASE/CF).
pub fn build(group: &[u64; BLOCK_LEN]) -> Option<Dictionary> {
    let mut values: Vec<u64> = Vec::new();
    let mut indices = [0u8; BLOCK_LEN];
    for (i, &v) in group.iter().enumerate() {
        let idx = match values.iter().position(|&x| x == v) {
            Some(idx) => idx,
            None => {
                if values.len() == MAX_DICT_LEN {
                    return None;
                }
                values.push(v);
                values.len() - 1
            }
        };
        indices[i] = idx as u8;
    }
    Some(Dictionary { values, indices })
}

/// Encode an IDX block. `runbits_c` is the band's running state, updated in
/// place to the dictionary's own rung (matching the upstream convention of
/// setting `runbits[c]` directly from the decoded rung rather than
/// recomputing it from data, unlike CF).
pub fn encode(w: &mut BitWriter, dict: &Dictionary, runbits_c: &mut u32, ubits: u32) {
    rung_switch::encode_signal(w, ubits);
    rung_switch::encode_chained(w, *runbits_c, sentinel(ubits), ubits);

    let max_val = dict.values.iter().copied().fold(0u64, u64::max);
    let r_idx = topbit(max_val | 1);
    rung_switch::encode_chained(w, *runbits_c, r_idx, ubits);

    for &idx in &dict.indices {
        rung::encode_value(w, idx as u64, INDEX_RUNG);
    }
    for &v in &dict.values {
        rung::encode_scalar(w, v, r_idx);
    }

    *runbits_c = r_idx;
}

pub struct Decoded {
    pub group: [u64; BLOCK_LEN],
    pub new_runbits: u32,
}

/// Decode an IDX block's payload. The caller has already consumed the
/// signal bit and the sentinel-forcing chained switch; this reads the
/// dictionary's own rung, the 16 indices, and the dictionary values.
pub fn decode(r: &mut BitReader, runbits_c: u32, ubits: u32) -> Decoded {
    let (r_idx, _) = rung_switch::decode_payload(r, runbits_c, ubits);

    let mut raw_indices = [0u8; BLOCK_LEN];
    for slot in raw_indices.iter_mut() {
        *slot = rung::decode_value(r, INDEX_RUNG) as u8;
    }

    let dict_len = raw_indices.iter().copied().max().map_or(0, |m| m as usize + 1);
    let mut values = Vec::with_capacity(dict_len);
    for _ in 0..dict_len {
        values.push(rung::decode_scalar(r, r_idx));
    }

    let mut group = [0u64; BLOCK_LEN];
    for (slot, &idx) in group.iter_mut().zip(raw_indices.iter()) {
        *slot = values[idx as usize];
    }

    Decoded { group, new_runbits: r_idx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magsign::mags;

    #[test]
    fn builds_dictionary_for_small_alphabet() {
        let mut group = [0u64; BLOCK_LEN];
        for (i, v) in group.iter_mut().enumerate() {
            *v = mags((i % 3) as u64, 8);
        }
        let dict = build(&group).unwrap();
        assert_eq!(dict.values.len(), 3);
        for i in 0..BLOCK_LEN {
            assert_eq!(dict.values[dict.indices[i] as usize], group[i]);
        }
    }

    #[test]
    fn refuses_large_alphabet() {
        let mut group = [0u64; BLOCK_LEN];
        for (i, v) in group.iter_mut().enumerate() {
            *v = mags(i as u64, 8); // 16 distinct values
        }
        assert!(build(&group).is_none());
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut group = [0u64; BLOCK_LEN];
        for (i, v) in group.iter_mut().enumerate() {
            *v = mags(((i * 13) % 5) as u64, 8);
        }
        let dict = build(&group).unwrap();
        let ubits = 3u32;
        let mut runbits = 5u32;
        let mut w = BitWriter::new();
        encode(&mut w, &dict, &mut runbits, ubits);
        let bytes = w.into_bytes();
        let mut reader = BitReader::new(&bytes);

        let sw = rung_switch::decode(&mut reader, 5, ubits);
        assert!(sw.is_signal);
        let (reduced, _) = rung_switch::decode_payload(&mut reader, 5, ubits);
        assert_eq!(reduced, sentinel(ubits));

        let decoded = decode(&mut reader, 5, ubits);
        assert_eq!(decoded.group, group);
        assert_eq!(runbits, decoded.new_runbits);
    }

    #[test]
    fn single_value_dictionary_roundtrips() {
        let group = [mags(4, 8); BLOCK_LEN];
        let dict = build(&group).unwrap();
        assert_eq!(dict.values.len(), 1);
        let ubits = 3u32;
        let mut runbits = 2u32;
        let mut w = BitWriter::new();
        encode(&mut w, &dict, &mut runbits, ubits);
        let bytes = w.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let _ = rung_switch::decode(&mut reader, 2, ubits);
        let _ = rung_switch::decode_payload(&mut reader, 2, ubits);
        let decoded = decode(&mut reader, 2, ubits);
        assert_eq!(decoded.group, group);
    }
}
