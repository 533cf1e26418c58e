//! Main header and chunk framing (spec.md §6).
//!
//! Byte-exact layout: 11-byte main header, then zero or more chunks
//! (`CB`/`QV`/`DT`), then the bitstream payload starting right after `DT`.
//! Grounded in the teacher's own `jp2`-box-style tagged framing (length-
//! prefixed chunks read sequentially until a sentinel), adapted to QB3's
//! flat tag set.

use crate::error::{Qb3Error, Result};
use crate::sample::DataType;

pub const MAGIC: [u8; 4] = [b'Q', b'B', b'3', 0x80];
pub const MAIN_HEADER_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Base = 0,
    Cf = 1,
    Rle = 2,
    CfRle = 3,
    Stored = 255,
}

impl Mode {
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Self::Base,
            1 => Self::Cf,
            2 => Self::Rle,
            3 => Self::CfRle,
            255 => Self::Stored,
            _ => return Err(Qb3Error::InconsistentHeader),
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn has_rle(self) -> bool {
        matches!(self, Self::Rle | Self::CfRle)
    }

    pub fn has_cf(self) -> bool {
        matches!(self, Self::Cf | Self::CfRle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainHeader {
    pub xsize: usize,
    pub ysize: usize,
    pub bands: usize,
    pub dtype: DataType,
    pub mode: Mode,
}

pub fn write_main_header(out: &mut Vec<u8>, h: &MainHeader) {
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&((h.xsize - 1) as u16).to_le_bytes());
    out.extend_from_slice(&((h.ysize - 1) as u16).to_le_bytes());
    out.push((h.bands - 1) as u8);
    out.push(h.dtype.code());
    out.push(h.mode.code());
}

pub fn read_main_header(data: &[u8]) -> Result<(MainHeader, &[u8])> {
    if data.len() < MAIN_HEADER_LEN {
        return Err(Qb3Error::ShortHeader);
    }
    if data[0..4] != MAGIC {
        return Err(Qb3Error::BadMagic);
    }
    let xsize = u16::from_le_bytes([data[4], data[5]]) as usize + 1;
    let ysize = u16::from_le_bytes([data[6], data[7]]) as usize + 1;
    let bands = data[8] as usize + 1;
    let dtype = DataType::from_code(data[9])?;
    let mode = Mode::from_code(data[10])?;
    Ok((MainHeader { xsize, ysize, bands, dtype, mode }, &data[MAIN_HEADER_LEN..]))
}

/// A parsed chunk header: the two-byte tag plus whatever trailing payload
/// the caller should consume next (sized per tag semantics).
pub enum Chunk<'a> {
    CoreBand(&'a [u8]),
    Quanta(&'a [u8]),
    Data(&'a [u8]),
}

/// Parse the chunk sequence starting right after the main header, up to and
/// including `DT`. Returns the parsed chunks seen before `DT` plus the
/// remaining bytes (the bitstream payload, byte-aligned).
pub fn read_chunks(mut data: &[u8], bands: usize) -> Result<(Vec<(Vec<u8>,)>, &[u8])> {
    // Kept generic-free: callers only need core-band bytes and quanta bytes,
    // both collected here; `DT` ends the loop.
    let mut core_band: Option<Vec<u8>> = None;
    let mut quanta: Option<Vec<u8>> = None;
    loop {
        if data.len() < 2 {
            return Err(Qb3Error::ShortHeader);
        }
        let tag = [data[0], data[1]];
        if &tag == b"DT" {
            return Ok((
                vec![
                    (core_band.unwrap_or_default(),),
                    (quanta.unwrap_or_default(),),
                ],
                &data[2..],
            ));
        }
        if data.len() < 4 {
            return Err(Qb3Error::ShortHeader);
        }
        let len = u16::from_le_bytes([data[2], data[3]]) as usize;
        let payload_start = 4;
        if data.len() < payload_start + len {
            return Err(Qb3Error::BadChunkLength { tag });
        }
        let payload = &data[payload_start..payload_start + len];
        match &tag {
            b"CB" => {
                if len != bands {
                    return Err(Qb3Error::BadChunkLength { tag });
                }
                core_band = Some(payload.to_vec());
            }
            b"QV" => {
                if !(1..=4).contains(&len) {
                    return Err(Qb3Error::BadChunkLength { tag });
                }
                quanta = Some(payload.to_vec());
            }
            _ => return Err(Qb3Error::UnknownChunk { tag }),
        }
        data = &data[payload_start + len..];
    }
}

pub fn write_core_band_chunk(out: &mut Vec<u8>, cband: &[u8]) {
    out.extend_from_slice(b"CB");
    out.extend_from_slice(&(cband.len() as u16).to_le_bytes());
    out.extend_from_slice(cband);
}

pub fn write_quanta_chunk(out: &mut Vec<u8>, quanta: u64) {
    let bytes = quanta.to_le_bytes();
    let len = quanta_byte_len(quanta);
    out.extend_from_slice(b"QV");
    out.extend_from_slice(&(len as u16).to_le_bytes());
    out.extend_from_slice(&bytes[..len]);
}

fn quanta_byte_len(quanta: u64) -> usize {
    for len in 1..=4 {
        if quanta < (1u64 << (len * 8)) {
            return len;
        }
    }
    4
}

pub fn write_data_marker(out: &mut Vec<u8>) {
    out.extend_from_slice(b"DT");
}

pub fn decode_quanta_bytes(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_header_roundtrips() {
        let h = MainHeader {
            xsize: 8,
            ysize: 4,
            bands: 3,
            dtype: DataType::U16,
            mode: Mode::CfRle,
        };
        let mut out = Vec::new();
        write_main_header(&mut out, &h);
        assert_eq!(out.len(), MAIN_HEADER_LEN);
        let (parsed, rest) = read_main_header(&out).unwrap();
        assert_eq!(parsed, h);
        assert!(rest.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8; MAIN_HEADER_LEN];
        assert_eq!(read_main_header(&bytes).unwrap_err(), Qb3Error::BadMagic);
    }

    #[test]
    fn rejects_short_header() {
        let bytes = [b'Q', b'B', b'3'];
        assert_eq!(read_main_header(&bytes).unwrap_err(), Qb3Error::ShortHeader);
    }

    #[test]
    fn chunk_sequence_with_core_band_and_quanta() {
        let mut out = Vec::new();
        write_core_band_chunk(&mut out, &[1, 1, 1]);
        write_quanta_chunk(&mut out, 5);
        write_data_marker(&mut out);
        out.push(0xAB); // one byte of payload after DT

        let (chunks, rest) = read_chunks(&out, 3).unwrap();
        assert_eq!(chunks[0].0, vec![1, 1, 1]);
        assert_eq!(decode_quanta_bytes(&chunks[1].0), 5);
        assert_eq!(rest, &[0xAB]);
    }

    #[test]
    fn dt_with_short_trailing_payload_is_not_a_short_header() {
        // `DT` carries no length field; a 1-byte data payload right after it
        // must not require the 4-byte lookahead non-`DT` tags need.
        let mut out = Vec::new();
        write_data_marker(&mut out);
        out.push(0xAB);
        let (_, rest) = read_chunks(&out, 1).unwrap();
        assert_eq!(rest, &[0xAB]);
    }

    #[test]
    fn quanta_byte_len_picks_smallest_fit() {
        assert_eq!(quanta_byte_len(1), 1);
        assert_eq!(quanta_byte_len(255), 1);
        assert_eq!(quanta_byte_len(256), 2);
        assert_eq!(quanta_byte_len(70000), 3);
    }
}
