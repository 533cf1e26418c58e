//! Stateful image decoder (spec.md §5, §7).
//!
//! Each call to [`Decoder::decode`] is self-contained: the stream's own
//! header carries dimensions/type/mode, so there is no persistent per-image
//! configuration to thread through (unlike [`crate::encoder::Encoder`],
//! which is reused across many images of identical shape). Once a decode
//! fails, the decoder latches the error and every subsequent call returns it
//! unchanged until [`Decoder::reset`] (spec.md §7's "no-op until reset").

use crate::bitstream::BitReader;
use crate::block::{self, BandState};
use crate::config;
use crate::error::{Qb3Error, Result};
use crate::header::{self, Mode};
use crate::magsign::{X_LUT, Y_LUT};
use crate::quant;
use crate::rle;
use crate::sample::{self, Sample};
use log::{debug, warn};

pub struct DecodedImage<T> {
    pub xsize: usize,
    pub ysize: usize,
    pub bands: usize,
    pub samples: Vec<T>,
}

#[derive(Default)]
pub struct Decoder {
    last_error: Option<Qb3Error>,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder { last_error: None }
    }

    pub fn reset(&mut self) {
        self.last_error = None;
    }

    pub fn decode<T: Sample>(&mut self, data: &[u8]) -> Result<DecodedImage<T>> {
        if let Some(e) = &self.last_error {
            return Err(e.clone());
        }
        match decode_inner::<T>(data) {
            Ok(img) => Ok(img),
            Err(e) => {
                warn!("decode failed, latching error until reset: {e}");
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }
}

fn decode_inner<T: Sample>(data: &[u8]) -> Result<DecodedImage<T>> {
    let (h, rest) = header::read_main_header(data)?;
    if T::DTYPE != h.dtype {
        return Err(Qb3Error::TypeMismatch);
    }
    let (chunks, body) = header::read_chunks(rest, h.bands)?;
    let cband = if chunks[0].0.is_empty() {
        config::default_core_band(h.bands)
    } else {
        config::validate_or_reset_core_band(&chunks[0].0, h.bands)?
    };
    let quanta = if chunks[1].0.is_empty() { 1u64 } else { header::decode_quanta_bytes(&chunks[1].0) };
    debug!(
        "decoding {}x{}x{} {:?} mode={:?} quanta={quanta}",
        h.xsize, h.ysize, h.bands, h.dtype, h.mode
    );

    let width = h.dtype.width();
    let ubits = h.dtype.ubits();
    let mask = sample::width_mask(width);
    let is_signed = h.dtype.is_signed();
    let expected = h.xsize * h.ysize * h.bands;

    let grid: Vec<u64> = match h.mode {
        Mode::Stored => {
            let byte_size = h.dtype.byte_size();
            if body.len() != expected * byte_size {
                return Err(Qb3Error::StoredSizeMismatch);
            }
            body.chunks(byte_size)
                .map(|chunk| {
                    let mut buf = [0u8; 8];
                    buf[..byte_size].copy_from_slice(chunk);
                    u64::from_le_bytes(buf) & mask
                })
                .collect()
        }
        _ => decode_bitstream(body, &h, &cband, width, ubits, mask)?,
    };

    let (min_i, max_i) = sample::signed_bounds(width, is_signed);
    let mut samples = Vec::with_capacity(expected);
    for &v in &grid {
        let bits = if quanta > 1 {
            let signed = sample::to_signed(v, width, is_signed);
            let dq = quant::dequantize(signed, quanta as i64, min_i, max_i);
            (dq as u64) & mask
        } else {
            v
        };
        samples.push(T::from_bits(bits));
    }

    Ok(DecodedImage { xsize: h.xsize, ysize: h.ysize, bands: h.bands, samples })
}

fn decode_bitstream(
    body: &[u8],
    h: &header::MainHeader,
    cband: &[u8],
    width: u32,
    ubits: u32,
    mask: u64,
) -> Result<Vec<u64>> {
    let bitbytes = if h.mode.has_rle() { rle::decode(body) } else { body.to_vec() };
    let mut br = BitReader::new(&bitbytes);
    let mut band_state: Vec<BandState> = (0..h.bands).map(|_| BandState::new(width)).collect();

    let blocks_x = h.xsize.div_ceil(4);
    let blocks_y = h.ysize.div_ceil(4);
    let mut grid = vec![0u64; h.xsize * h.ysize * h.bands];
    let idx = |x: usize, y: usize, band: usize| (y * h.xsize + x) * h.bands + band;

    for by in 0..blocks_y {
        let y0 = (by * 4).min(h.ysize.saturating_sub(4));
        // One block-row's raw (pre-band-inversion) values, local row index
        // 0..4 maps to absolute row y0..y0+4.
        let mut strip: Vec<Vec<u64>> = vec![vec![0u64; h.xsize * 4]; h.bands];

        for bx in 0..blocks_x {
            let x0 = (bx * 4).min(h.xsize.saturating_sub(4));
            for c in 0..h.bands {
                let values = block::decode_band_block(&mut br, &mut band_state[c], width, ubits);
                for (i, &v) in values.iter().enumerate() {
                    let x = x0 + X_LUT[i];
                    let ly = Y_LUT[i];
                    strip[c][ly * h.xsize + x] = v;
                }
            }
        }

        for c in 0..h.bands {
            let core = cband[c] as usize;
            if core != c {
                for pos in 0..strip[c].len() {
                    strip[c][pos] = strip[c][pos].wrapping_add(strip[core][pos]) & mask;
                }
            }
        }

        for ly in 0..4 {
            let y = y0 + ly;
            for x in 0..h.xsize {
                for c in 0..h.bands {
                    grid[idx(x, y, c)] = strip[c][ly * h.xsize + x];
                }
            }
        }
    }

    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::encoder::Encoder;
    use crate::sample::DataType;

    #[test]
    fn decodes_what_the_encoder_produced() {
        let cfg = Config::new(8, 8, 1, DataType::U8).unwrap();
        let mut enc = Encoder::new(cfg);
        let samples: Vec<u8> = (0..64u32).map(|v| (v % 256) as u8).collect();
        let bytes = enc.encode(&samples).unwrap();

        let mut dec = Decoder::new();
        let img: DecodedImage<u8> = dec.decode(&bytes).unwrap();
        assert_eq!(img.xsize, 8);
        assert_eq!(img.ysize, 8);
        assert_eq!(img.samples, samples);
    }

    #[test]
    fn latches_error_until_reset() {
        let mut dec = Decoder::new();
        let bad = [0u8; 4];
        let first: Result<DecodedImage<u8>> = dec.decode(&bad);
        assert!(first.is_err());
        let second: Result<DecodedImage<u8>> = dec.decode(&bad);
        assert_eq!(first.unwrap_err(), second.unwrap_err());
        dec.reset();
        assert!(dec.last_error.is_none());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let cfg = Config::new(4, 4, 1, DataType::U8).unwrap();
        let mut enc = Encoder::new(cfg);
        let bytes = enc.encode(&[0u8; 16]).unwrap();
        let mut dec = Decoder::new();
        let result: Result<DecodedImage<u16>> = dec.decode(&bytes);
        assert!(matches!(result, Err(Qb3Error::TypeMismatch)));
    }
}
