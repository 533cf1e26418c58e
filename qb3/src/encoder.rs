//! Stateful image encoder (spec.md §5, §6).
//!
//! One `Encoder` holds a [`Config`] plus per-band running state
//! (`runbits`/`prev`/`pcf`); [`Encoder::reset`] clears the running state for
//! reuse across images of identical shape and type without reallocating.

use crate::bitstream::BitWriter;
use crate::block::{self, BandState, Extensions};
use crate::config::{self, Config};
use crate::error::{Qb3Error, Result};
use crate::header::{self, MainHeader, Mode};
use crate::magsign::{BLOCK_LEN, X_LUT, Y_LUT};
use crate::quant;
use crate::rle;
use crate::sample::{self, Sample};
use log::debug;

pub struct Encoder {
    config: Config,
    band_state: Vec<BandState>,
}

impl Encoder {
    pub fn new(config: Config) -> Self {
        let width = config.dtype.width();
        let band_state = (0..config.bands).map(|_| BandState::new(width)).collect();
        Encoder { config, band_state }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clear per-band running state, keeping configuration intact.
    pub fn reset(&mut self) {
        debug!("resetting encoder state for reuse, bands={}", self.config.bands);
        let width = self.config.dtype.width();
        for s in self.band_state.iter_mut() {
            *s = BandState::new(width);
        }
    }

    pub fn max_encoded_size(&self) -> usize {
        config::max_encoded_size(
            self.config.xsize,
            self.config.ysize,
            self.config.bands,
            self.config.dtype.byte_size(),
        )
    }

    fn allowed_extensions(&self) -> Extensions {
        self.config.extensions
    }

    fn build_chunk_bytes(&self) -> Vec<u8> {
        let mut v = Vec::new();
        if self.config.bands > 1 {
            header::write_core_band_chunk(&mut v, &self.config.cband);
        }
        if self.config.quanta != 1 {
            header::write_quanta_chunk(&mut v, self.config.quanta);
        }
        v
    }

    fn write_envelope(&self, out: &mut Vec<u8>, mode: Mode, chunk_bytes: &[u8]) {
        let h = MainHeader {
            xsize: self.config.xsize,
            ysize: self.config.ysize,
            bands: self.config.bands,
            dtype: self.config.dtype,
            mode,
        };
        header::write_main_header(out, &h);
        out.extend_from_slice(chunk_bytes);
        header::write_data_marker(out);
    }

    /// Encode one image. `samples` is row-major, band-interleaved:
    /// `samples[(y * xsize + x) * bands + band]`.
    pub fn encode<T: Sample>(&mut self, samples: &[T]) -> Result<Vec<u8>> {
        let cfg = &self.config;
        if T::DTYPE != cfg.dtype {
            return Err(Qb3Error::TypeMismatch);
        }
        let expected = cfg.xsize * cfg.ysize * cfg.bands;
        if samples.len() != expected {
            return Err(Qb3Error::SampleCountMismatch { expected, actual: samples.len() });
        }

        let width = cfg.dtype.width();
        let ubits = cfg.dtype.ubits();
        let mask = sample::width_mask(width);
        let is_signed = cfg.dtype.is_signed();

        let mut grid: Vec<u64> = samples.iter().map(|s| s.to_bits()).collect();
        if cfg.quanta > 1 {
            for v in grid.iter_mut() {
                let signed = sample::to_signed(*v, width, is_signed);
                let q = quant::quantize(signed, cfg.quanta as i64, cfg.round_away);
                *v = (q as u64) & mask;
            }
        }

        let idx = |x: usize, y: usize, band: usize| (y * cfg.xsize + x) * cfg.bands + band;
        let allowed = self.allowed_extensions();

        let mut bw = BitWriter::new();
        for by in 0..cfg.blocks_y() {
            let y0 = (by * 4).min(cfg.ysize.saturating_sub(4));
            for bx in 0..cfg.blocks_x() {
                let x0 = (bx * 4).min(cfg.xsize.saturating_sub(4));
                for c in 0..cfg.bands {
                    let core = cfg.cband[c] as usize;
                    let mut group = [0u64; BLOCK_LEN];
                    for (i, slot) in group.iter_mut().enumerate() {
                        let x = x0 + X_LUT[i];
                        let y = y0 + Y_LUT[i];
                        let v = grid[idx(x, y, c)];
                        *slot = if core == c {
                            v
                        } else {
                            v.wrapping_sub(grid[idx(x, y, core)]) & mask
                        };
                    }
                    block::encode_band_block(
                        &mut bw,
                        &group,
                        &mut self.band_state[c],
                        width,
                        ubits,
                        allowed,
                    );
                }
            }
        }
        let body = bw.into_bytes();

        let chunk_bytes = self.build_chunk_bytes();
        let (mode_no_store, payload) = if cfg.mode.has_rle() {
            let packed = rle::encode(&body);
            if packed.len() < body.len() {
                debug!("RLE0FFFF accepted: {} -> {} bytes", body.len(), packed.len());
                (cfg.mode, packed)
            } else {
                debug!("RLE0FFFF rejected (no improvement), falling back");
                let fallback = if cfg.mode.has_cf() { Mode::Cf } else { Mode::Base };
                (fallback, body)
            }
        } else {
            (cfg.mode, body)
        };

        let raw_size = expected * cfg.dtype.byte_size();
        if payload.len() >= raw_size {
            debug!(
                "compressed size {} >= raw size {raw_size}, falling back to STORED",
                payload.len()
            );
            let mut out = Vec::with_capacity(header::MAIN_HEADER_LEN + 8 + raw_size);
            let store_chunks = if cfg.quanta != 1 {
                let mut v = Vec::new();
                header::write_quanta_chunk(&mut v, cfg.quanta);
                v
            } else {
                Vec::new()
            };
            self.write_envelope(&mut out, Mode::Stored, &store_chunks);
            for &v in &grid {
                out.extend_from_slice(&v.to_le_bytes()[..cfg.dtype.byte_size()]);
            }
            return Ok(out);
        }

        let mut out = Vec::with_capacity(
            header::MAIN_HEADER_LEN + chunk_bytes.len() + 2 + payload.len(),
        );
        self.write_envelope(&mut out, mode_no_store, &chunk_bytes);
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::DataType;

    #[test]
    fn rejects_wrong_sample_count() {
        let cfg = Config::new(4, 4, 1, DataType::U8).unwrap();
        let mut enc = Encoder::new(cfg);
        let samples = [0u8; 10];
        assert!(enc.encode(&samples).is_err());
    }

    #[test]
    fn rejects_type_mismatch() {
        let cfg = Config::new(4, 4, 1, DataType::U8).unwrap();
        let mut enc = Encoder::new(cfg);
        let samples = [0u16; 16];
        assert!(matches!(enc.encode(&samples), Err(Qb3Error::TypeMismatch)));
    }

    #[test]
    fn encodes_all_zero_block_within_size_bound() {
        let cfg = Config::new(4, 4, 1, DataType::U8).unwrap();
        let mut enc = Encoder::new(cfg);
        let bound = enc.max_encoded_size();
        let samples = [0u8; 16];
        let out = enc.encode(&samples).unwrap();
        assert!(out.len() <= bound);
        assert_eq!(out.len(), header::MAIN_HEADER_LEN + 2 + 1); // header + DT + 1 data byte
    }

    #[test]
    fn reset_clears_running_state() {
        let cfg = Config::new(4, 4, 1, DataType::U8).unwrap();
        let mut enc = Encoder::new(cfg);
        let samples = [9u8; 16];
        let _ = enc.encode(&samples).unwrap();
        assert_ne!(enc.band_state[0].runbits, DataType::U8.width() - 1);
        enc.reset();
        assert_eq!(enc.band_state[0].runbits, DataType::U8.width() - 1);
    }
}
