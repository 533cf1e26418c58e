//! Configuration surface shared by encoder and decoder (spec.md §6, §9):
//! dimensions, band count, sample type, mode, quanta, and the core-band map.

use crate::block::Extensions;
use crate::error::{Qb3Error, Result};
use crate::header::Mode;
use crate::sample::DataType;

pub const MAX_BANDS: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub xsize: usize,
    pub ysize: usize,
    pub bands: usize,
    pub dtype: DataType,
    pub mode: Mode,
    /// Which block shapes the encoder is allowed to choose between
    /// (spec.md §4.8's `QB3M_BASE`/`QB3M_CF`/`QB3M_BEST`). Independent of
    /// `mode`, which is the wire-format tag (BASE/CF/RLE/CF_RLE/STORED):
    /// `mode` controls whether RLE0FFFF post-processing is attempted and
    /// what gets written to the header on success, while `extensions`
    /// controls which block shapes the per-block cost comparison considers.
    pub extensions: Extensions,
    pub quanta: u64,
    pub round_away: bool,
    pub cband: Vec<u8>,
}

impl Config {
    pub fn new(xsize: usize, ysize: usize, bands: usize, dtype: DataType) -> Result<Self> {
        if xsize < 4 || ysize < 4 {
            return Err(Qb3Error::InvalidDimensions { width: xsize, height: ysize });
        }
        if bands == 0 || bands > MAX_BANDS {
            return Err(Qb3Error::InvalidBandCount { bands });
        }
        let cband = default_core_band(bands);
        Ok(Config {
            xsize,
            ysize,
            bands,
            dtype,
            mode: Mode::Base,
            extensions: Extensions::BaseOnly,
            quanta: 1,
            round_away: false,
            cband,
        })
    }

    /// Set the wire-format mode. Also picks the matching default
    /// `extensions` policy (BASE -> base-only, CF/CF_RLE -> CF-eligible);
    /// call [`Config::with_extensions`] afterwards to opt into `QB3M_BEST`
    /// (IDX-eligible) on top of a CF-tagged wire mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.extensions = match mode {
            Mode::Cf | Mode::CfRle => Extensions::Cf,
            _ => Extensions::BaseOnly,
        };
        self.mode = mode;
        self
    }

    /// Override the block-shape selection policy independently of `mode`.
    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_quanta(mut self, quanta: u64, round_away: bool) -> Result<Self> {
        // spec.md §6: quanta must be >= 1 and <= the max positive value of
        // the sample type's signed counterpart, regardless of the type's own
        // signedness (the round_div/saturate arithmetic is always signed).
        let (_, signed_max) = crate::sample::signed_bounds(self.dtype.width(), true);
        if quanta == 0 || quanta > signed_max as u64 {
            return Err(Qb3Error::InvalidQuanta { quanta });
        }
        self.quanta = quanta;
        self.round_away = round_away;
        Ok(self)
    }

    pub fn with_core_band(mut self, cband: Vec<u8>) -> Result<Self> {
        if cband.len() != self.bands {
            return Err(Qb3Error::InvalidCoreBand { band: cband.len(), bands: self.bands });
        }
        self.cband = validate_or_reset_core_band(&cband, self.bands)?;
        Ok(self)
    }

    pub fn blocks_x(&self) -> usize {
        self.xsize.div_ceil(4)
    }

    pub fn blocks_y(&self) -> usize {
        self.ysize.div_ceil(4)
    }
}

/// Default core-band map (spec.md §3): identity, except 3 or 4 bands maps
/// `cband[0] = cband[2] = 1` (R-G, B-G; alpha, if present, stays independent).
pub fn default_core_band(bands: usize) -> Vec<u8> {
    let mut cband: Vec<u8> = (0..bands as u8).collect();
    if bands == 3 || bands == 4 {
        cband[0] = 1;
        cband[2] = 1;
    }
    cband
}

/// Validate a core-band map: every reference must be in range, and every
/// referenced band must itself be a "core" band (`cband[cband[c]] ==
/// cband[c]`). Invalid maps are rewritten to identity (spec.md §9).
pub fn validate_or_reset_core_band(cband: &[u8], bands: usize) -> Result<Vec<u8>> {
    for &c in cband {
        if c as usize >= bands {
            return Err(Qb3Error::InvalidCoreBand { band: c as usize, bands });
        }
    }
    let is_valid = (0..bands).all(|c| {
        let target = cband[c] as usize;
        cband[target] as usize == target
    });
    if is_valid {
        Ok(cband.to_vec())
    } else {
        Ok((0..bands as u8).collect())
    }
}

/// Output-size upper bound (spec.md §4.12): BASE worst case plus headers;
/// RLE and STORED can never exceed it.
pub fn max_encoded_size(xsize: usize, ysize: usize, bands: usize, byte_size: usize) -> usize {
    let blocks_x = xsize.div_ceil(4);
    let blocks_y = ysize.div_ceil(4);
    let n_padded = 16 * blocks_x * blocks_y * bands;
    let bits_per_value = 17.0 / 16.0 + 8.0 * byte_size as f64;
    1024 + ((bits_per_value * n_padded as f64) / 8.0).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_small_dimensions() {
        assert!(Config::new(3, 8, 1, DataType::U8).is_err());
    }

    #[test]
    fn rejects_too_many_bands() {
        assert!(Config::new(8, 8, 17, DataType::U8).is_err());
    }

    #[test]
    fn default_core_band_identity_for_non_rgb_counts() {
        assert_eq!(default_core_band(1), vec![0]);
        assert_eq!(default_core_band(2), vec![0, 1]);
    }

    #[test]
    fn default_core_band_rgb_style_for_three_and_four_bands() {
        assert_eq!(default_core_band(3), vec![1, 1, 1]);
        assert_eq!(default_core_band(4), vec![1, 1, 1, 3]);
    }

    #[test]
    fn invalid_core_band_map_resets_to_identity() {
        // band 2 maps to band 0, but band 0 maps to band 1: not a fixed point
        let bad = vec![1, 1, 0];
        let fixed = validate_or_reset_core_band(&bad, 3).unwrap();
        assert_eq!(fixed, vec![0, 1, 2]);
    }

    #[test]
    fn out_of_range_core_band_reference_is_an_error() {
        assert!(validate_or_reset_core_band(&[0, 5], 2).is_err());
    }

    #[test]
    fn quanta_zero_is_rejected() {
        let cfg = Config::new(8, 8, 1, DataType::U8).unwrap();
        assert!(cfg.with_quanta(0, false).is_err());
    }

    #[test]
    fn quanta_exceeding_signed_max_for_type_is_rejected() {
        let cfg = Config::new(8, 8, 1, DataType::U8).unwrap();
        assert!(cfg.with_quanta(127, false).is_ok());
        let cfg = Config::new(8, 8, 1, DataType::U8).unwrap();
        assert!(cfg.with_quanta(128, false).is_err());
    }

    #[test]
    fn max_encoded_size_is_positive_and_grows_with_image_size() {
        let small = max_encoded_size(4, 4, 1, 1);
        let large = max_encoded_size(400, 400, 3, 4);
        assert!(small >= 1024);
        assert!(large > small);
    }
}
