//! QB3: a lossless, optionally quantized codec for rectangular rasters of
//! 8/16/32/64-bit integer samples.
//!
//! The crate is organized leaves-first, the same way the codec's own data
//! flow is: bit packing at the bottom ([`bitstream`]), the mag-sign/delta
//! transform and 4x4 scan order ([`magsign`]) above it, the triple-length
//! rung codec ([`rung`]) and its rung-switch sibling ([`rung_switch`]) above
//! that, the CF and IDX block extensions ([`cf`], [`idx`]) built on top of
//! those, and [`block`] orchestrating per-block mode choice. [`header`]
//! frames the wire format around the block stream, [`rle`] is the optional
//! byte-level post-pass, and [`encoder`]/[`decoder`] tie the whole pipeline
//! to a stateful, reusable object per spec.md §5.

#![allow(dead_code)]

pub mod bitstream;
pub mod block;
pub mod cf;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod header;
pub mod idx;
pub mod magsign;
pub mod quant;
pub mod rle;
pub mod rung;
pub mod rung_switch;
pub mod sample;
pub mod step_down;

pub use config::Config;
pub use decoder::{Decoder, DecodedImage};
pub use encoder::Encoder;
pub use error::{Qb3Error, Result};
pub use header::Mode;
pub use sample::{DataType, Sample};
