//! Error taxonomy for the QB3 codec.
//!
//! Mirrors the four classes from the original library: configuration errors
//! (raised at encoder/decoder construction), format errors (bad headers),
//! stream errors (decode ran out of input or hit an inconsistent rung), and
//! a generic catch-all for anything that does not fit the others.

use std::error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Qb3Error {
    /// Image dimensions below the 4x4 minimum, or not representable.
    InvalidDimensions { width: usize, height: usize },
    /// Band count is zero or exceeds `QB3_MAXBANDS`.
    InvalidBandCount { bands: usize },
    /// Quanta value of zero, or too large for the sample type.
    InvalidQuanta { quanta: u64 },
    /// The core-band map references an out-of-range band.
    InvalidCoreBand { band: usize, bands: usize },
    /// Input buffer too short to contain a QB3 main header.
    ShortHeader,
    /// The 4-byte magic did not match `QB3\x80`.
    BadMagic,
    /// Reserved header bits were set, or the mode/type byte is out of range.
    InconsistentHeader,
    /// A chunk tag that isn't `CB`, `QV`, or `DT`.
    UnknownChunk { tag: [u8; 2] },
    /// A chunk's declared length is inconsistent with the image configuration.
    BadChunkLength { tag: [u8; 2] },
    /// The caller asked to decode into a sample type that doesn't match the
    /// type recorded in the stream header.
    TypeMismatch,
    /// Ran out of bits while decoding a block.
    UnexpectedEof,
    /// A decoded rung fell outside `[0, width)`.
    RungOutOfRange { rung: u32, width: u32 },
    /// A stream signaled an extension/rung combination decode does not
    /// support (e.g. 64-bit IDX at rung 63).
    UnsupportedExtension,
    /// Source length does not match the expected raw size for `STORED` mode.
    StoredSizeMismatch,
    /// Caller's sample slice length doesn't match `xsize * ysize * bands`.
    SampleCountMismatch { expected: usize, actual: usize },
}

impl error::Error for Qb3Error {}

impl fmt::Display for Qb3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions { width, height } => {
                write!(f, "invalid image dimensions {width}x{height}, minimum is 4x4")
            }
            Self::InvalidBandCount { bands } => {
                write!(f, "invalid band count {bands}, must be in 1..=16")
            }
            Self::InvalidQuanta { quanta } => {
                write!(f, "invalid quanta {quanta}, must be >= 1 and fit the sample type")
            }
            Self::InvalidCoreBand { band, bands } => {
                write!(f, "core band reference {band} out of range for {bands} bands")
            }
            Self::ShortHeader => write!(f, "input too short to contain a QB3 header"),
            Self::BadMagic => write!(f, "missing QB3 magic signature"),
            Self::InconsistentHeader => write!(f, "inconsistent or reserved header field"),
            Self::UnknownChunk { tag } => {
                write!(f, "unknown chunk tag {:?}{:?}", tag[0] as char, tag[1] as char)
            }
            Self::BadChunkLength { tag } => {
                write!(f, "chunk {:?}{:?} has an inconsistent length", tag[0] as char, tag[1] as char)
            }
            Self::TypeMismatch => write!(f, "requested sample type does not match stream header"),
            Self::UnexpectedEof => write!(f, "ran out of input bits while decoding a block"),
            Self::RungOutOfRange { rung, width } => {
                write!(f, "rung {rung} out of range for {width}-bit samples")
            }
            Self::UnsupportedExtension => {
                write!(f, "stream requires an unsupported extension/rung combination")
            }
            Self::StoredSizeMismatch => {
                write!(f, "stored-mode payload size does not match the expected raw size")
            }
            Self::SampleCountMismatch { expected, actual } => {
                write!(f, "expected {expected} samples, got {actual}")
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Qb3Error>;
