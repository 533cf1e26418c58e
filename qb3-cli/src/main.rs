use std::error;
use std::error::Error;
use std::fmt;
use std::fs;

use clap::{Parser, Subcommand, ValueEnum};

use qb3::block::Extensions;
use qb3::header::{self, MAIN_HEADER_LEN};
use qb3::{Config, DataType, Decoder, Encoder, Mode, Sample};

#[derive(Debug)]
enum CliError {
    RawSizeMismatch { expected: usize, actual: usize },
}

impl error::Error for CliError {}
impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RawSizeMismatch { expected, actual } => {
                write!(
                    f,
                    "raw input is {actual} bytes, expected {expected} for the given dimensions/type"
                )
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "qb3", about = "Lossless raster codec for scientific/geospatial imagery")]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a raw, row-major, band-interleaved raster into a QB3 stream.
    Encode(EncodeArgs),
    /// Decompress a QB3 stream back into a raw raster.
    Decode(DecodeArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum CliDataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl CliDataType {
    fn to_qb3(self) -> DataType {
        match self {
            Self::U8 => DataType::U8,
            Self::I8 => DataType::I8,
            Self::U16 => DataType::U16,
            Self::I16 => DataType::I16,
            Self::U32 => DataType::U32,
            Self::I32 => DataType::I32,
            Self::U64 => DataType::U64,
            Self::I64 => DataType::I64,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliMode {
    Base,
    Cf,
    Rle,
    CfRle,
    Best,
}

impl CliMode {
    fn to_qb3(self) -> (Mode, Extensions) {
        match self {
            Self::Base => (Mode::Base, Extensions::BaseOnly),
            Self::Cf => (Mode::Cf, Extensions::Cf),
            Self::Rle => (Mode::Rle, Extensions::BaseOnly),
            Self::CfRle => (Mode::CfRle, Extensions::Cf),
            // QB3M_BEST: IDX-eligible on top of the CF-tagged wire mode,
            // since IDX shares CF's signaling path rather than needing its
            // own header bit (spec.md §6).
            Self::Best => (Mode::CfRle, Extensions::Best),
        }
    }
}

#[derive(clap::Args)]
struct EncodeArgs {
    /// Raw input file: row-major, band-interleaved samples in host byte order.
    input: String,
    /// Output QB3 stream.
    output: String,
    #[arg(long)]
    width: usize,
    #[arg(long)]
    height: usize,
    #[arg(long, default_value_t = 1)]
    bands: usize,
    #[arg(long, value_enum, default_value_t = CliDataType::U8)]
    r#type: CliDataType,
    #[arg(long, value_enum, default_value_t = CliMode::Base)]
    mode: CliMode,
    #[arg(long, default_value_t = 1)]
    quanta: u64,
    #[arg(long)]
    round_away: bool,
}

#[derive(clap::Args)]
struct DecodeArgs {
    /// QB3 stream to decompress.
    input: String,
    /// Raw output file: row-major, band-interleaved samples in host byte order.
    output: String,
}

fn read_raw<T: Sample>(bytes: &[u8], count: usize) -> Vec<T> {
    let size = std::mem::size_of::<T>();
    let mut out = Vec::with_capacity(count);
    for chunk in bytes.chunks(size).take(count) {
        let mut buf = [0u8; 8];
        buf[..size].copy_from_slice(chunk);
        out.push(T::from_bits(u64::from_le_bytes(buf)));
    }
    out
}

fn write_raw<T: Sample>(samples: &[T]) -> Vec<u8> {
    let size = std::mem::size_of::<T>();
    let mut out = Vec::with_capacity(samples.len() * size);
    for s in samples {
        out.extend_from_slice(&s.to_bits().to_le_bytes()[..size]);
    }
    out
}

fn encode_cmd(args: EncodeArgs) -> Result<(), Box<dyn Error>> {
    let raw = fs::read(&args.input)?;
    let dtype = args.r#type.to_qb3();
    let count = args.width * args.height * args.bands;
    let expected = count * dtype.byte_size();
    if raw.len() != expected {
        return Err(CliError::RawSizeMismatch { expected, actual: raw.len() }.into());
    }

    let (mode, extensions) = args.mode.to_qb3();
    let mut cfg = Config::new(args.width, args.height, args.bands, dtype)?
        .with_mode(mode)
        .with_extensions(extensions);
    if args.quanta != 1 {
        cfg = cfg.with_quanta(args.quanta, args.round_away)?;
    }

    let out = match dtype {
        DataType::U8 => Encoder::new(cfg).encode(&read_raw::<u8>(&raw, count))?,
        DataType::I8 => Encoder::new(cfg).encode(&read_raw::<i8>(&raw, count))?,
        DataType::U16 => Encoder::new(cfg).encode(&read_raw::<u16>(&raw, count))?,
        DataType::I16 => Encoder::new(cfg).encode(&read_raw::<i16>(&raw, count))?,
        DataType::U32 => Encoder::new(cfg).encode(&read_raw::<u32>(&raw, count))?,
        DataType::I32 => Encoder::new(cfg).encode(&read_raw::<i32>(&raw, count))?,
        DataType::U64 => Encoder::new(cfg).encode(&read_raw::<u64>(&raw, count))?,
        DataType::I64 => Encoder::new(cfg).encode(&read_raw::<i64>(&raw, count))?,
    };

    log::info!("{} -> {} bytes ({} raw)", args.input, out.len(), raw.len());
    fs::write(&args.output, out)?;
    Ok(())
}

fn decode_cmd(args: DecodeArgs) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(&args.input)?;
    if bytes.len() < MAIN_HEADER_LEN {
        return Err(qb3::Qb3Error::ShortHeader.into());
    }
    let (head, _) = header::read_main_header(&bytes)?;

    let mut dec = Decoder::new();
    let raw = match head.dtype {
        DataType::U8 => write_raw(&dec.decode::<u8>(&bytes)?.samples),
        DataType::I8 => write_raw(&dec.decode::<i8>(&bytes)?.samples),
        DataType::U16 => write_raw(&dec.decode::<u16>(&bytes)?.samples),
        DataType::I16 => write_raw(&dec.decode::<i16>(&bytes)?.samples),
        DataType::U32 => write_raw(&dec.decode::<u32>(&bytes)?.samples),
        DataType::I32 => write_raw(&dec.decode::<i32>(&bytes)?.samples),
        DataType::U64 => write_raw(&dec.decode::<u64>(&bytes)?.samples),
        DataType::I64 => write_raw(&dec.decode::<i64>(&bytes)?.samples),
    };

    log::info!(
        "{} -> {} bytes raw ({}x{}x{})",
        args.input,
        raw.len(),
        head.xsize,
        head.ysize,
        head.bands
    );
    fs::write(&args.output, raw)?;
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let opts = Opts::parse();
    match opts.command {
        Command::Encode(args) => encode_cmd(args),
        Command::Decode(args) => decode_cmd(args),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    match run() {
        Err(e) => Err(e.to_string().into()),
        Ok(_) => Ok(()),
    }
}
