//! Command-line interface for the multiband compression tool.
//!
//! The CLI works on raw band-sequential sample files: little-endian
//! signed integers, 1, 2, or 4 bytes per sample depending on the dynamic
//! range. Dimensions and the parameter set travel out of band, exactly
//! like the library API: pass the same `--params` file (or overrides) to
//! both `compress` and `decompress`.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use clap::{Args, Parser, Subcommand};

use crate::metrics::DistortionReport;
use crate::params::ParameterSet;
use crate::pipeline::{CompressionPipeline, CompressionResult};
use crate::ImageCube;

/// Multiband Raster Image Compression Tool
///
/// Lossless and near-lossless compression of multispectral and
/// hyperspectral imagery using adaptive prediction and sample-adaptive
/// entropy coding.
#[derive(Parser, Debug)]
#[command(name = "hyperspec")]
#[command(version)]
#[command(about = "Lossless and near-lossless multiband raster image compression")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Cube dimensions, shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GeometryArgs {
    /// Number of spectral bands (Nz)
    #[arg(long)]
    pub bands: usize,

    /// Rows per band (Ny)
    #[arg(long)]
    pub rows: usize,

    /// Columns per row (Nx)
    #[arg(long)]
    pub cols: usize,
}

/// Parameter-set source plus common overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// TOML file holding the full parameter set
    #[arg(short, long)]
    pub params: Option<PathBuf>,

    /// Override: dynamic range in bits per sample
    #[arg(short = 'd', long)]
    pub dynamic_range: Option<u32>,

    /// Override: number of previous bands used for prediction
    #[arg(short = 'P', long)]
    pub prediction_bands: Option<u32>,

    /// Override: maximum absolute reconstruction error (0 = lossless)
    #[arg(short = 'e', long)]
    pub max_error: Option<u32>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compress a raw band-sequential sample file
    Compress {
        /// Input raw sample file
        #[arg(short, long)]
        input: PathBuf,

        /// Output code stream path (omit for a dry run)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Cube dimensions
        #[command(flatten)]
        geometry: GeometryArgs,

        /// Compression parameters
        #[command(flatten)]
        params: ParamArgs,

        /// Verify by round-trip decode before writing
        #[arg(long)]
        verify: bool,

        /// Print the compression result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decompress a code stream back to raw samples
    Decompress {
        /// Input code stream file
        #[arg(short, long)]
        input: PathBuf,

        /// Output raw sample file
        #[arg(short, long)]
        output: PathBuf,

        /// Cube dimensions
        #[command(flatten)]
        geometry: GeometryArgs,

        /// Compression parameters (must match the compressor's)
        #[command(flatten)]
        params: ParamArgs,
    },

    /// Report achievable compression and distortion without writing output
    Analyze {
        /// Input raw sample file
        #[arg(short, long)]
        input: PathBuf,

        /// Cube dimensions
        #[command(flatten)]
        geometry: GeometryArgs,

        /// Compression parameters
        #[command(flatten)]
        params: ParamArgs,
    },
}

/// Run the CLI application.
pub fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else if !cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    match cli.command {
        Commands::Compress {
            input,
            output,
            geometry,
            params,
            verify,
            json,
        } => run_compress(&input, output.as_deref(), &geometry, &params, verify, json, cli.quiet),
        Commands::Decompress {
            input,
            output,
            geometry,
            params,
        } => run_decompress(&input, &output, &geometry, &params),
        Commands::Analyze {
            input,
            geometry,
            params,
        } => run_analyze(&input, &geometry, &params, cli.quiet),
    }
}

/// Resolve the parameter set from file and flag overrides.
fn load_params(args: &ParamArgs) -> Result<ParameterSet> {
    let mut params = match &args.params {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading parameter file {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("parsing parameter file {}", path.display()))?
        }
        None => ParameterSet::default(),
    };

    if let Some(d) = args.dynamic_range {
        params.dynamic_range = d;
    }
    if let Some(p) = args.prediction_bands {
        params.prediction_bands = p;
    }
    if let Some(e) = args.max_error {
        params.max_error = e;
    }
    Ok(params)
}

/// Read a raw little-endian band-sequential sample file into a cube.
fn read_raw_cube(path: &Path, params: &ParameterSet, geometry: &GeometryArgs) -> Result<ImageCube> {
    let bytes =
        fs::read(path).with_context(|| format!("reading sample file {}", path.display()))?;

    let count = geometry.bands * geometry.rows * geometry.cols;
    let width = params.sample_byte_width();
    if bytes.len() != count * width {
        bail!(
            "{}: expected {} bytes for {}x{}x{} samples of {} byte(s), found {}",
            path.display(),
            count * width,
            geometry.bands,
            geometry.rows,
            geometry.cols,
            width,
            bytes.len()
        );
    }

    let mut samples = vec![0i32; count];
    match width {
        1 => {
            for (dst, &src) in samples.iter_mut().zip(&bytes) {
                *dst = i32::from(src as i8);
            }
        }
        2 => {
            let mut wide = vec![0i16; count];
            Cursor::new(&bytes).read_i16_into::<LittleEndian>(&mut wide)?;
            for (dst, &src) in samples.iter_mut().zip(&wide) {
                *dst = i32::from(src);
            }
        }
        _ => Cursor::new(&bytes).read_i32_into::<LittleEndian>(&mut samples)?,
    }

    Ok(ImageCube::new(
        geometry.bands,
        geometry.rows,
        geometry.cols,
        samples,
    )?)
}

/// Write a cube back out as raw little-endian samples.
fn write_raw_cube(path: &Path, cube: &ImageCube, params: &ParameterSet) -> Result<()> {
    let width = params.sample_byte_width();
    let mut bytes = Vec::with_capacity(cube.len() * width);
    for &s in &cube.samples {
        match width {
            1 => bytes.write_i8(s as i8)?,
            2 => bytes.write_i16::<LittleEndian>(s as i16)?,
            _ => bytes.write_i32::<LittleEndian>(s)?,
        }
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Run compression command.
fn run_compress(
    input: &Path,
    output: Option<&Path>,
    geometry: &GeometryArgs,
    param_args: &ParamArgs,
    verify: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let params = load_params(param_args)?;
    let pipeline = CompressionPipeline::new(params.clone())?.verify(verify);

    let cube = read_raw_cube(input, &params, geometry)?;
    let (stream, result) = pipeline.compress_with_stats(&cube)?;

    match output {
        Some(path) => {
            fs::write(path, &stream).with_context(|| format!("writing {}", path.display()))?;
        }
        None => log::info!("dry run: no output written"),
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        print_compression_result(&result);
    }
    Ok(())
}

/// Run decompression command.
fn run_decompress(
    input: &Path,
    output: &Path,
    geometry: &GeometryArgs,
    param_args: &ParamArgs,
) -> Result<()> {
    let params = load_params(param_args)?;
    let pipeline = CompressionPipeline::new(params.clone())?;

    let stream =
        fs::read(input).with_context(|| format!("reading code stream {}", input.display()))?;
    let cube = pipeline.decompress(&stream, geometry.bands, geometry.rows, geometry.cols)?;

    write_raw_cube(output, &cube, &params)
}

/// Run analyze command.
fn run_analyze(
    input: &Path,
    geometry: &GeometryArgs,
    param_args: &ParamArgs,
    quiet: bool,
) -> Result<()> {
    let params = load_params(param_args)?;
    let pipeline = CompressionPipeline::new(params.clone())?;

    let cube = read_raw_cube(input, &params, geometry)?;
    let (stream, result) = pipeline.compress_with_stats(&cube)?;
    let decoded = pipeline.decompress(&stream, cube.bands, cube.rows, cube.cols)?;
    let report = DistortionReport::between(&cube, &decoded, &params)?;

    if !quiet {
        println!("Compression Analysis: {}", input.display());
        println!("========================================");
        println!();
        print_compression_result(&result);
        println!();
        println!("Reconstruction: {}", report);
    }
    Ok(())
}

/// Print compression result.
fn print_compression_result(result: &CompressionResult) {
    println!("Compression Result:");
    println!(
        "  Mode: {}",
        if result.is_lossless {
            "Lossless"
        } else {
            "Near-lossless"
        }
    );
    println!(
        "  Original Size: {} bytes ({:.2} MB)",
        result.original_size,
        result.original_size as f64 / 1_048_576.0
    );
    println!(
        "  Compressed Size: {} bytes ({:.2} MB)",
        result.compressed_size,
        result.compressed_size as f64 / 1_048_576.0
    );
    println!("  Compression Ratio: {:.2}:1", result.compression_ratio);
    println!("  Bits/Sample: {:.2}", result.bits_per_sample);
    println!("  Space Savings: {:.1}%", result.space_savings_percent());
    println!("  Time: {} ms", result.compression_time_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn geometry(bands: usize, rows: usize, cols: usize) -> GeometryArgs {
        GeometryArgs { bands, rows, cols }
    }

    #[test]
    fn test_param_file_with_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.toml");
        let on_disk = ParameterSet {
            dynamic_range: 12,
            prediction_bands: 1,
            ..Default::default()
        };
        fs::write(&path, toml::to_string(&on_disk).unwrap()).unwrap();

        let args = ParamArgs {
            params: Some(path),
            max_error: Some(4),
            ..Default::default()
        };
        let loaded = load_params(&args).unwrap();
        assert_eq!(loaded.dynamic_range, 12);
        assert_eq!(loaded.prediction_bands, 1);
        assert_eq!(loaded.max_error, 4);
    }

    #[test]
    fn test_raw_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube.raw");
        let params = ParameterSet::default();

        let cube = ImageCube::new(2, 2, 2, vec![-512, -1, 0, 1, 2, 3, 400, 511]).unwrap();
        write_raw_cube(&path, &cube, &params).unwrap();
        let back = read_raw_cube(&path, &params, &geometry(2, 2, 2)).unwrap();
        assert_eq!(back, cube);
    }

    #[test]
    fn test_raw_file_size_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.raw");
        fs::write(&path, [0u8; 6]).unwrap();

        let params = ParameterSet::default();
        assert!(read_raw_cube(&path, &params, &geometry(1, 2, 2)).is_err());
    }

    #[test]
    fn test_compress_decompress_through_files() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("cube.raw");
        let stream = dir.path().join("cube.hsc");
        let restored = dir.path().join("restored.raw");

        let params = ParameterSet::default();
        let cube = ImageCube::new(2, 3, 3, (0..18).collect()).unwrap();
        write_raw_cube(&input, &cube, &params).unwrap();

        run_compress(
            &input,
            Some(stream.as_path()),
            &geometry(2, 3, 3),
            &ParamArgs::default(),
            true,
            false,
            true,
        )
        .unwrap();
        run_decompress(&stream, &restored, &geometry(2, 3, 3), &ParamArgs::default()).unwrap();

        assert_eq!(fs::read(&input).unwrap(), fs::read(&restored).unwrap());
    }
}
