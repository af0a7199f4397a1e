//! Multiband Raster Image Compression Library
//!
//! A library for lossless and near-lossless compression of multispectral
//! and hyperspectral imagery, built around an adaptive linear predictor
//! and a sample-adaptive Golomb power-of-two entropy coder.
//!
//! # Features
//!
//! - **Lossless**: bit-exact reconstruction of the input cube
//! - **Near-lossless**: per-sample absolute error bounded by a configured limit
//! - **Deterministic**: the code stream is a pure function of samples and parameters
//! - **Parallel batches**: independent images compress concurrently; each
//!   image pipeline is strictly sequential internally
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hyperspec_compress::{CompressionPipeline, ImageCube, ParameterSet};
//!
//! let params = ParameterSet::default();
//! let pipeline = CompressionPipeline::new(params)?;
//!
//! let cube = ImageCube::new(3, 3, 3, vec![0; 27])?;
//! let stream = pipeline.compress(&cube)?;
//! let restored = pipeline.decompress(&stream, 3, 3, 3)?;
//! assert_eq!(cube.samples, restored.samples);
//! ```
//!
//! # Data model
//!
//! Samples are signed integers of configurable bit depth, stored in
//! band-sequential order: band is the outermost axis, then row, then
//! column. The decompressor is handed the same parameter set and the cube
//! dimensions out of band; the code stream itself carries no header.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod bitio;
pub mod cli;
pub mod coder;
pub mod error;
pub mod metrics;
pub mod params;
pub mod pipeline;
pub mod predictor;

// Re-export commonly used types
pub use error::{HyperspecError, Result};
pub use metrics::DistortionReport;
pub use params::ParameterSet;
pub use pipeline::{CompressionPipeline, CompressionResult};

/// A three-dimensional array of image samples in band-sequential order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCube {
    /// Number of spectral bands (Nz).
    pub bands: usize,
    /// Number of rows per band (Ny).
    pub rows: usize,
    /// Number of columns per row (Nx).
    pub cols: usize,
    /// Sample values, band-sequential: index = (z * rows + y) * cols + x.
    pub samples: Vec<i32>,
}

impl ImageCube {
    /// Create a cube, checking that the sample count matches the dimensions.
    pub fn new(bands: usize, rows: usize, cols: usize, samples: Vec<i32>) -> Result<Self> {
        let expected = bands
            .checked_mul(rows)
            .and_then(|n| n.checked_mul(cols))
            .ok_or_else(|| {
                HyperspecError::DimensionMismatch(format!(
                    "dimensions {}x{}x{} overflow",
                    bands, rows, cols
                ))
            })?;
        if samples.len() != expected {
            return Err(HyperspecError::DimensionMismatch(format!(
                "sample count mismatch: expected {} for {}x{}x{}, got {}",
                expected,
                bands,
                rows,
                cols,
                samples.len()
            )));
        }
        Ok(Self {
            bands,
            rows,
            cols,
            samples,
        })
    }

    /// Create a cube filled with a constant value.
    pub fn filled(bands: usize, rows: usize, cols: usize, value: i32) -> Self {
        Self {
            bands,
            rows,
            cols,
            samples: vec![value; bands * rows * cols],
        }
    }

    /// Linear index of sample (z, y, x).
    #[inline]
    pub fn index(&self, z: usize, y: usize, x: usize) -> usize {
        (z * self.rows + y) * self.cols + x
    }

    /// Sample value at (z, y, x).
    #[inline]
    pub fn get(&self, z: usize, y: usize, x: usize) -> i32 {
        self.samples[self.index(z, y, x)]
    }

    /// Set the sample value at (z, y, x).
    #[inline]
    pub fn set(&mut self, z: usize, y: usize, x: usize, value: i32) {
        let idx = self.index(z, y, x);
        self.samples[idx] = value;
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the cube contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Verify every sample lies within the dynamic range of `params`.
    pub fn validate_range(&self, params: &ParameterSet) -> Result<()> {
        let (lo, hi) = (params.sample_min(), params.sample_max());
        for (i, &s) in self.samples.iter().enumerate() {
            let s = i64::from(s);
            if s < lo || s > hi {
                return Err(HyperspecError::SampleOutOfRange(format!(
                    "sample {} at linear index {} outside [{}, {}]",
                    s, i, lo, hi
                )));
            }
        }
        Ok(())
    }
}

/// Library version information.
pub mod version {
    /// Library version string.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Library name.
    pub const NAME: &str = env!("CARGO_PKG_NAME");

    /// Get full version string.
    pub fn full_version() -> String {
        format!("{} {}", NAME, VERSION)
    }
}
