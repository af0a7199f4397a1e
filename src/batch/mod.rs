//! Parallel batch compression of independent images.
//!
//! The per-image pipeline is strictly sequential, but separate images
//! share no state, so a batch runs one pipeline instance per cube on a
//! bounded thread pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use hyperspec_compress::batch::BatchCompressor;
//! use hyperspec_compress::ParameterSet;
//!
//! let batch = BatchCompressor::new(ParameterSet::default())?
//!     .max_parallel(4)
//!     .show_progress(true);
//!
//! let outcomes = batch.compress_all(&cubes)?;
//! let stats = BatchCompressor::summarize(&outcomes);
//! println!("{} of {} compressed", stats.successful, stats.total_images);
//! ```

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::error::{HyperspecError, Result};
use crate::params::ParameterSet;
use crate::pipeline::{CompressionPipeline, CompressionResult};
use crate::ImageCube;

/// Statistics aggregated over a batch run.
#[derive(Debug, Default)]
pub struct BatchStats {
    /// Total images in the batch.
    pub total_images: usize,
    /// Successfully compressed images.
    pub successful: usize,
    /// Failed images.
    pub failed: usize,
    /// Total uncompressed size in bytes.
    pub total_original_bytes: usize,
    /// Total compressed size in bytes.
    pub total_compressed_bytes: usize,
}

impl BatchStats {
    /// Calculate overall compression ratio.
    pub fn overall_ratio(&self) -> f64 {
        if self.total_compressed_bytes == 0 {
            0.0
        } else {
            self.total_original_bytes as f64 / self.total_compressed_bytes as f64
        }
    }
}

/// Batch compressor running one pipeline per image in parallel.
pub struct BatchCompressor {
    /// Compression parameters shared (read-only) by every image.
    params: ParameterSet,

    /// Maximum parallel jobs.
    max_parallel: usize,

    /// Whether to render a progress bar.
    show_progress: bool,

    /// Whether each pipeline verifies its own round trip.
    verify: bool,
}

impl BatchCompressor {
    /// Create a batch compressor; the parameter set is validated once here.
    pub fn new(params: ParameterSet) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            max_parallel: num_cpus::get(),
            show_progress: false,
            verify: false,
        })
    }

    /// Set maximum parallel jobs.
    pub fn max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n.max(1);
        self
    }

    /// Enable or disable the progress bar.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Enable round-trip verification in each pipeline.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Compress every cube, returning per-image outcomes in input order.
    pub fn compress_all(
        &self,
        cubes: &[ImageCube],
    ) -> Result<Vec<Result<(Vec<u8>, CompressionResult)>>> {
        if cubes.is_empty() {
            return Err(HyperspecError::Internal("no images to compress".into()));
        }

        let progress = if self.show_progress {
            ProgressBar::new(cubes.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel)
            .build()
            .map_err(|e| HyperspecError::Internal(e.to_string()))?;

        let outcomes = pool.install(|| {
            cubes
                .par_iter()
                .map(|cube| {
                    let outcome = CompressionPipeline::new(self.params.clone())
                        .map(|p| p.verify(self.verify))
                        .and_then(|p| p.compress_with_stats(cube));
                    progress.inc(1);
                    outcome
                })
                .collect()
        });

        progress.finish_and_clear();
        Ok(outcomes)
    }

    /// Aggregate per-image outcomes into batch statistics.
    pub fn summarize(outcomes: &[Result<(Vec<u8>, CompressionResult)>]) -> BatchStats {
        let mut stats = BatchStats {
            total_images: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok((_, result)) => {
                    stats.successful += 1;
                    stats.total_original_bytes += result.original_size;
                    stats.total_compressed_bytes += result.compressed_size;
                }
                Err(_) => stats.failed += 1,
            }
        }
        stats
    }
}
