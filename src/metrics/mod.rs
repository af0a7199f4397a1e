//! Distortion metrics for compressed multiband imagery.
//!
//! Used by the pipeline's round-trip verification and by the CLI's
//! analyze command: in lossless mode the report must show zero
//! difference, in near-lossless mode the maximum error must stay within
//! the configured bound.

use std::fmt;

use crate::error::{HyperspecError, Result};
use crate::params::ParameterSet;
use crate::ImageCube;

/// Error statistics between an original and a reconstructed cube.
#[derive(Debug, Clone)]
pub struct DistortionReport {
    /// Maximum absolute difference between any two samples.
    pub max_error: u64,

    /// Mean absolute difference between samples.
    pub mean_abs_error: f64,

    /// Root mean square error.
    pub rmse: f64,

    /// Peak signal-to-noise ratio in dB over the dynamic-range span;
    /// infinite for identical cubes.
    pub psnr_db: f64,

    /// Number of samples that differ.
    pub diff_samples: usize,

    /// Total number of samples compared.
    pub total_samples: usize,
}

impl DistortionReport {
    /// Compare two cubes sample by sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the cubes have different dimensions.
    pub fn between(
        original: &ImageCube,
        reconstructed: &ImageCube,
        params: &ParameterSet,
    ) -> Result<Self> {
        if original.bands != reconstructed.bands
            || original.rows != reconstructed.rows
            || original.cols != reconstructed.cols
        {
            return Err(HyperspecError::DimensionMismatch(format!(
                "cannot compare {}x{}x{} against {}x{}x{}",
                original.bands,
                original.rows,
                original.cols,
                reconstructed.bands,
                reconstructed.rows,
                reconstructed.cols
            )));
        }

        let mut max_error = 0u64;
        let mut sum_abs = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut diff_samples = 0usize;

        for (&a, &b) in original.samples.iter().zip(&reconstructed.samples) {
            let diff = (i64::from(a) - i64::from(b)).unsigned_abs();
            if diff > 0 {
                diff_samples += 1;
            }
            max_error = max_error.max(diff);
            sum_abs += diff as f64;
            sum_sq += (diff as f64) * (diff as f64);
        }

        let n = original.len() as f64;
        let mse = sum_sq / n;
        let peak = (params.sample_max() - params.sample_min()) as f64;
        let psnr_db = if mse == 0.0 {
            f64::INFINITY
        } else {
            20.0 * peak.log10() - 10.0 * mse.log10()
        };

        Ok(Self {
            max_error,
            mean_abs_error: sum_abs / n,
            rmse: mse.sqrt(),
            psnr_db,
            diff_samples,
            total_samples: original.len(),
        })
    }

    /// Whether the reconstruction is bit-identical to the original.
    pub fn is_lossless(&self) -> bool {
        self.diff_samples == 0
    }

    /// Whether every sample error is within `bound`.
    pub fn within_bound(&self, bound: u32) -> bool {
        self.max_error <= u64::from(bound)
    }
}

impl fmt::Display for DistortionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_lossless() {
            write!(f, "lossless ({} samples identical)", self.total_samples)
        } else {
            write!(
                f,
                "max error {}, MAE {:.4}, RMSE {:.4}, PSNR {:.2} dB ({}/{} samples differ)",
                self.max_error,
                self.mean_abs_error,
                self.rmse,
                self.psnr_db,
                self.diff_samples,
                self.total_samples
            )
        }
    }
}
