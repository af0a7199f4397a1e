//! Compression parameter set and validation.
//!
//! The parameter bundle is fixed for a whole image and must be shared
//! out of band between compressor and decompressor: the code stream
//! itself carries no header. Every stage of the pipeline borrows the
//! same immutable [`ParameterSet`].

use serde::{Deserialize, Serialize};

use crate::error::{HyperspecError, Result};

/// Parameters governing prediction and entropy coding.
///
/// All bounds are checked by [`ParameterSet::validate`], which runs before
/// any pixel is processed. The defaults describe lossless compression of
/// 10-bit imagery with two previous bands of spectral prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    /// Dynamic range D in bits per sample (2-32). Samples are signed:
    /// the valid range is [-2^(D-1), 2^(D-1) - 1].
    pub dynamic_range: u32,

    /// Weight resolution Omega (4-19).
    pub weight_resolution: u32,

    /// Sample-representative resolution Theta (0-4).
    pub representative_resolution: u32,

    /// Representative damping phi (0 to 2^Theta - 1).
    pub damping: u32,

    /// Representative offset psi (0 to 2^Theta - 1).
    pub offset: u32,

    /// Number of previous bands used for prediction, P (0-15).
    pub prediction_bands: u32,

    /// Register size R in bits for the predictor's modular reduction
    /// (max(32, D + Omega + 1) to 64).
    pub register_size: u32,

    /// Lower bound of the weight-update scaling exponent (>= -6).
    pub v_min: i32,

    /// Upper bound of the weight-update scaling exponent (<= 9, > v_min).
    pub v_max: i32,

    /// Weight-update period t_inc, a power of two in [2^4, 2^11].
    pub t_inc: u32,

    /// Intraband weight-update offset (-6 to 5).
    pub intra_offset: i32,

    /// Interband weight-update offset (-6 to 5).
    pub inter_offset: i32,

    /// Maximum allowed absolute reconstruction error per sample.
    /// Zero selects lossless compression.
    pub max_error: u32,

    /// Unary length limit U_max for entropy codewords (8-32).
    pub unary_limit: u32,

    /// Initial counter exponent gamma_0 (1-8).
    pub initial_count_exp: u32,

    /// Accumulator initialization constant kappa' (0 to min(D-2, 14)).
    pub accum_init_constant: u32,

    /// Counter rescaling exponent gamma_* (4-11, > gamma_0).
    pub rescale_count_exp: u32,

    /// Output word size in bytes (1-8); the code stream is zero-padded
    /// to a multiple of this.
    pub output_word_size: u32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            dynamic_range: 10,
            weight_resolution: 4,
            representative_resolution: 4,
            damping: 0,
            offset: 0,
            prediction_bands: 2,
            register_size: 64,
            v_min: -6,
            v_max: 9,
            t_inc: 16,
            intra_offset: 1,
            inter_offset: 1,
            max_error: 0,
            unary_limit: 8,
            initial_count_exp: 1,
            accum_init_constant: 0,
            rescale_count_exp: 5,
            output_word_size: 1,
        }
    }
}

impl ParameterSet {
    /// Create a lossless parameter set with the given dynamic range.
    pub fn lossless(dynamic_range: u32) -> Self {
        Self {
            dynamic_range,
            max_error: 0,
            ..Default::default()
        }
    }

    /// Create a near-lossless parameter set with the given error bound.
    pub fn near_lossless(dynamic_range: u32, max_error: u32) -> Self {
        Self {
            dynamic_range,
            max_error,
            ..Default::default()
        }
    }

    /// Smallest sample value: -2^(D-1).
    #[inline]
    pub fn sample_min(&self) -> i64 {
        -(1i64 << (self.dynamic_range - 1))
    }

    /// Largest sample value: 2^(D-1) - 1.
    #[inline]
    pub fn sample_max(&self) -> i64 {
        (1i64 << (self.dynamic_range - 1)) - 1
    }

    /// Mid-range sample value.
    #[inline]
    pub fn sample_mid(&self) -> i64 {
        0
    }

    /// Smallest weight value: -2^(Omega + 2).
    #[inline]
    pub fn weight_min(&self) -> i64 {
        -(1i64 << (self.weight_resolution + 2))
    }

    /// Largest weight value: 2^(Omega + 2) - 1.
    #[inline]
    pub fn weight_max(&self) -> i64 {
        (1i64 << (self.weight_resolution + 2)) - 1
    }

    /// Adjusted accumulator constant kappa, folding large kappa' values
    /// back into range for high dynamic ranges.
    #[inline]
    pub fn accum_init_k(&self) -> u32 {
        let headroom = 30i64 - i64::from(self.dynamic_range);
        if i64::from(self.accum_init_constant) <= headroom {
            self.accum_init_constant
        } else {
            2 * self.accum_init_constant + self.dynamic_range - 30
        }
    }

    /// Whether this parameter set describes lossless compression.
    #[inline]
    pub fn is_lossless(&self) -> bool {
        self.max_error == 0
    }

    /// Bytes needed to store one uncompressed sample of this dynamic range.
    #[inline]
    pub fn sample_byte_width(&self) -> usize {
        match self.dynamic_range {
            0..=8 => 1,
            9..=16 => 2,
            _ => 4,
        }
    }

    /// Smallest register size permitted for this D and Omega.
    #[inline]
    pub fn min_register_size(&self) -> u32 {
        32.max(self.dynamic_range + self.weight_resolution + 1)
    }

    /// Check every parameter against its documented bounds.
    ///
    /// Returns the first violation found. Called by the pipeline before
    /// any sample is processed.
    pub fn validate(&self) -> Result<()> {
        fn bounds(name: &str, value: i64, lo: i64, hi: i64) -> Result<()> {
            if value < lo || value > hi {
                return Err(HyperspecError::ParameterOutOfRange(format!(
                    "{} = {} outside [{}, {}]",
                    name, value, lo, hi
                )));
            }
            Ok(())
        }

        bounds("dynamic_range", self.dynamic_range.into(), 2, 32)?;
        bounds("weight_resolution", self.weight_resolution.into(), 4, 19)?;
        bounds(
            "representative_resolution",
            self.representative_resolution.into(),
            0,
            4,
        )?;
        let rep_max = (1i64 << self.representative_resolution) - 1;
        bounds("damping", self.damping.into(), 0, rep_max)?;
        bounds("offset", self.offset.into(), 0, rep_max)?;
        bounds("prediction_bands", self.prediction_bands.into(), 0, 15)?;
        bounds(
            "register_size",
            self.register_size.into(),
            self.min_register_size().into(),
            64,
        )?;
        bounds("v_min", self.v_min.into(), -6, (self.v_max - 1).into())?;
        bounds("v_max", self.v_max.into(), (self.v_min + 1).into(), 9)?;
        bounds("t_inc", self.t_inc.into(), 1 << 4, 1 << 11)?;
        if !self.t_inc.is_power_of_two() {
            return Err(HyperspecError::ParameterOutOfRange(format!(
                "t_inc = {} is not a power of two",
                self.t_inc
            )));
        }
        bounds("intra_offset", self.intra_offset.into(), -6, 5)?;
        bounds("inter_offset", self.inter_offset.into(), -6, 5)?;
        bounds("max_error", self.max_error.into(), 0, self.sample_max())?;
        bounds("unary_limit", self.unary_limit.into(), 8, 32)?;
        bounds("initial_count_exp", self.initial_count_exp.into(), 1, 8)?;
        bounds(
            "accum_init_constant",
            self.accum_init_constant.into(),
            0,
            (self.dynamic_range - 2).min(14).into(),
        )?;
        // The counter must be able to reach the rescaling threshold,
        // otherwise the accumulator grows without bound.
        bounds(
            "rescale_count_exp",
            self.rescale_count_exp.into(),
            4.max(i64::from(self.initial_count_exp) + 1),
            11,
        )?;
        bounds("output_word_size", self.output_word_size.into(), 1, 8)?;

        if !self.is_lossless() && self.representative_resolution > 0 && self.damping > 0 {
            log::debug!(
                "near-lossless with damping {} and offset {} enabled",
                self.damping,
                self.offset
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_valid() {
        assert!(ParameterSet::default().validate().is_ok());
    }

    #[test]
    fn test_derived_ranges() {
        let p = ParameterSet::default();
        assert_eq!(p.sample_min(), -512);
        assert_eq!(p.sample_max(), 511);
        assert_eq!(p.sample_mid(), 0);
        assert_eq!(p.weight_min(), -64);
        assert_eq!(p.weight_max(), 63);
    }

    #[test]
    fn test_accumulator_constant_adjustment() {
        let mut p = ParameterSet::default();
        assert_eq!(p.accum_init_k(), 0);

        // kappa' > 30 - D folds into 2*kappa' + D - 30.
        p.dynamic_range = 30;
        p.accum_init_constant = 8;
        assert_eq!(p.accum_init_k(), 2 * 8 + 30 - 30);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let cases: Vec<(&str, ParameterSet)> = vec![
            (
                "dynamic_range",
                ParameterSet {
                    dynamic_range: 33,
                    ..Default::default()
                },
            ),
            (
                "weight_resolution",
                ParameterSet {
                    weight_resolution: 3,
                    ..Default::default()
                },
            ),
            (
                "damping",
                ParameterSet {
                    representative_resolution: 0,
                    damping: 1,
                    ..Default::default()
                },
            ),
            (
                "register_size",
                ParameterSet {
                    register_size: 31,
                    ..Default::default()
                },
            ),
            (
                "t_inc",
                ParameterSet {
                    t_inc: 24,
                    ..Default::default()
                },
            ),
            (
                "v ordering",
                ParameterSet {
                    v_min: 5,
                    v_max: 5,
                    ..Default::default()
                },
            ),
            (
                "rescale vs initial count",
                ParameterSet {
                    initial_count_exp: 6,
                    rescale_count_exp: 5,
                    ..Default::default()
                },
            ),
            (
                "output_word_size",
                ParameterSet {
                    output_word_size: 9,
                    ..Default::default()
                },
            ),
        ];

        for (name, params) in cases {
            assert!(
                matches!(
                    params.validate(),
                    Err(HyperspecError::ParameterOutOfRange(_))
                ),
                "expected {} to be rejected",
                name
            );
        }
    }

    #[test]
    fn test_register_size_floor_tracks_dynamic_range() {
        let p = ParameterSet {
            dynamic_range: 32,
            weight_resolution: 19,
            accum_init_constant: 0,
            ..Default::default()
        };
        assert_eq!(p.min_register_size(), 52);
    }

    #[test]
    fn test_toml_round_trip() {
        let p = ParameterSet::near_lossless(12, 3);
        let text = toml::to_string(&p).unwrap();
        let back: ParameterSet = toml::from_str(&text).unwrap();
        assert_eq!(p, back);
    }
}
