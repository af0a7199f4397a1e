//! Residual mapping and sample-adaptive entropy coding.
//!
//! Quantized residuals are signed; the mapper folds them into
//! non-negative integers using the prediction context, and the entropy
//! coder emits one Golomb power-of-two codeword per mapped residual. The
//! code parameter is driven by per-band running statistics ([`SampleStats`])
//! that the decoder reproduces exactly, so both sides always agree on the
//! codeword split.

use crate::bitio::{BitSink, BitSource};
use crate::error::Result;
use crate::params::ParameterSet;
use crate::predictor::Prediction;

/// Folding limit theta and which side of the dynamic range is nearer.
///
/// When the quantized residual magnitude exceeds theta, only one sign is
/// reachable within the dynamic range, which is what lets the unmapper
/// recover the sign without an extra bit.
fn fold_limit(predicted: i64, bound: i64, params: &ParameterSet) -> (i64, bool) {
    let width = 2 * bound + 1;
    let low = (predicted - params.sample_min() + bound).div_euclid(width);
    let high = (params.sample_max() - predicted + bound).div_euclid(width);
    (low.min(high), low <= high)
}

/// Map a signed quantized residual to its non-negative code value.
pub fn map_residual(pred: &Prediction, q: i64, bound: i64, params: &ParameterSet) -> u64 {
    let (theta, _) = fold_limit(pred.predicted, bound, params);
    let magnitude = q.abs();

    let mapped = if magnitude > theta {
        magnitude + theta
    } else {
        // zeta = (-1)^double_res decides which sign maps to even values.
        let oriented = if pred.double_res & 1 == 0 { q } else { -q };
        if oriented >= 0 {
            2 * magnitude
        } else {
            2 * magnitude - 1
        }
    };
    mapped as u64
}

/// Invert [`map_residual`] using the same prediction context.
pub fn unmap_residual(pred: &Prediction, mapped: u64, bound: i64, params: &ParameterSet) -> i64 {
    let (theta, low_side) = fold_limit(pred.predicted, bound, params);
    let mapped = mapped as i64;

    if mapped > 2 * theta {
        if low_side {
            mapped - theta
        } else {
            theta - mapped
        }
    } else {
        let zeta = if pred.double_res & 1 == 0 { 1 } else { -1 };
        if mapped % 2 == 0 {
            zeta * (mapped / 2)
        } else {
            -zeta * ((mapped + 1) / 2)
        }
    }
}

/// Per-band entropy-coder statistics: the counter and accumulator that
/// select the Golomb code parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleStats {
    counter: u64,
    accumulator: u64,
    rescale_limit: u64,
}

impl SampleStats {
    /// Statistics at the first pixel of a band.
    pub fn for_band(params: &ParameterSet) -> Self {
        let counter = 1u64 << params.initial_count_exp;
        let k = params.accum_init_k();
        let accumulator = ((3 * (1u64 << (k + 6)) - 49) * counter) >> 7;
        Self {
            counter,
            accumulator,
            rescale_limit: (1u64 << params.rescale_count_exp) - 1,
        }
    }

    /// Select the code parameter k for the next codeword.
    pub fn code_param(&self, params: &ParameterSet) -> u32 {
        let threshold = self.accumulator + ((49 * self.counter) >> 7);
        if 2 * self.counter > threshold {
            return 0;
        }
        for k in (1..=params.dynamic_range).rev() {
            if self.counter << k <= threshold {
                return k;
            }
        }
        // 2*counter <= threshold, so k = 1 always qualifies.
        1
    }

    /// Fold one mapped residual into the statistics, halving both when
    /// the counter reaches the rescaling threshold.
    pub fn update(&mut self, mapped: u64) {
        if self.counter < self.rescale_limit {
            self.accumulator += mapped;
            self.counter += 1;
        } else if self.counter == self.rescale_limit {
            self.accumulator = (self.accumulator + mapped + 1) / 2;
            self.counter = (self.counter + 1) / 2;
        }
    }

    /// Current counter value.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Current accumulator value.
    pub fn accumulator(&self) -> u64 {
        self.accumulator
    }
}

/// Emit the D-bit literal for the first pixel of a band.
pub fn encode_first(sink: &mut BitSink, mapped: u64, params: &ParameterSet) -> Result<()> {
    sink.push_bits(mapped, params.dynamic_range)
}

/// Read the D-bit literal for the first pixel of a band.
pub fn decode_first(source: &mut BitSource<'_>, params: &ParameterSet) -> Result<u64> {
    source.read_bits(params.dynamic_range)
}

/// Emit one Golomb power-of-two codeword (t >= 1).
///
/// A quotient below the unary limit is sent as unary-plus-remainder;
/// anything longer escapes to the limit followed by the raw D-bit value.
pub fn encode_residual(
    sink: &mut BitSink,
    mapped: u64,
    k: u32,
    params: &ParameterSet,
) -> Result<()> {
    let quotient = mapped >> k;
    if quotient < u64::from(params.unary_limit) {
        sink.push_run(true, quotient as u32)?;
        sink.push_bit(false)?;
        if k > 0 {
            sink.push_bits(mapped & ((1u64 << k) - 1), k)?;
        }
    } else {
        sink.push_run(true, params.unary_limit)?;
        sink.push_bit(false)?;
        sink.push_bits(mapped, params.dynamic_range)?;
    }
    Ok(())
}

/// Parse one Golomb power-of-two codeword (t >= 1).
pub fn decode_residual(source: &mut BitSource<'_>, k: u32, params: &ParameterSet) -> Result<u64> {
    let quotient = source.read_unary(params.unary_limit)?;
    if quotient == params.unary_limit {
        source.read_bits(params.dynamic_range)
    } else if k > 0 {
        let remainder = source.read_bits(k)?;
        Ok((u64::from(quotient) << k) | remainder)
    } else {
        Ok(u64::from(quotient))
    }
}
