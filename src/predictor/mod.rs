//! Adaptive linear predictor shared by compression and decompression.
//!
//! Both directions drive the same state machine: local sums and local
//! differences are computed from *sample representatives* (reconstructed
//! values, so encoder and decoder cannot drift), a per-band weight vector
//! adapts after every pixel, and all arithmetic is integer-exact with
//! floor semantics. The caller supplies the direction-specific half: the
//! compressor quantizes true residuals, the decompressor folds decoded
//! residuals back in. Either way, [`Predictor::commit`] advances the
//! state identically on both sides.

mod window;

pub use window::BandWindow;

use crate::params::ParameterSet;

/// Per-pixel prediction outputs.
///
/// `high_res` is only meaningful for t > 0; the first pixel of a band is
/// predicted from the previous band (or mid-range) directly at double
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    /// Neighborhood local sum (0 for the first pixel of a band).
    pub local_sum: i64,
    /// High-resolution predicted sample value.
    pub high_res: i64,
    /// Double-resolution predicted sample value.
    pub double_res: i64,
    /// Predicted sample value.
    pub predicted: i64,
}

/// Predictor state for one image: retention window, weight vector, and
/// the scratch local-difference vector.
///
/// The state is owned by exactly one pipeline direction at a time and is
/// advanced strictly in band-sequential order.
pub struct Predictor<'p> {
    params: &'p ParameterSet,
    rows: usize,
    cols: usize,
    band: usize,
    window: BandWindow,
    weights: Vec<i64>,
    diffs: Vec<i64>,
}

impl<'p> Predictor<'p> {
    /// Create predictor state for an image of the given spatial size.
    pub fn new(params: &'p ParameterSet, rows: usize, cols: usize) -> Self {
        let depth = params.prediction_bands as usize;
        let capacity = 3 + depth;
        Self {
            params,
            rows,
            cols,
            band: 0,
            window: BandWindow::new(rows, cols, depth),
            weights: Vec::with_capacity(capacity),
            diffs: Vec::with_capacity(capacity),
        }
    }

    /// Rows per band.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Columns per row.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of central (spectral) entries for the current band.
    #[inline]
    fn central_count(&self) -> usize {
        (self.params.prediction_bands as usize).min(self.band)
    }

    /// Reset per-band state at the first pixel of band `z`: directional
    /// weights to zero, central weights to the default ladder.
    pub fn begin_band(&mut self, z: usize) {
        self.band = z;
        self.weights.clear();
        self.weights.extend_from_slice(&[0, 0, 0]);

        let central = self.central_count();
        if central >= 1 {
            let mut w = (7 * (1i64 << self.params.weight_resolution)) / 8;
            self.weights.push(w);
            for _ in 2..=central {
                w = w.div_euclid(8);
                self.weights.push(w);
            }
        }
    }

    /// Retire the current band's plane into the retention window.
    pub fn end_band(&mut self) {
        self.window.finish_band();
    }

    /// Wide neighbor-oriented local sum at (y, x), t > 0.
    fn local_sum(&self, y: usize, x: usize) -> i64 {
        let w = &self.window;
        if y == 0 {
            4 * w.current(0, x - 1)
        } else if x == 0 {
            // Single-column images fall back to the north neighbour twice.
            let east = if self.cols > 1 { 1 } else { 0 };
            2 * (w.current(y - 1, 0) + w.current(y - 1, east))
        } else if x == self.cols - 1 {
            w.current(y, x - 1) + w.current(y - 1, x - 1) + 2 * w.current(y - 1, x)
        } else {
            w.current(y, x - 1)
                + w.current(y - 1, x - 1)
                + w.current(y - 1, x)
                + w.current(y - 1, x + 1)
        }
    }

    /// Rebuild the local-difference vector for (y, x), t > 0. Ordering
    /// matches the weight vector: north, west, northwest, then one
    /// central difference per previous band.
    fn build_diffs(&mut self, y: usize, x: usize, sigma: i64) {
        self.diffs.clear();
        if y == 0 {
            self.diffs.extend_from_slice(&[0, 0, 0]);
        } else if x == 0 {
            let north = 4 * self.window.current(y - 1, x) - sigma;
            self.diffs.extend_from_slice(&[north, north, north]);
        } else {
            let north = 4 * self.window.current(y - 1, x) - sigma;
            let west = 4 * self.window.current(y, x - 1) - sigma;
            let northwest = 4 * self.window.current(y - 1, x - 1) - sigma;
            self.diffs.extend_from_slice(&[north, west, northwest]);
        }
        for back in 1..=self.central_count() {
            self.diffs.push(4 * self.window.prior(back, y, x) - sigma);
        }
    }

    /// Compute the prediction for pixel (y, x) of the current band.
    pub fn predict(&mut self, y: usize, x: usize) -> Prediction {
        let p = self.params;
        let t = y * self.cols + x;

        if t == 0 {
            let double_res = if self.band == 0 || p.prediction_bands == 0 {
                2 * p.sample_mid()
            } else {
                2 * self.window.prior(1, y, x)
            };
            return Prediction {
                local_sum: 0,
                high_res: 0,
                double_res,
                predicted: double_res >> 1,
            };
        }

        let sigma = self.local_sum(y, x);
        self.build_diffs(y, x, sigma);

        let omega = p.weight_resolution;
        let inner: i128 = self
            .weights
            .iter()
            .zip(&self.diffs)
            .map(|(&w, &u)| i128::from(w) * i128::from(u))
            .sum();

        // Signed modular reduction into the R-bit register before the
        // additive constants are applied.
        let base = inner + (i128::from(sigma - 4 * p.sample_mid()) << omega);
        let span = 1i128 << p.register_size;
        let half = 1i128 << (p.register_size - 1);
        let reduced = (base + half).rem_euclid(span) - half;

        let pre_clip =
            reduced + (i128::from(p.sample_mid()) << (omega + 2)) + (1i128 << (omega + 1));
        let lo = i128::from(p.sample_min()) << (omega + 2);
        let hi = (i128::from(p.sample_max()) << (omega + 2)) + (1i128 << (omega + 1));
        let high_res = pre_clip.clamp(lo, hi) as i64;

        let double_res = high_res >> (omega + 1);
        Prediction {
            local_sum: sigma,
            high_res,
            double_res,
            predicted: double_res >> 1,
        }
    }

    /// Quantize a residual. The first pixel of every band bypasses
    /// quantization so it is always coded exactly.
    pub fn quantize(&self, delta: i64, t: usize) -> i64 {
        let m = self.residual_bound(t);
        let sign = if delta < 0 { -1 } else { 1 };
        sign * ((delta.abs() + m) / (2 * m + 1))
    }

    /// Effective per-sample error bound at traversal index `t`.
    #[inline]
    pub fn residual_bound(&self, t: usize) -> i64 {
        if t == 0 {
            0
        } else {
            i64::from(self.params.max_error)
        }
    }

    /// Reconstructed sample value implied by a quantized residual,
    /// clipped to the dynamic range.
    pub fn clipped_reconstruction(&self, pred: &Prediction, q: i64, t: usize) -> i64 {
        let m = self.residual_bound(t);
        let p = self.params;
        (pred.predicted + q * (2 * m + 1)).clamp(p.sample_min(), p.sample_max())
    }

    /// Sample representative for the committed pixel.
    ///
    /// With zero damping and offset this is exactly the clipped
    /// reconstruction; the general form blends in the high-resolution
    /// prediction.
    fn representative(&self, pred: &Prediction, q: i64, reconstructed: i64, t: usize) -> i64 {
        let p = self.params;
        if t == 0 || (p.damping == 0 && p.offset == 0) {
            return reconstructed;
        }

        let omega = p.weight_resolution;
        let theta = p.representative_resolution;
        let phi = i64::from(p.damping);
        let psi = i64::from(p.offset);
        let m = self.residual_bound(t);

        let scaled = (reconstructed << omega) - q.signum() * m * psi * (1i64 << (omega - theta));
        let numerator =
            4 * ((1i64 << theta) - phi) * scaled + phi * pred.high_res - phi * (1i64 << (omega + 1));
        let double_res_rep = numerator.div_euclid(1i64 << (omega + theta + 1));
        (double_res_rep + 1).div_euclid(2)
    }

    /// Fold pixel (y, x)'s quantized residual back into the predictor
    /// state: store its sample representative and adapt the weights.
    /// Returns the clipped reconstruction, which is the decompressor's
    /// output value.
    pub fn commit(&mut self, y: usize, x: usize, pred: &Prediction, q: i64) -> i64 {
        let t = y * self.cols + x;
        let reconstructed = self.clipped_reconstruction(pred, q, t);
        let rep = self.representative(pred, q, reconstructed, t);
        self.window.set_current(y, x, rep);
        if t >= 1 {
            self.update_weights(pred, reconstructed, t);
        }
        reconstructed
    }

    /// Adapt the weight vector from the double-resolution prediction
    /// error, t >= 1.
    fn update_weights(&mut self, pred: &Prediction, reconstructed: i64, t: usize) {
        let p = self.params;
        // sign(0) is +1 here, otherwise weights stop tracking constant
        // residuals.
        let err = 2 * reconstructed - pred.double_res;
        let sign: i128 = if err >= 0 { 1 } else { -1 };

        let ticks = (t as i64 - self.cols as i64).div_euclid(i64::from(p.t_inc));
        let rho = (i64::from(p.v_min) + ticks).clamp(i64::from(p.v_min), i64::from(p.v_max))
            + i64::from(p.dynamic_range)
            - i64::from(p.weight_resolution);

        let (w_min, w_max) = (i128::from(p.weight_min()), i128::from(p.weight_max()));
        for i in 0..self.weights.len() {
            let chi = if i < 3 {
                i64::from(p.intra_offset)
            } else {
                i64::from(p.inter_offset)
            };
            // The arithmetic shift applies to the signed product, so the
            // whole increment is a single floor of the rational value.
            let scaled = shift_pow2(sign * i128::from(self.diffs[i]), -(rho + chi));
            let increment = (scaled + 1) >> 1;
            let next = (i128::from(self.weights[i]) + increment).clamp(w_min, w_max);
            self.weights[i] = next as i64;
        }
    }

    /// Current weight vector (directional entries first).
    pub fn weights(&self) -> &[i64] {
        &self.weights
    }
}

/// Multiply by 2^exp with floor semantics for negative exponents.
#[inline]
fn shift_pow2(value: i128, exp: i64) -> i128 {
    if exp >= 0 {
        value << exp
    } else {
        value >> (-exp).min(127)
    }
}
