//! Burg Linear Predictor
//!
//! Autoregressive prediction from a fixed history window using Burg's
//! method in its fast recursive form: forward and backward residuals are
//! updated in place and the reflection-coefficient denominator is carried
//! from order to order instead of being re-summed, so one prediction costs
//! O(order * history).
//!
//! All arithmetic runs in `f64` regardless of the `f32` storage of samples.

/// Floor applied to the reflection-coefficient denominator
///
/// Silent or constant history drives the residual energy to zero after the
/// first order; flooring keeps the higher reflection coefficients near zero.
pub const DENOMINATOR_FLOOR: f64 = 1e-10;

/// Forward and backward predictions for one history window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Estimate of the sample immediately after the window
    pub forward: f64,
    /// Estimate of the sample immediately before the window
    pub backward: f64,
}

/// Reusable Burg predictor
///
/// Holds the residual and coefficient scratch so that the hot path does not
/// allocate. Each worker thread owns its own instance.
///
/// # Example
/// ```
/// use declick::dsp::BurgPredictor;
///
/// let history = vec![0.25f32; 64];
/// let mut predictor = BurgPredictor::new(4, history.len());
/// let prediction = predictor.predict(&history).unwrap();
/// assert!((prediction.forward - 0.25).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct BurgPredictor {
    order: usize,
    forward: Vec<f64>,
    backward: Vec<f64>,
    coefficients: Vec<f64>,
}

impl BurgPredictor {
    /// Create a predictor of the given order
    ///
    /// `history_length` only sizes the scratch buffers; windows of other
    /// lengths are accepted.
    pub fn new(order: usize, history_length: usize) -> Self {
        Self {
            order,
            forward: Vec::with_capacity(history_length),
            backward: Vec::with_capacity(history_length),
            coefficients: vec![0.0; order + 1],
        }
    }

    /// Predictor order
    pub fn order(&self) -> usize {
        self.order
    }

    /// Prediction polynomial `[1, a1, .., aM]` from the last call
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Fit the window and predict one sample past each end of it
    ///
    /// The forward estimate is `-sum(a[i] * history[len - i])`, the backward
    /// estimate uses the same polynomial mirrored onto the start of the
    /// window. Returns `None` if either estimate is not finite; callers
    /// report that as a numerical failure at their own position.
    pub fn predict(&mut self, history: &[f32]) -> Option<Prediction> {
        let len = history.len();
        debug_assert!(len > self.order, "history shorter than predictor order");

        self.fit(history);

        let a = &self.coefficients;
        let mut forward = 0.0;
        let mut backward = 0.0;
        for i in 1..=self.order {
            forward -= a[i] * history[len - i] as f64;
            backward -= a[i] * history[i - 1] as f64;
        }

        if !forward.is_finite() || !backward.is_finite() {
            return None;
        }

        Some(Prediction { forward, backward })
    }

    /// Run the Burg recursion over `history`, leaving the polynomial in
    /// `self.coefficients`
    fn fit(&mut self, history: &[f32]) {
        let order = self.order;
        let last = history.len() - 1;

        self.forward.clear();
        self.forward.extend(history.iter().map(|&s| s as f64));
        self.backward.clear();
        self.backward.extend_from_slice(&self.forward);

        let f = &mut self.forward;
        let b = &mut self.backward;
        let a = &mut self.coefficients;
        a.clear();
        a.resize(order + 1, 0.0);
        a[0] = 1.0;

        let mut denominator: f64 = f.iter().map(|v| 2.0 * v * v).sum::<f64>();
        denominator -= f[0] * f[0] + b[last] * b[last];

        for k in 0..order {
            let span = last - k;

            let mut numerator = 0.0;
            for n in 0..span {
                numerator += f[n + k + 1] * b[n];
            }
            let mu = -2.0 * numerator / denominator.max(DENOMINATOR_FLOOR);

            // Symmetric in-place polynomial update
            for n in 0..=(k + 1) / 2 {
                let low = a[n] + mu * a[k + 1 - n];
                let high = a[k + 1 - n] + mu * a[n];
                a[n] = low;
                a[k + 1 - n] = high;
            }

            for n in 0..span {
                let fwd = f[n + k + 1] + mu * b[n];
                let bwd = b[n] + mu * f[n + k + 1];
                f[n + k + 1] = fwd;
                b[n] = bwd;
            }

            denominator = (1.0 - mu * mu) * denominator
                - f[k + 1] * f[k + 1]
                - b[last - k - 1] * b[last - k - 1];
        }
    }
}
