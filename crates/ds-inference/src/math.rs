//! Small numerically-stable helpers for the logistic model.

/// Stable `log(1 + exp(x))`.
///
/// Uses `log(1+exp(x)) = max(x, 0) + log(1 + exp(-|x|))`; the exponential
/// argument is never positive, so nothing overflows.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    x.max(0.0) + e.ln_1p()
}

/// Stable sigmoid `1 / (1 + exp(-x))`.
///
/// Evaluates a single `exp(-|x|)` and flips for negative inputs, so large
/// magnitudes saturate cleanly at 0 or 1 instead of overflowing.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    let recip = 1.0 / (1.0 + e);
    if x >= 0.0 {
        recip
    } else {
        e * recip
    }
}
