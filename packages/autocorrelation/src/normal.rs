//! Standard normal tail probabilities.

use statrs::distribution::{ContinuousCDF, Normal};

/// Standard normal cumulative distribution function.
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

/// Two-sided p-value of a standard normal score, `2 * (1 - Φ(|z|))`.
#[must_use]
pub fn two_sided_p(z: f64) -> f64 {
    (2.0 * Normal::standard().sf(z.abs())).clamp(0.0, 1.0)
}

/// Upper-tail probability of `|z|`, `1 - Φ(|z|)`.
#[must_use]
pub fn upper_tail_p(z: f64) -> f64 {
    Normal::standard().sf(z.abs()).clamp(0.0, 1.0)
}
