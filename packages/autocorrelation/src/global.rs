//! Global Moran's I with analytic moments.

use crime_lisa_weights::SpatialWeights;

use crate::deviations::{Deviations, cross_product};
use crate::normal::two_sided_p;
use crate::{AutocorrelationError, GlobalMoran};

/// Computes global Moran's I and its moments under the normality and
/// randomization assumptions.
///
/// `I = (n / S0) · Σᵢ Σⱼ w(i,j) z_i z_j / Σᵢ z_i²` where `z` are deviations
/// from the mean. Undefined weight rows (excluded islands) contribute
/// nothing. The randomization moments need `n > 3`; for smaller inputs
/// those fields are `None`.
///
/// # Errors
///
/// * [`AutocorrelationError::InputMismatch`] if `values` and `weights`
///   differ in length or a value is not finite
/// * [`AutocorrelationError::DegenerateInput`] if there are fewer than two
///   units, all values are equal, no unit has a neighbour, or the variance
///   of I under normality is not positive
pub fn global_moran(
    values: &[f64],
    weights: &SpatialWeights,
) -> Result<GlobalMoran, AutocorrelationError> {
    let dev = Deviations::new(values, weights, 2)?;
    let s0 = weights.s0();
    if s0 <= 0.0 {
        return Err(AutocorrelationError::DegenerateInput {
            message: "no unit has a neighbour (S0 = 0); Moran's I is undefined".to_string(),
        });
    }

    let n = dev.n();
    let i = moran_i(&dev, weights, s0);
    let expected_i = -1.0 / (n - 1.0);

    let s1 = weights.s1();
    let s2 = weights.s2();
    let s0_sq = s0 * s0;
    let n_sq = n * n;

    let variance_normality = (n_sq * s1 - n * s2 + 3.0 * s0_sq) / ((n_sq - 1.0) * s0_sq)
        - expected_i * expected_i;
    if variance_normality <= 0.0 {
        return Err(AutocorrelationError::DegenerateInput {
            message: format!(
                "variance of I under normality is {variance_normality}; z-score is undefined"
            ),
        });
    }
    let z_normality = (i - expected_i) / variance_normality.sqrt();

    let variance_randomization = (dev.len() > 3)
        .then(|| {
            let kurtosis = n * dev.sum_4 / (dev.sum_sq * dev.sum_sq);
            let a = n * ((n_sq - 3.0 * n + 3.0) * s1 - n * s2 + 3.0 * s0_sq);
            let b = kurtosis * ((n_sq - n) * s1 - 2.0 * n * s2 + 6.0 * s0_sq);
            (a - b) / ((n - 1.0) * (n - 2.0) * (n - 3.0) * s0_sq) - expected_i * expected_i
        })
        .filter(|&v| {
            if v > 0.0 {
                true
            } else {
                log::warn!("Variance of I under randomization is {v}; omitting its z-score");
                false
            }
        });
    let z_randomization = variance_randomization.map(|v| (i - expected_i) / v.sqrt());

    log::debug!("Moran's I = {i:.6} (E[I] = {expected_i:.6}, z_norm = {z_normality:.3})");

    Ok(GlobalMoran {
        n: dev.len(),
        i,
        expected_i,
        s0,
        variance_normality,
        z_normality,
        p_normality: two_sided_p(z_normality),
        variance_randomization,
        z_randomization,
        p_randomization: z_randomization.map(two_sided_p),
    })
}

/// Moran's I of already-centered values.
pub(crate) fn moran_i(dev: &Deviations, weights: &SpatialWeights, s0: f64) -> f64 {
    dev.n() / s0 * cross_product(&dev.z, weights) / dev.sum_sq
}
