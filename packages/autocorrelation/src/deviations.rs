//! Mean-centered values shared by the global and local statistics.

use crime_lisa_weights::SpatialWeights;

use crate::AutocorrelationError;

/// Values centered on their mean, with the moment sums the statistics use.
#[derive(Debug, Clone)]
pub struct Deviations {
    /// `x_i - mean`.
    pub z: Vec<f64>,
    /// `Σ z_i²`.
    pub sum_sq: f64,
    /// `Σ z_i⁴`.
    pub sum_4: f64,
}

impl Deviations {
    /// Validates `values` against `weights` and centers them.
    ///
    /// # Errors
    ///
    /// * [`AutocorrelationError::InputMismatch`] if the lengths differ or a
    ///   value is not finite
    /// * [`AutocorrelationError::DegenerateInput`] if there are fewer than
    ///   `min_units` values or all values are identical
    #[allow(clippy::float_cmp)]
    pub fn new(
        values: &[f64],
        weights: &SpatialWeights,
        min_units: usize,
    ) -> Result<Self, AutocorrelationError> {
        if values.len() != weights.len() {
            return Err(AutocorrelationError::InputMismatch {
                message: format!(
                    "{} values supplied for {} weight rows",
                    values.len(),
                    weights.len()
                ),
            });
        }

        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(AutocorrelationError::InputMismatch {
                message: format!("value for unit {i} is not finite ({v})"),
            });
        }

        if values.len() < min_units {
            return Err(AutocorrelationError::DegenerateInput {
                message: format!(
                    "at least {min_units} units are required, got {}",
                    values.len()
                ),
            });
        }

        let first = values[0];
        if values.iter().all(|&v| v == first) {
            return Err(AutocorrelationError::DegenerateInput {
                message: format!("all values equal {first}; the statistic is undefined"),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let z: Vec<f64> = values.iter().map(|v| v - mean).collect();
        let sum_sq: f64 = z.iter().map(|d| d * d).sum();
        let sum_4: f64 = z.iter().map(|d| d.powi(4)).sum();

        if sum_sq <= 0.0 {
            return Err(AutocorrelationError::DegenerateInput {
                message: "values have zero variance; the statistic is undefined".to_string(),
            });
        }

        Ok(Self { z, sum_sq, sum_4 })
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.z.len()
    }

    /// `n` as a float.
    #[allow(clippy::cast_precision_loss)]
    pub fn n(&self) -> f64 {
        self.z.len() as f64
    }
}

/// `Σᵢ Σⱼ w(i,j)·z_i·z_j`, skipping undefined rows.
pub fn cross_product(z: &[f64], weights: &SpatialWeights) -> f64 {
    z.iter()
        .enumerate()
        .map(|(i, zi)| {
            weights
                .row(i)
                .map_or(0.0, |row| zi * row.iter().map(|&(j, w)| w * z[j]).sum::<f64>())
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::rook_grid;
    use crime_lisa_weights_models::WeightStyle;

    #[test]
    fn centers_on_mean() {
        let w = rook_grid(2, 2, WeightStyle::Binary);
        let d = Deviations::new(&[10.0, 10.0, 1.0, 1.0], &w, 2).unwrap();
        assert_eq!(d.z, vec![4.5, 4.5, -4.5, -4.5]);
        assert!((d.sum_sq - 81.0).abs() < 1e-12);
        assert_eq!(d.len(), 4);
    }

    #[test]
    fn constant_values_are_degenerate() {
        let w = rook_grid(2, 2, WeightStyle::Binary);
        assert!(matches!(
            Deviations::new(&[0.1, 0.1, 0.1, 0.1], &w, 2),
            Err(AutocorrelationError::DegenerateInput { .. })
        ));
    }

    #[test]
    fn nan_is_a_mismatch() {
        let w = rook_grid(2, 2, WeightStyle::Binary);
        assert!(matches!(
            Deviations::new(&[1.0, f64::NAN, 2.0, 3.0], &w, 2),
            Err(AutocorrelationError::InputMismatch { .. })
        ));
    }

    #[test]
    fn cross_product_on_2x2() {
        let w = rook_grid(2, 2, WeightStyle::Binary);
        // Horizontal pairs agree (+20.25 each way), vertical pairs disagree.
        let cp = cross_product(&[4.5, 4.5, -4.5, -4.5], &w);
        assert!(cp.abs() < 1e-12);
    }
}
