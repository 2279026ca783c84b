//! Permutation inference for global Moran's I.
//!
//! Values are shuffled across units while the weights stay fixed; the
//! observed statistic is compared against the resulting reference
//! distribution.

use crime_lisa_weights::SpatialWeights;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::deviations::{Deviations, cross_product};
use crate::global::moran_i;
use crate::normal::upper_tail_p;
use crate::progress::{NullProgress, ProgressCallback};
use crate::{Alternative, AutocorrelationError, PermutationTest};

/// Stream constant mixed into the seed of the global test.
const GLOBAL_STREAM: u64 = 0x6D6F_7261_6E5F_4931;

/// Trials between progress updates.
const PROGRESS_STRIDE: u64 = 64;

/// Options for [`moran_permutation_test_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationOptions {
    /// Number of random permutations; must be positive.
    pub permutations: u64,
    /// Seed of the random stream.
    pub seed: u64,
    /// Tail used for the pseudo p-value.
    pub alternative: Alternative,
}

/// Permutation test of global Moran's I with the folded alternative.
///
/// # Errors
///
/// See [`moran_permutation_test_with`].
pub fn moran_permutation_test(
    values: &[f64],
    weights: &SpatialWeights,
    permutations: u64,
    seed: u64,
) -> Result<PermutationTest, AutocorrelationError> {
    moran_permutation_test_with(
        values,
        weights,
        &PermutationOptions {
            permutations,
            seed,
            alternative: Alternative::default(),
        },
        &NullProgress,
    )
}

/// Permutation test of global Moran's I.
///
/// A single generator seeded from `options.seed` shuffles the centered
/// values once per trial, so the same seed and inputs reproduce the same
/// reference distribution. The pseudo p-value is
/// `(count + 1) / (permutations + 1)` where `count` is the number of trials
/// at least as extreme as the observed statistic under
/// `options.alternative`.
///
/// # Errors
///
/// * [`AutocorrelationError::InvalidParameter`] if `permutations` is zero
/// * any error from [`global_moran`](crate::global_moran)'s input checks
pub fn moran_permutation_test_with(
    values: &[f64],
    weights: &SpatialWeights,
    options: &PermutationOptions,
    progress: &dyn ProgressCallback,
) -> Result<PermutationTest, AutocorrelationError> {
    if options.permutations == 0 {
        return Err(AutocorrelationError::InvalidParameter {
            message: "number of permutations must be positive".to_string(),
        });
    }

    let dev = Deviations::new(values, weights, 2)?;
    let s0 = weights.s0();
    if s0 <= 0.0 {
        return Err(AutocorrelationError::DegenerateInput {
            message: "no unit has a neighbour (S0 = 0); Moran's I is undefined".to_string(),
        });
    }

    let observed = moran_i(&dev, weights, s0);
    let expected = -1.0 / (dev.n() - 1.0);
    let scale = dev.n() / s0 / dev.sum_sq;

    let mut rng = StdRng::seed_from_u64(options.seed ^ GLOBAL_STREAM);
    let mut shuffled = dev.z.clone();
    let mut simulated = Vec::with_capacity(usize::try_from(options.permutations).unwrap_or(0));

    progress.set_total(options.permutations);
    for trial in 1..=options.permutations {
        shuffled.shuffle(&mut rng);
        simulated.push(scale * cross_product(&shuffled, weights));
        if trial % PROGRESS_STRIDE == 0 {
            progress.inc(PROGRESS_STRIDE);
        }
    }
    progress.inc(options.permutations % PROGRESS_STRIDE);

    let summary = ReferenceSummary::new(observed, &simulated);
    let count = extreme_count(observed, expected, &simulated, options.alternative);
    #[allow(clippy::cast_precision_loss)]
    let p_value = (count + 1) as f64 / (options.permutations + 1) as f64;

    progress.finish(format!("I = {observed:.4}, pseudo p = {p_value:.4}"));
    log::info!(
        "Permutation test: I = {observed:.6}, {} permutations, {} p = {p_value:.4}",
        options.permutations,
        options.alternative
    );

    Ok(PermutationTest {
        observed,
        permutations: options.permutations,
        seed: options.seed,
        alternative: options.alternative,
        reference_mean: summary.mean,
        reference_variance: summary.variance,
        z_sim: summary.z,
        p_z_sim: summary.z.map(upper_tail_p),
        p_value,
    })
}

/// Mean, population variance, and standardized observation of a simulated
/// reference distribution.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReferenceSummary {
    pub mean: f64,
    pub variance: f64,
    pub z: Option<f64>,
}

impl ReferenceSummary {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(observed: f64, simulated: &[f64]) -> Self {
        let count = simulated.len() as f64;
        let mean = simulated.iter().sum::<f64>() / count;
        let variance = simulated.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count;
        let z = (variance > 0.0).then(|| (observed - mean) / variance.sqrt());
        Self { mean, variance, z }
    }
}

/// Number of simulated statistics at least as extreme as `observed`.
pub(crate) fn extreme_count(
    observed: f64,
    expected: f64,
    simulated: &[f64],
    alternative: Alternative,
) -> u64 {
    let count = |pred: &dyn Fn(f64) -> bool| -> u64 {
        simulated.iter().filter(|&&s| pred(s)).count() as u64
    };

    match alternative {
        Alternative::Greater => count(&|s| s >= observed),
        Alternative::Less => count(&|s| s <= observed),
        Alternative::TwoSided => {
            let distance = (observed - expected).abs();
            count(&|s| (s - expected).abs() >= distance)
        }
        Alternative::Folded => count(&|s| s >= observed).min(count(&|s| s <= observed)),
    }
}

/// Seed of an independent random stream derived from a user seed.
///
/// SplitMix64 finalizer over the seed, stream constant, and index, so
/// neighbouring indices get unrelated streams.
pub(crate) const fn stream_seed(seed: u64, stream: u64, index: u64) -> u64 {
    let mut x = (seed ^ stream).wrapping_add(index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{clustered_5x5, rook_grid};
    use crate::global_moran;
    use crime_lisa_weights_models::WeightStyle;

    #[test]
    fn same_seed_is_bit_identical() {
        let w = rook_grid(5, 5, WeightStyle::RowStandardized);
        let values = clustered_5x5();

        let a = moran_permutation_test(&values, &w, 199, 42).unwrap();
        let b = moran_permutation_test(&values, &w, 199, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.reference_mean.to_bits(), b.reference_mean.to_bits());
    }

    #[test]
    fn different_seed_changes_reference() {
        let w = rook_grid(5, 5, WeightStyle::RowStandardized);
        let values = clustered_5x5();

        let a = moran_permutation_test(&values, &w, 99, 1).unwrap();
        let b = moran_permutation_test(&values, &w, 99, 2).unwrap();
        assert!(
            (a.reference_mean - b.reference_mean).abs() > 0.0,
            "different seeds should give different reference distributions"
        );
    }

    #[test]
    fn observed_matches_analytic_statistic() {
        let w = rook_grid(5, 5, WeightStyle::RowStandardized);
        let values = clustered_5x5();

        let analytic = global_moran(&values, &w).unwrap();
        let test = moran_permutation_test(&values, &w, 49, 7).unwrap();
        assert!((analytic.i - test.observed).abs() < 1e-12);
    }

    #[test]
    fn clustered_grid_is_significant() {
        let w = rook_grid(5, 5, WeightStyle::RowStandardized);
        let test = moran_permutation_test(&clustered_5x5(), &w, 999, 12345).unwrap();

        assert!(test.p_value <= 0.002, "p = {}", test.p_value);
        assert!(test.p_value >= 1.0 / 1000.0, "p can never be below 1/(n+1)");
        assert!(test.z_sim.unwrap() > 3.0);
        assert!(test.reference_mean.abs() < 0.1);
    }

    #[test]
    fn zero_permutations_is_invalid() {
        let w = rook_grid(2, 2, WeightStyle::Binary);
        assert!(matches!(
            moran_permutation_test(&[1.0, 2.0, 3.0, 4.0], &w, 0, 1),
            Err(AutocorrelationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn constant_values_are_degenerate() {
        let w = rook_grid(2, 2, WeightStyle::Binary);
        assert!(matches!(
            moran_permutation_test(&[3.0; 4], &w, 9, 1),
            Err(AutocorrelationError::DegenerateInput { .. })
        ));
    }

    #[test]
    fn extreme_counts_per_alternative() {
        let sims = [-0.4, -0.2, 0.0, 0.1, 0.3, 0.5];
        assert_eq!(extreme_count(0.3, 0.0, &sims, Alternative::Greater), 2);
        assert_eq!(extreme_count(0.3, 0.0, &sims, Alternative::Less), 5);
        assert_eq!(extreme_count(0.3, 0.0, &sims, Alternative::TwoSided), 3);
        assert_eq!(extreme_count(0.3, 0.0, &sims, Alternative::Folded), 2);
        assert_eq!(extreme_count(-0.3, 0.0, &sims, Alternative::Folded), 1);
    }

    #[test]
    fn folded_count_keeps_ties_with_observed() {
        let sims = [-1.0, -1.0, 0.0, 0.0];
        assert_eq!(extreme_count(-1.0, -1.0 / 3.0, &sims, Alternative::Folded), 2);
        assert_eq!(extreme_count(0.0, -1.0 / 3.0, &sims, Alternative::Folded), 2);
    }

    #[test]
    fn checkerboard_p_value_counts_tied_arrangements() {
        // Two of the six arrangements of [10, 10, 1, 1] are checkerboards
        // with I = -1, so about a third of the trials tie with the observed.
        let w = rook_grid(2, 2, WeightStyle::RowStandardized);
        let test = moran_permutation_test(&[10.0, 1.0, 1.0, 10.0], &w, 999, 12345).unwrap();

        assert!((test.observed + 1.0).abs() < 1e-12);
        assert!(test.p_value > 0.25 && test.p_value < 0.42, "p = {}", test.p_value);
    }

    #[test]
    fn stream_seeds_differ_by_index() {
        let a = stream_seed(42, GLOBAL_STREAM, 0);
        let b = stream_seed(42, GLOBAL_STREAM, 1);
        assert_ne!(a, b);
        assert_eq!(a, stream_seed(42, GLOBAL_STREAM, 0));
    }
}
