//! Local Moran's I (LISA) with analytic and conditional permutation
//! inference.

use crime_lisa_weights::SpatialWeights;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

use crate::classify::quadrant;
use crate::deviations::Deviations;
use crate::normal::{two_sided_p, upper_tail_p};
use crate::permutation::{ReferenceSummary, extreme_count, stream_seed};
use crate::progress::{NullProgress, ProgressCallback};
use crate::{
    Alternative, AutocorrelationError, LocalMoran, LocalSimulation, LocalStatistic,
};

/// Variances at or below this multiple of `w_i²` are treated as zero.
const VARIANCE_TOLERANCE: f64 = 1e-12;

/// Stream constant mixed into every per-unit seed.
const LOCAL_STREAM: u64 = 0x6C69_7361_5F75_6E69;

/// Options for [`local_moran_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalOptions {
    /// Conditional permutations per unit; `None` skips the permutation
    /// test.
    pub permutations: Option<u64>,
    /// Seed of the per-unit random streams.
    pub seed: u64,
}

/// Local Moran statistics with analytic inference only.
///
/// # Errors
///
/// See [`local_moran_with`].
pub fn local_moran(
    values: &[f64],
    weights: &SpatialWeights,
) -> Result<LocalMoran, AutocorrelationError> {
    local_moran_with(values, weights, &LocalOptions::default(), &NullProgress)
}

/// Local Moran statistics with a conditional permutation test.
///
/// # Errors
///
/// Returns [`AutocorrelationError::InvalidParameter`] if `permutations` is
/// zero; otherwise see [`local_moran_with`].
pub fn local_moran_permutation(
    values: &[f64],
    weights: &SpatialWeights,
    permutations: u64,
    seed: u64,
) -> Result<LocalMoran, AutocorrelationError> {
    local_moran_with(
        values,
        weights,
        &LocalOptions {
            permutations: Some(permutations),
            seed,
        },
        &NullProgress,
    )
}

/// Computes the local Moran statistic of every unit that has neighbours.
///
/// With `m2 = Σ z² / n`, the statistic of unit `i` is
/// `I_i = (z_i / m2) · Σⱼ w(i,j) z_j`. Its expectation and variance under
/// randomization are
///
/// * `E[I_i] = -w_i / (n - 1)`
/// * `Var[I_i] = w_i(2) (n - b2) / (n - 1)
///   + (w_i² - w_i(2)) (2 b2 - n) / ((n - 1)(n - 2)) - w_i² / (n - 1)²`
///
/// where `w_i` is the row sum, `w_i(2)` the row sum of squares, and
/// `b2 = m4 / m2²`.
///
/// Units without neighbours are listed in [`LocalMoran::isolated`] and get
/// no statistic. A unit whose variance is not positive, such as one that
/// neighbours every other unit over balanced two-valued data, keeps its
/// statistic but has no analytic z-score or p-value.
///
/// When `options.permutations` is set, each unit keeps its own value and
/// draws `deg(i)` neighbour values without replacement from the other
/// `n - 1` units. Every unit has its own generator seeded from
/// `(options.seed, i)`, so results do not depend on the order units are
/// visited in.
///
/// # Errors
///
/// * [`AutocorrelationError::InputMismatch`] if `values` and `weights`
///   differ in length or a value is not finite
/// * [`AutocorrelationError::DegenerateInput`] if there are fewer than three
///   units or all values are equal
/// * [`AutocorrelationError::InvalidParameter`] if `options.permutations`
///   is `Some(0)`
pub fn local_moran_with(
    values: &[f64],
    weights: &SpatialWeights,
    options: &LocalOptions,
    progress: &dyn ProgressCallback,
) -> Result<LocalMoran, AutocorrelationError> {
    if options.permutations == Some(0) {
        return Err(AutocorrelationError::InvalidParameter {
            message: "number of permutations must be positive".to_string(),
        });
    }

    let dev = Deviations::new(values, weights, 3)?;
    let n = dev.n();
    let m2 = dev.sum_sq / n;
    let m4 = dev.sum_4 / n;
    let b2 = m4 / (m2 * m2);
    let sd = m2.sqrt();
    let standardized: Vec<f64> = dev.z.iter().map(|z| z / sd).collect();

    let mut statistics = Vec::with_capacity(dev.len());
    let mut isolated = Vec::new();

    progress.set_total(dev.len() as u64);

    for i in 0..dev.len() {
        let row = match weights.row(i) {
            Some(row) if !row.is_empty() => row,
            _ => {
                isolated.push(i);
                progress.inc(1);
                continue;
            }
        };

        let lag_z: f64 = row.iter().map(|&(j, w)| w * dev.z[j]).sum();
        let local_i = dev.z[i] / m2 * lag_z;

        let w_i = weights.row_sum(i);
        let w_i2 = weights.row_sum_of_squares(i);
        let expected_i = -w_i / (n - 1.0);
        let variance_i = w_i2 * (n - b2) / (n - 1.0)
            + (w_i * w_i - w_i2) * (2.0 * b2 - n) / ((n - 1.0) * (n - 2.0))
            - w_i * w_i / ((n - 1.0) * (n - 1.0));

        let z_score = if variance_i > VARIANCE_TOLERANCE * w_i * w_i {
            Some((local_i - expected_i) / variance_i.sqrt())
        } else {
            log::warn!(
                "Variance of the local statistic of unit {i} is {variance_i}; \
                 analytic z and p are undefined"
            );
            None
        };
        let value_std = standardized[i];
        let lag_std: f64 = row.iter().map(|&(j, w)| w * standardized[j]).sum();

        let simulation = options.permutations.map(|permutations| {
            simulate_unit(i, row, &dev.z, m2, local_i, permutations, options.seed)
        });

        statistics.push(LocalStatistic {
            index: i,
            i: local_i,
            expected_i,
            variance_i,
            z_score,
            p_value: z_score.map(two_sided_p),
            value_std,
            lag_std,
            quadrant: quadrant(value_std, lag_std),
            simulation,
        });
        progress.inc(1);
    }

    progress.finish(format!("{} local statistics", statistics.len()));

    if !isolated.is_empty() {
        log::warn!(
            "{} units have no neighbours and no local statistic",
            isolated.len()
        );
    }
    log::info!(
        "Computed local Moran's I for {} of {} units{}",
        statistics.len(),
        dev.len(),
        options
            .permutations
            .map_or_else(String::new, |p| format!(" ({p} conditional permutations each)"))
    );

    Ok(LocalMoran {
        n: dev.len(),
        statistics,
        isolated,
        permutations: options.permutations,
        seed: options.permutations.map(|_| options.seed),
    })
}

/// Conditional permutation test for unit `i`.
///
/// Draws `row.len()` distinct indices from the `n - 1` other units and
/// pairs them with the row's weights in draw order.
fn simulate_unit(
    i: usize,
    row: &[(usize, f64)],
    z: &[f64],
    m2: f64,
    observed: f64,
    permutations: u64,
    seed: u64,
) -> LocalSimulation {
    let mut rng = StdRng::seed_from_u64(stream_seed(seed, LOCAL_STREAM, i as u64));
    let others = z.len() - 1;
    let scale = z[i] / m2;

    let simulated: Vec<f64> = (0..permutations)
        .map(|_| {
            let lag: f64 = index::sample(&mut rng, others, row.len())
                .iter()
                .zip(row)
                .map(|(draw, &(_, w))| {
                    let j = if draw >= i { draw + 1 } else { draw };
                    w * z[j]
                })
                .sum();
            scale * lag
        })
        .collect();

    let summary = ReferenceSummary::new(observed, &simulated);
    let count = extreme_count(observed, 0.0, &simulated, Alternative::Folded);
    #[allow(clippy::cast_precision_loss)]
    let p_sim = (count + 1) as f64 / (permutations + 1) as f64;

    LocalSimulation {
        reference_mean: summary.mean,
        reference_variance: summary.variance,
        z_sim: summary.z,
        p_z_sim: summary.z.map(upper_tail_p),
        p_sim,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{clustered_5x5, rook_grid};
    use crate::{Inference, Quadrant, global_moran};
    use crime_lisa_weights::{Adjacency, IslandPolicy};
    use crime_lisa_weights_models::WeightStyle;

    const EPS: f64 = 1e-10;

    #[test]
    fn local_statistics_sum_to_s0_times_global() {
        for style in [WeightStyle::Binary, WeightStyle::RowStandardized] {
            let w = rook_grid(5, 5, style);
            let values = clustered_5x5();
            let global = global_moran(&values, &w).unwrap();
            let local = local_moran(&values, &w).unwrap();

            assert!(
                (local.sum() - global.s0 * global.i).abs() < 1e-9,
                "{style}: Σ I_i = {}, S0·I = {}",
                local.sum(),
                global.s0 * global.i
            );
        }
    }

    #[test]
    fn expected_value_under_row_standardization() {
        let w = rook_grid(4, 4, WeightStyle::RowStandardized);
        let values: Vec<f64> = (0..16).map(f64::from).collect();
        let local = local_moran(&values, &w).unwrap();

        for stat in &local.statistics {
            assert!(
                (stat.expected_i + 1.0 / 15.0).abs() < EPS,
                "unit {}: E[I_i] = {}",
                stat.index,
                stat.expected_i
            );
            assert!(stat.variance_i > 0.0);
        }
    }

    #[test]
    fn hot_corner_is_high_high() {
        let w = rook_grid(5, 5, WeightStyle::RowStandardized);
        let local = local_moran(&clustered_5x5(), &w).unwrap();

        let corner = local.get(0).unwrap();
        assert_eq!(corner.quadrant, Quadrant::HighHigh);
        assert!(corner.i > 0.0);
        assert!(corner.value_std > 0.0 && corner.lag_std > 0.0);

        let far = local.get(24).unwrap();
        assert_eq!(far.quadrant, Quadrant::LowLow);
    }

    #[test]
    fn standardized_lag_matches_weights_lag() {
        let w = rook_grid(3, 3, WeightStyle::RowStandardized);
        let values = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0];
        let local = local_moran(&values, &w).unwrap();

        let mean = values.iter().sum::<f64>() / 9.0;
        let sd = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 9.0).sqrt();
        let std: Vec<f64> = values.iter().map(|v| (v - mean) / sd).collect();
        let lag = w.spatial_lag(&std).unwrap();

        for stat in &local.statistics {
            assert!((stat.value_std - std[stat.index]).abs() < EPS);
            assert!((stat.lag_std - lag[stat.index]).abs() < EPS);
        }
    }

    #[test]
    fn isolated_units_are_reported_not_computed() {
        let adj = Adjacency::from_neighbors(vec![vec![1], vec![0, 2], vec![1], vec![]]).unwrap();
        let w = SpatialWeights::with_island_policy(
            &adj,
            WeightStyle::RowStandardized,
            IslandPolicy::Exclude,
        )
        .unwrap();

        let local = local_moran(&[1.0, 5.0, 2.0, 8.0], &w).unwrap();
        assert_eq!(local.isolated, vec![3]);
        assert_eq!(local.statistics.len(), 3);
        assert!(local.get(3).is_none());

        let binary = SpatialWeights::new(&adj, WeightStyle::Binary).unwrap();
        let local = local_moran(&[1.0, 5.0, 2.0, 8.0], &binary).unwrap();
        assert_eq!(local.isolated, vec![3]);
    }

    #[test]
    fn too_few_units_is_degenerate() {
        let adj = Adjacency::from_neighbors(vec![vec![1], vec![0]]).unwrap();
        let w = SpatialWeights::new(&adj, WeightStyle::Binary).unwrap();
        assert!(matches!(
            local_moran(&[1.0, 2.0], &w),
            Err(AutocorrelationError::DegenerateInput { .. })
        ));
    }

    #[test]
    fn permutation_is_reproducible() {
        let w = rook_grid(5, 5, WeightStyle::RowStandardized);
        let values = clustered_5x5();

        let a = local_moran_permutation(&values, &w, 199, 2024).unwrap();
        let b = local_moran_permutation(&values, &w, 199, 2024).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.permutations, Some(199));
        assert_eq!(a.seed, Some(2024));

        for stat in &a.statistics {
            let sim = stat.simulation.as_ref().unwrap();
            assert!(sim.p_sim > 0.0 && sim.p_sim <= 1.0);
        }
    }

    #[test]
    fn permutation_keeps_analytic_fields() {
        let w = rook_grid(5, 5, WeightStyle::RowStandardized);
        let values = clustered_5x5();

        let analytic = local_moran(&values, &w).unwrap();
        let permuted = local_moran_permutation(&values, &w, 49, 3).unwrap();
        for (a, p) in analytic.statistics.iter().zip(&permuted.statistics) {
            assert_eq!(a.i.to_bits(), p.i.to_bits());
            assert_eq!(a.z_score.map(f64::to_bits), p.z_score.map(f64::to_bits));
            assert!(a.simulation.is_none());
        }
    }

    #[test]
    fn hot_corner_is_significant_by_permutation() {
        let w = rook_grid(5, 5, WeightStyle::RowStandardized);
        let local = local_moran_permutation(&clustered_5x5(), &w, 999, 9).unwrap();
        let corner = local.get(0).unwrap().simulation.as_ref().unwrap();
        assert!(corner.p_sim < 0.05, "corner p_sim = {}", corner.p_sim);
    }

    #[test]
    fn hub_with_zero_variance_keeps_its_statistic() {
        // Unit 0 neighbours every other unit; over balanced two-valued data
        // its randomization variance is zero.
        let adj = Adjacency::from_neighbors(vec![
            vec![1, 2, 3, 4, 5],
            vec![0, 2],
            vec![0, 1],
            vec![0, 4],
            vec![0, 3],
            vec![0],
        ])
        .unwrap();
        let w = SpatialWeights::new(&adj, WeightStyle::RowStandardized).unwrap();
        let values = [10.0, 10.0, 10.0, 1.0, 1.0, 1.0];

        let local = local_moran_permutation(&values, &w, 99, 5).unwrap();
        assert_eq!(local.statistics.len(), 6);
        assert!(local.isolated.is_empty());

        let hub = local.get(0).unwrap();
        assert!(hub.variance_i.abs() < 1e-12);
        assert!(hub.z_score.is_none());
        assert!(hub.p_value.is_none());
        assert!(hub.simulation.is_some());
        assert!(hub.p_for(Inference::Analytic).is_none());

        for stat in &local.statistics[1..] {
            assert!(stat.variance_i > 0.3);
            assert!(stat.z_score.is_some());
        }

        let global = global_moran(&values, &w).unwrap();
        assert!((local.sum() - global.s0 * global.i).abs() < 1e-9);
    }

    #[test]
    fn zero_permutations_is_invalid() {
        let w = rook_grid(3, 3, WeightStyle::Binary);
        let values: Vec<f64> = (0..9).map(f64::from).collect();
        assert!(matches!(
            local_moran_permutation(&values, &w, 0, 1),
            Err(AutocorrelationError::InvalidParameter { .. })
        ));
    }
}
