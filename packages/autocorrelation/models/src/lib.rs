#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for global and local spatial autocorrelation.
//!
//! Everything here is plain data: the statistics engine fills these in and
//! the CLI writes them out as JSON, CSV, or `GeoJSON` properties.

use crime_lisa_weights_models::{Contiguity, WeightStyle};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

// ── Enums ────────────────────────────────────────────────────────

/// LISA cluster classification of a unit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ClusterLabel {
    /// High value surrounded by high values (hot spot).
    HighHigh,
    /// Low value surrounded by low values (cold spot).
    LowLow,
    /// High value surrounded by low values (spatial outlier).
    HighLow,
    /// Low value surrounded by high values (spatial outlier).
    LowHigh,
    /// Local statistic not significant at the chosen level.
    NonSignificant,
}

impl ClusterLabel {
    /// Returns `true` for the four significant labels.
    #[must_use]
    pub const fn is_significant(self) -> bool {
        !matches!(self, Self::NonSignificant)
    }
}

/// Moran scatterplot quadrant, independent of significance.
///
/// Numbered counter-clockwise from the upper right, matching the usual
/// LISA quadrant codes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Quadrant {
    /// Value above the mean, lag above the mean.
    HighHigh = 1,
    /// Value at or below the mean, lag above the mean.
    LowHigh = 2,
    /// Value and lag at or below the mean.
    LowLow = 3,
    /// Value above the mean, lag at or below the mean.
    HighLow = 4,
}

impl Quadrant {
    /// Numeric quadrant code (1-4).
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Which tail of the reference distribution counts as "at least as
/// extreme" in a permutation test.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Alternative {
    /// Simulated values at or above the observed value.
    Greater,
    /// Simulated values at or below the observed value.
    Less,
    /// Simulated values at least as far from the expectation as the
    /// observed value, in either direction.
    TwoSided,
    /// The smaller of the upper-tail and lower-tail counts.
    #[default]
    Folded,
}

/// Source of the p-value used to classify local statistics.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Inference {
    /// Two-sided normal p-value from the randomization moments.
    Analytic,
    /// Pseudo p-value from conditional permutation.
    #[default]
    Permutation,
}

// ── Global statistics ────────────────────────────────────────────

/// Global Moran's I with its analytic moments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMoran {
    /// Number of units.
    pub n: usize,
    /// Observed Moran's I.
    pub i: f64,
    /// Expected I under no autocorrelation, `-1 / (n - 1)`.
    pub expected_i: f64,
    /// Sum of all weights.
    pub s0: f64,
    /// Variance under the normality assumption.
    pub variance_normality: f64,
    /// z-score under normality.
    pub z_normality: f64,
    /// Two-sided p-value under normality.
    pub p_normality: f64,
    /// Variance under randomization (requires `n > 3`).
    pub variance_randomization: Option<f64>,
    /// z-score under randomization.
    pub z_randomization: Option<f64>,
    /// Two-sided p-value under randomization.
    pub p_randomization: Option<f64>,
}

/// Outcome of a permutation test on global Moran's I.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermutationTest {
    /// Observed I.
    pub observed: f64,
    /// Number of permutations drawn.
    pub permutations: u64,
    /// Seed the permutations were drawn from.
    pub seed: u64,
    /// Tail used for the pseudo p-value.
    pub alternative: Alternative,
    /// Mean of the simulated statistics.
    pub reference_mean: f64,
    /// Population variance of the simulated statistics.
    pub reference_variance: f64,
    /// Observed I standardized by the reference distribution; `None` if the
    /// reference distribution has zero variance.
    pub z_sim: Option<f64>,
    /// One-tailed normal p-value of `z_sim`.
    pub p_z_sim: Option<f64>,
    /// Pseudo p-value `(count + 1) / (permutations + 1)`.
    pub p_value: f64,
}

// ── Local statistics ─────────────────────────────────────────────

/// Conditional permutation summary for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSimulation {
    /// Mean of the simulated local statistics.
    pub reference_mean: f64,
    /// Population variance of the simulated local statistics.
    pub reference_variance: f64,
    /// Observed statistic standardized by the reference distribution.
    pub z_sim: Option<f64>,
    /// One-tailed normal p-value of `z_sim`.
    pub p_z_sim: Option<f64>,
    /// Folded pseudo p-value.
    pub p_sim: f64,
}

/// Local Moran statistic for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStatistic {
    /// Unit index in boundary order.
    pub index: usize,
    /// Local Moran's I.
    pub i: f64,
    /// Expected value under randomization.
    pub expected_i: f64,
    /// Variance under randomization.
    pub variance_i: f64,
    /// Analytic z-score; `None` when `variance_i` is not positive.
    pub z_score: Option<f64>,
    /// Two-sided analytic p-value; `None` when `variance_i` is not positive.
    pub p_value: Option<f64>,
    /// Deviation from the mean in standard-deviation units.
    pub value_std: f64,
    /// Spatial lag of the standardized values.
    pub lag_std: f64,
    /// Moran scatterplot quadrant.
    pub quadrant: Quadrant,
    /// Permutation summary, when a permutation test was run.
    pub simulation: Option<LocalSimulation>,
}

impl LocalStatistic {
    /// p-value selected by the given inference method.
    ///
    /// Falls back to the analytic p-value when no simulation was run.
    #[must_use]
    pub fn p_for(&self, inference: Inference) -> Option<f64> {
        match (inference, &self.simulation) {
            (Inference::Permutation, Some(sim)) => Some(sim.p_sim),
            _ => self.p_value,
        }
    }
}

/// Local Moran statistics for all units with neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMoran {
    /// Number of units, including isolated ones.
    pub n: usize,
    /// One entry per non-isolated unit, in boundary order.
    pub statistics: Vec<LocalStatistic>,
    /// Indices of units with no neighbours.
    pub isolated: Vec<usize>,
    /// Permutations per unit, if a permutation test was run.
    pub permutations: Option<u64>,
    /// Seed of the permutation test.
    pub seed: Option<u64>,
}

impl LocalMoran {
    /// Statistic for a unit index, if the unit is not isolated.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LocalStatistic> {
        self.statistics
            .binary_search_by_key(&index, |s| s.index)
            .ok()
            .map(|pos| &self.statistics[pos])
    }

    /// Sum of all local statistics.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.statistics.iter().map(|s| s.i).sum()
    }
}

// ── Reports ──────────────────────────────────────────────────────

/// How the weights behind a report were built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightsDescription {
    /// Contiguity rule.
    pub contiguity: Contiguity,
    /// Neighbour order.
    pub order: usize,
    /// Weighting style.
    pub style: WeightStyle,
}

/// Contents of the global statistic JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalReport {
    /// Analysed variable.
    pub variable: String,
    /// Weights used.
    pub weights: WeightsDescription,
    /// Analytic statistic.
    pub moran: GlobalMoran,
    /// Permutation test, if one was run.
    pub permutation: Option<PermutationTest>,
    /// Identifiers of units without neighbours.
    pub isolated: Vec<String>,
}

/// One row of the per-unit LISA table.
///
/// Statistic columns are empty for isolated units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LisaRow {
    /// Unit identifier.
    pub unit_id: String,
    /// Analysed value.
    pub value: f64,
    /// Local Moran's I.
    pub local_i: Option<f64>,
    /// Analytic z-score.
    pub z_score: Option<f64>,
    /// p-value used for classification.
    pub p_value: Option<f64>,
    /// Standardized value.
    pub value_std: Option<f64>,
    /// Standardized spatial lag.
    pub lag_std: Option<f64>,
    /// Quadrant code (1-4).
    pub quadrant: Option<u8>,
    /// Cluster classification.
    pub cluster: Option<ClusterLabel>,
}
