#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Global Moran's I and local indicators of spatial association (LISA).
//!
//! Every entry point is a pure function of a value vector (one value per
//! unit, in boundary order), a [`SpatialWeights`] matrix, and, for the
//! permutation tests, an explicit seed. Identical inputs and seed give
//! bit-identical results.
//!
//! [`SpatialWeights`]: crime_lisa_weights::SpatialWeights

mod classify;
mod deviations;
mod global;
mod local;
pub mod normal;
mod permutation;
pub mod progress;

pub use classify::{DEFAULT_ALPHA, classify, classify_all, quadrant};
pub use crime_lisa_autocorrelation_models::{
    Alternative, ClusterLabel, GlobalMoran, Inference, LocalMoran, LocalSimulation,
    LocalStatistic, PermutationTest, Quadrant,
};
pub use global::global_moran;
pub use local::{LocalOptions, local_moran, local_moran_permutation, local_moran_with};
pub use permutation::{PermutationOptions, moran_permutation_test, moran_permutation_test_with};

use crime_lisa_weights::WeightsError;

/// Errors that can occur while computing autocorrelation statistics.
#[derive(Debug, thiserror::Error)]
pub enum AutocorrelationError {
    /// Values and weights disagree, or a value is not finite.
    #[error("Input mismatch: {message}")]
    InputMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// The statistic is undefined for this input (constant values, no
    /// neighbours, too few units).
    #[error("Degenerate input: {message}")]
    DegenerateInput {
        /// Description of the degenerate condition.
        message: String,
    },

    /// A parameter is outside its accepted range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the invalid parameter.
        message: String,
    },

    /// Weight construction or lag computation failed.
    #[error(transparent)]
    Weights(#[from] WeightsError),
}
