#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Contiguity neighbour graphs and spatial weight matrices.
//!
//! [`Adjacency`] derives a neighbour relation from a
//! [`BoundarySet`](crime_lisa_spatial::BoundarySet) under a rook or queen
//! rule, optionally lifted to a higher order. [`SpatialWeights`] turns the
//! relation into binary or row-standardized weights and exposes the sums
//! the autocorrelation statistics need.

mod adjacency;
mod matrix;

pub use adjacency::{Adjacency, build_adjacency};
pub use crime_lisa_weights_models::{
    ConnectivitySummary, Contiguity, IslandPolicy, NeighborList, WeightStyle,
};
pub use matrix::SpatialWeights;

/// Errors that can occur while building neighbour graphs or weights.
#[derive(Debug, thiserror::Error)]
pub enum WeightsError {
    /// Inputs disagree in length or identity.
    #[error("Input mismatch: {message}")]
    InputMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// The input admits no defined result (for example an island under
    /// row-standardization).
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
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crime_lisa_geography_models::Crs;
    use crime_lisa_spatial::{BoundarySet, SpatialUnit};
    use geo::{MultiPolygon, polygon};

    pub fn cell(id: &str, col: f64, row: f64) -> SpatialUnit {
        SpatialUnit {
            id: id.to_string(),
            name: None,
            geometry: MultiPolygon(vec![polygon![
                (x: col, y: row),
                (x: col + 1.0, y: row),
                (x: col + 1.0, y: row + 1.0),
                (x: col, y: row + 1.0),
                (x: col, y: row),
            ]]),
        }
    }

    /// Row-major 2x2 grid: A B on top, C D below.
    pub fn grid_2x2() -> BoundarySet {
        BoundarySet::new(
            vec![
                cell("A", 0.0, 1.0),
                cell("B", 1.0, 1.0),
                cell("C", 0.0, 0.0),
                cell("D", 1.0, 0.0),
            ],
            Crs::WGS84,
        )
        .unwrap()
    }

    /// Row-major 3x3 grid of unit squares, ids `r{row}c{col}`.
    pub fn grid_3x3() -> BoundarySet {
        let mut units = Vec::new();
        for row in 0..3_i32 {
            for col in 0..3_i32 {
                units.push(cell(
                    &format!("r{row}c{col}"),
                    f64::from(col),
                    f64::from(2 - row),
                ));
            }
        }
        BoundarySet::new(units, Crs::WGS84).unwrap()
    }

    /// Four squares in a row, `S0`..`S3` from west to east.
    pub fn strip_1x4() -> BoundarySet {
        BoundarySet::new(
            (0..4_i32)
                .map(|i| cell(&format!("S{i}"), f64::from(i), 0.0))
                .collect(),
            Crs::WGS84,
        )
        .unwrap()
    }
}
