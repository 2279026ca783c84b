#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary loading and incident aggregation.
//!
//! Loads administrative polygons (census tracts, neighborhoods, police
//! beats) from `GeoJSON`, validates their topology, builds an R-tree over
//! their bounding boxes, and attributes incident points to the polygon that
//! contains them. Also joins external attribute tables onto the boundary
//! order so every downstream stage works on plain value vectors.

pub mod aggregate;
pub mod attributes;
pub mod boundary;
pub mod validate;

pub use aggregate::{IncidentCounts, count_incidents, read_incidents_csv, read_incidents_path};
pub use attributes::AttributeTable;
pub use boundary::{BoundarySet, SpatialUnit};

use thiserror::Error;

/// Errors that can occur while loading or joining spatial inputs.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Two inputs that must describe the same units (or the same reference
    /// system) disagree.
    #[error("Input mismatch: {message}")]
    InputMismatch {
        /// Description of the disagreement.
        message: String,
    },

    /// A boundary polygon has invalid topology.
    #[error("Invalid geometry for unit {unit_id}: {reason}")]
    InvalidGeometry {
        /// Identifier of the offending unit.
        unit_id: String,
        /// What is wrong with the geometry.
        reason: String,
    },

    /// A feature or row could not be interpreted.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading an input file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
