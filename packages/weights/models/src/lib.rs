#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Contiguity rules, weighting styles, and neighbour list types.
//!
//! These enums are parsed from configuration files and command-line flags,
//! so each accepts a kebab-case spelling plus a few short aliases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Rule deciding whether two polygons are neighbours.
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
pub enum Contiguity {
    /// Neighbours share an edge of positive length.
    Rook,
    /// Neighbours share an edge or a single vertex. Every rook pair is also
    /// a queen pair.
    #[default]
    Queen,
}

/// How adjacency is turned into weights.
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
pub enum WeightStyle {
    /// `w(i, j) = 1` for neighbours, `0` otherwise.
    #[strum(to_string = "binary", serialize = "b")]
    Binary,
    /// `w(i, j) = 1 / deg(i)` for neighbours, so every row sums to one.
    #[default]
    #[strum(to_string = "row-standardized", serialize = "row", serialize = "r")]
    RowStandardized,
}

/// What to do with units that have no neighbours when a weighting style
/// cannot define their row.
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
pub enum IslandPolicy {
    /// Fail with a degenerate-input error naming the islands.
    #[default]
    Reject,
    /// Keep the islands but mark their rows undefined; lag-dependent
    /// statistics skip them and report them.
    Exclude,
}

/// Neighbour relation keyed by unit identifier.
///
/// Serializes as a JSON object mapping each unit identifier to the sorted
/// identifiers of its neighbours. Islands map to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeighborList(pub BTreeMap<String, Vec<String>>);

impl NeighborList {
    /// Neighbours of a unit, if the unit is known.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&[String]> {
        self.0.get(id).map(Vec::as_slice)
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list has no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Degree statistics of an adjacency relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivitySummary {
    /// Number of units.
    pub units: usize,
    /// Number of directed neighbour links (twice the number of pairs for a
    /// symmetric relation).
    pub links: usize,
    /// Smallest neighbour count.
    pub min_degree: usize,
    /// Largest neighbour count.
    pub max_degree: usize,
    /// Average neighbour count.
    pub mean_degree: f64,
    /// Identifiers of units without neighbours.
    pub islands: Vec<String>,
}
