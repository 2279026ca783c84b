#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate reference, incident, and per-unit count types.
//!
//! These types describe the inputs of an analysis run (incident points and
//! the reference system they are expressed in) and the per-unit counts the
//! aggregation step produces. They carry no geometry so they can be shared
//! with writers and renderers without pulling in the geometry stack.

use serde::{Deserialize, Serialize};

/// A coordinate reference system, identified by its EPSG code.
///
/// The analysis never reprojects; it only checks that every input declares
/// the same reference before combining them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(pub u32);

impl Crs {
    /// WGS 84 longitude/latitude, the `GeoJSON` (RFC 7946) default.
    pub const WGS84: Self = Self(4326);

    /// NAD83 longitude/latitude, used by Census `TIGER` boundaries.
    pub const NAD83: Self = Self(4269);

    /// Returns the EPSG code.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        self.0
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// A single crime incident as read from a CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Source-specific incident identifier, if the export has one.
    #[serde(default)]
    pub id: Option<String>,
    /// Longitude (x) in the incident set's reference system.
    pub longitude: f64,
    /// Latitude (y) in the incident set's reference system.
    pub latitude: f64,
    /// Category label (e.g. "BURGLARY", "Theft").
    #[serde(default)]
    pub category: Option<String>,
}

impl Incident {
    /// Returns `true` if both coordinates are finite numbers.
    #[must_use]
    pub const fn has_valid_location(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

/// A set of incidents together with the reference system of their
/// coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentSet {
    /// Reference system the coordinates are expressed in.
    pub crs: Crs,
    /// The incidents, in file order.
    pub incidents: Vec<Incident>,
}

impl IncidentSet {
    /// Creates an incident set.
    #[must_use]
    pub const fn new(crs: Crs, incidents: Vec<Incident>) -> Self {
        Self { crs, incidents }
    }

    /// Number of incidents in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    /// Returns `true` if the set holds no incidents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

/// Incident count for one spatial unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCount {
    /// Unit identifier (GEOID, beat number, neighborhood code).
    pub unit_id: String,
    /// Human-readable unit name, if the boundary file has one.
    pub unit_name: Option<String>,
    /// Number of incidents that fell inside the unit.
    pub count: u64,
}
