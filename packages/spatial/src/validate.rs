//! Topology checks for boundary polygons.
//!
//! Contiguity is decided from boundary intersections, so a malformed ring
//! (collapsed or crossing itself) would silently produce wrong neighbours. Every polygon is checked once when a [`BoundarySet`] is
//! built.
//!
//! [`BoundarySet`]: crate::BoundarySet

use geo::{Area, MultiPolygon, Validation};

/// Checks a unit's geometry, returning a description of the first problem
/// found.
///
/// Ring structure (too few points, non-finite coordinates, self-crossings,
/// holes outside their shell, overlapping parts) is checked with geo's
/// [`Validation`]; empty and zero-area geometries are rejected here.
///
/// # Errors
///
/// Returns the reason the geometry is invalid.
pub fn check_multipolygon(geometry: &MultiPolygon<f64>) -> Result<(), String> {
    if geometry.0.is_empty() {
        return Err("geometry has no polygons".to_string());
    }

    geometry.check_validation().map_err(|e| e.to_string())?;

    for (p, polygon) in geometry.0.iter().enumerate() {
        if polygon.unsigned_area() == 0.0 {
            return Err(format!("polygon {p} has zero area"));
        }
    }

    Ok(())
}
