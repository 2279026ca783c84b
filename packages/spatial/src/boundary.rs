//! In-memory boundary set with an R-tree over unit bounding boxes.
//!
//! A [`BoundarySet`] fixes the unit order for the whole analysis: unit
//! index `i` in every count vector, adjacency list, and statistic refers to
//! `units()[i]`.

use std::collections::BTreeMap;

use crime_lisa_geography_models::Crs;
use geo::{BoundingRect, Intersects, MultiPolygon, Point, Relate};
use geojson::{Feature, GeoJson};
use rstar::{AABB, RTree, RTreeObject};

use crate::SpatialError;
use crate::validate::check_multipolygon;

/// One administrative polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialUnit {
    /// Unique identifier (GEOID, beat number, neighborhood code).
    pub id: String,
    /// Human-readable name, if the source has one.
    pub name: Option<String>,
    /// Boundary geometry.
    pub geometry: MultiPolygon<f64>,
}

/// A unit's bounding box stored in the R-tree, keyed by unit index.
#[derive(Debug, Clone)]
struct UnitEnvelope {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for UnitEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// An ordered, validated collection of spatial units.
#[derive(Debug)]
pub struct BoundarySet {
    units: Vec<SpatialUnit>,
    index: BTreeMap<String, usize>,
    rtree: RTree<UnitEnvelope>,
    crs: Crs,
}

impl BoundarySet {
    /// Builds a boundary set, validating every geometry.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::InvalidGeometry`] if any polygon has invalid
    ///   topology, or two units overlap in area
    /// * [`SpatialError::InputMismatch`] if two units share an identifier
    pub fn new(units: Vec<SpatialUnit>, crs: Crs) -> Result<Self, SpatialError> {
        let mut index = BTreeMap::new();

        for (i, unit) in units.iter().enumerate() {
            check_multipolygon(&unit.geometry).map_err(|reason| {
                SpatialError::InvalidGeometry {
                    unit_id: unit.id.clone(),
                    reason,
                }
            })?;

            if index.insert(unit.id.clone(), i).is_some() {
                return Err(SpatialError::InputMismatch {
                    message: format!("duplicate unit identifier '{}'", unit.id),
                });
            }
        }

        let rtree = RTree::bulk_load(
            units
                .iter()
                .enumerate()
                .map(|(idx, unit)| UnitEnvelope {
                    idx,
                    envelope: compute_envelope(&unit.geometry),
                })
                .collect(),
        );

        log::debug!("Indexed {} boundary units ({crs})", units.len());

        let set = Self {
            units,
            index,
            rtree,
            crs,
        };
        set.check_no_overlaps()?;
        Ok(set)
    }

    /// Fails if any two units share interior area. Units that only touch
    /// along edges or at vertices are fine.
    fn check_no_overlaps(&self) -> Result<(), SpatialError> {
        for i in 0..self.units.len() {
            for j in self.candidate_neighbors(i) {
                if j <= i {
                    continue;
                }

                let matrix = self.units[i].geometry.relate(&self.units[j].geometry);
                if matrix.is_intersects() && !matrix.is_touches() {
                    return Err(SpatialError::InvalidGeometry {
                        unit_id: self.units[i].id.clone(),
                        reason: format!("overlaps unit '{}'", self.units[j].id),
                    });
                }
            }
        }
        Ok(())
    }

    /// Parses a `GeoJSON` `FeatureCollection` into a boundary set.
    ///
    /// `id_property` names the feature property holding the unit identifier
    /// (string or number). `name_property`, if given, names an optional
    /// display-name property. Features keep their file order.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::GeoJson`] if the text is not valid `GeoJSON`
    /// * [`SpatialError::Parse`] if the document is not a feature collection,
    ///   or a feature lacks an identifier or an areal geometry
    /// * any error from [`BoundarySet::new`]
    pub fn from_geojson_str(
        geojson_str: &str,
        id_property: &str,
        name_property: Option<&str>,
        crs: Crs,
    ) -> Result<Self, SpatialError> {
        let geojson: GeoJson = geojson_str.parse()?;

        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(SpatialError::Parse {
                message: "boundary file must be a GeoJSON FeatureCollection".to_string(),
            });
        };

        let units = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| feature_to_unit(i, feature, id_property, name_property))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!("Loaded {} boundary features", units.len());

        Self::new(units, crs)
    }

    /// Reads and parses a `GeoJSON` boundary file.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Io`] if the file cannot be read, otherwise
    /// any error from [`BoundarySet::from_geojson_str`].
    pub fn from_geojson_path(
        path: &std::path::Path,
        id_property: &str,
        name_property: Option<&str>,
        crs: Crs,
    ) -> Result<Self, SpatialError> {
        let text = std::fs::read_to_string(path).map_err(|e| SpatialError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_geojson_str(&text, id_property, name_property, crs)
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the set has no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Reference system the boundaries are expressed in.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// The units, in index order.
    #[must_use]
    pub fn units(&self) -> &[SpatialUnit] {
        &self.units
    }

    /// The unit at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    #[must_use]
    pub fn unit(&self, idx: usize) -> &SpatialUnit {
        &self.units[idx]
    }

    /// Unit identifiers, in index order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.units.iter().map(|unit| unit.id.as_str())
    }

    /// Index of the unit with the given identifier.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Indices of units whose bounding box intersects `idx`'s bounding box,
    /// excluding `idx` itself.
    pub fn candidate_neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let envelope = compute_envelope(&self.units[idx].geometry);
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.idx)
            .filter(move |&j| j != idx)
    }

    /// Looks up the unit containing a point.
    ///
    /// Points on a boundary shared by several units go to the unit with the
    /// lowest index, so repeated runs attribute them identically.
    #[must_use]
    pub fn lookup_unit(&self, lng: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.rtree
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| entry.idx)
            .filter(|&idx| self.units[idx].geometry.intersects(&point))
            .min()
    }
}

/// Converts one `GeoJSON` feature into a [`SpatialUnit`].
fn feature_to_unit(
    i: usize,
    feature: Feature,
    id_property: &str,
    name_property: Option<&str>,
) -> Result<SpatialUnit, SpatialError> {
    let id = feature
        .property(id_property)
        .and_then(property_to_string)
        .ok_or_else(|| SpatialError::Parse {
            message: format!("feature {i} has no '{id_property}' property"),
        })?;

    let name = name_property
        .and_then(|prop| feature.property(prop))
        .and_then(property_to_string);

    let geometry = feature.geometry.ok_or_else(|| SpatialError::Parse {
        message: format!("feature {i} ({id}) has no geometry"),
    })?;

    let geometry: geo::Geometry<f64> = geometry.try_into()?;

    let geometry = match geometry {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => {
            return Err(SpatialError::Parse {
                message: format!("feature {i} ({id}) is not a Polygon or MultiPolygon"),
            });
        }
    };

    Ok(SpatialUnit { id, name, geometry })
}

/// Reads a string or numeric property as a trimmed, non-empty string.
fn property_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::polygon;

    /// Unit square with its lower-left corner at (`col`, `row`).
    pub(crate) fn cell(id: &str, col: f64, row: f64) -> SpatialUnit {
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

    /// 2x2 grid: A B on the top row, C D on the bottom row.
    pub(crate) fn grid_2x2() -> BoundarySet {
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

    #[test]
    fn indexes_units_in_order() {
        let set = grid_2x2();
        assert_eq!(set.len(), 4);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["A", "B", "C", "D"]);
        assert_eq!(set.index_of("C"), Some(2));
        assert_eq!(set.index_of("Z"), None);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = BoundarySet::new(
            vec![cell("A", 0.0, 0.0), cell("A", 1.0, 0.0)],
            Crs::WGS84,
        )
        .unwrap_err();
        assert!(matches!(err, SpatialError::InputMismatch { .. }));
    }

    #[test]
    fn invalid_geometry_names_the_unit() {
        let bow_tie = SpatialUnit {
            id: "BAD-1".to_string(),
            name: None,
            geometry: MultiPolygon(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 1.0, y: 0.0),
                (x: 0.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ]]),
        };

        let err = BoundarySet::new(vec![cell("A", 5.0, 5.0), bow_tie], Crs::WGS84).unwrap_err();
        match err {
            SpatialError::InvalidGeometry { unit_id, .. } => assert_eq!(unit_id, "BAD-1"),
            other => panic!("expected InvalidGeometry, got {other:?}"),
        }
    }

    #[test]
    fn rejects_overlapping_units() {
        let shifted = SpatialUnit {
            id: "B".to_string(),
            name: None,
            geometry: MultiPolygon(vec![polygon![
                (x: 0.5, y: 0.0),
                (x: 1.5, y: 0.0),
                (x: 1.5, y: 1.0),
                (x: 0.5, y: 1.0),
                (x: 0.5, y: 0.0),
            ]]),
        };

        let err = BoundarySet::new(vec![cell("A", 0.0, 0.0), shifted], Crs::WGS84).unwrap_err();
        match err {
            SpatialError::InvalidGeometry { unit_id, reason } => {
                assert_eq!(unit_id, "A");
                assert!(reason.contains("'B'"), "reason: {reason}");
            }
            other => panic!("expected InvalidGeometry, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicated_polygon() {
        let err = BoundarySet::new(vec![cell("A", 0.0, 0.0), cell("B", 0.0, 0.0)], Crs::WGS84)
            .unwrap_err();
        assert!(matches!(err, SpatialError::InvalidGeometry { .. }));
    }

    #[test]
    fn lookup_finds_containing_unit() {
        let set = grid_2x2();
        assert_eq!(set.lookup_unit(0.5, 1.5), Some(0));
        assert_eq!(set.lookup_unit(1.5, 0.5), Some(3));
        assert_eq!(set.lookup_unit(5.0, 5.0), None);
    }

    #[test]
    fn lookup_on_shared_edge_prefers_lowest_index() {
        let set = grid_2x2();
        // On the A|B edge.
        assert_eq!(set.lookup_unit(1.0, 1.5), Some(0));
        // The centre vertex touches all four cells.
        assert_eq!(set.lookup_unit(1.0, 1.0), Some(0));
    }

    #[test]
    fn candidate_neighbors_exclude_self() {
        let set = grid_2x2();
        let mut candidates: Vec<usize> = set.candidate_neighbors(0).collect();
        candidates.sort_unstable();
        assert_eq!(candidates, vec![1, 2, 3]);
    }

    #[test]
    fn parses_feature_collection() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "GEOID": "11001000100", "NAME": "Tract 1" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "GEOID": 11001000200 },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [[[[1,0],[2,0],[2,1],[1,1],[1,0]]]]
                    }
                }
            ]
        }"#;

        let set = BoundarySet::from_geojson_str(json, "GEOID", Some("NAME"), Crs::WGS84).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.unit(0).id, "11001000100");
        assert_eq!(set.unit(0).name.as_deref(), Some("Tract 1"));
        assert_eq!(set.unit(1).id, "11001000200");
        assert_eq!(set.unit(1).name, None);
    }

    #[test]
    fn feature_without_id_is_an_error() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "NAME": "No id" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]
                    }
                }
            ]
        }"#;

        let err = BoundarySet::from_geojson_str(json, "GEOID", None, Crs::WGS84).unwrap_err();
        assert!(matches!(err, SpatialError::Parse { .. }));
    }

    #[test]
    fn point_feature_is_rejected() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "GEOID": "1" },
                    "geometry": { "type": "Point", "coordinates": [0, 0] }
                }
            ]
        }"#;

        let err = BoundarySet::from_geojson_str(json, "GEOID", None, Crs::WGS84).unwrap_err();
        assert!(matches!(err, SpatialError::Parse { .. }));
    }
}
