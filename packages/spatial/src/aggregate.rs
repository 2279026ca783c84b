//! Point-in-polygon aggregation of incidents into per-unit counts.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use crime_lisa_geography_models::{Crs, Incident, IncidentSet, UnitCount};

use crate::{BoundarySet, SpatialError};

/// Result of attributing an incident set to a boundary set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentCounts {
    /// Incident count per unit, in boundary order.
    pub counts: Vec<u64>,
    /// Incidents that fell outside every unit.
    pub unmatched: u64,
    /// Incidents skipped by the category filter.
    pub filtered_out: u64,
    /// Incidents with non-finite coordinates.
    pub invalid_location: u64,
}

impl IncidentCounts {
    /// Total number of incidents attributed to some unit.
    #[must_use]
    pub fn matched(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Counts as `f64` values, ready for the statistics engine.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn values(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    /// Pairs each count with its unit identifier and name.
    #[must_use]
    pub fn unit_counts(&self, boundaries: &BoundarySet) -> Vec<UnitCount> {
        boundaries
            .units()
            .iter()
            .zip(&self.counts)
            .map(|(unit, &count)| UnitCount {
                unit_id: unit.id.clone(),
                unit_name: unit.name.clone(),
                count,
            })
            .collect()
    }
}

/// Counts incidents per boundary unit.
///
/// `categories` restricts the count to incidents whose category matches one
/// of the given labels (case-insensitive); an empty slice counts everything.
/// Incidents outside every polygon are tallied in
/// [`IncidentCounts::unmatched`] rather than treated as errors.
///
/// # Errors
///
/// Returns [`SpatialError::InputMismatch`] if the incidents and boundaries
/// declare different reference systems.
pub fn count_incidents(
    boundaries: &BoundarySet,
    incidents: &IncidentSet,
    categories: &[String],
) -> Result<IncidentCounts, SpatialError> {
    if incidents.crs != boundaries.crs() {
        return Err(SpatialError::InputMismatch {
            message: format!(
                "incidents are in {} but boundaries are in {}; reproject before aggregating",
                incidents.crs,
                boundaries.crs()
            ),
        });
    }

    let wanted: BTreeSet<String> = categories
        .iter()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect();

    let mut result = IncidentCounts {
        counts: vec![0; boundaries.len()],
        unmatched: 0,
        filtered_out: 0,
        invalid_location: 0,
    };

    for incident in &incidents.incidents {
        if !wanted.is_empty() && !matches_category(incident, &wanted) {
            result.filtered_out += 1;
            continue;
        }

        if !incident.has_valid_location() {
            result.invalid_location += 1;
            continue;
        }

        match boundaries.lookup_unit(incident.longitude, incident.latitude) {
            Some(idx) => result.counts[idx] += 1,
            None => {
                log::trace!(
                    "Incident {:?} at ({}, {}) is outside every unit",
                    incident.id,
                    incident.longitude,
                    incident.latitude
                );
                result.unmatched += 1;
            }
        }
    }

    log::info!(
        "Attributed {} of {} incidents to {} units ({} outside, {} filtered, {} without location)",
        result.matched(),
        incidents.len(),
        boundaries.len(),
        result.unmatched,
        result.filtered_out,
        result.invalid_location
    );

    if result.unmatched > 0 {
        log::warn!(
            "{} incidents fell outside every boundary unit",
            result.unmatched
        );
    }

    Ok(result)
}

fn matches_category(incident: &Incident, wanted: &BTreeSet<String>) -> bool {
    incident
        .category
        .as_deref()
        .is_some_and(|c| wanted.contains(&c.trim().to_uppercase()))
}

/// Reads incidents from CSV.
///
/// The header must contain `longitude` and `latitude`; `category` and `id`
/// are optional. Malformed rows are skipped and logged at trace level; the
/// number skipped is logged once at the end.
///
/// # Errors
///
/// Returns [`SpatialError::Csv`] if the header cannot be read.
pub fn read_incidents_csv(reader: impl Read, crs: Crs) -> Result<IncidentSet, SpatialError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;

    let mut incidents = Vec::new();
    let mut skipped = 0u64;

    for result in csv_reader.deserialize::<Incident>() {
        match result {
            Ok(incident) => incidents.push(incident),
            Err(e) => {
                log::trace!("  skipping malformed row: {e}");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed incident rows");
    }
    log::info!("Read {} incidents ({crs})", incidents.len());

    Ok(IncidentSet::new(crs, incidents))
}

/// Reads incidents from a CSV file.
///
/// # Errors
///
/// Returns [`SpatialError::Io`] if the file cannot be opened, otherwise any
/// error from [`read_incidents_csv`].
pub fn read_incidents_path(path: &Path, crs: Crs) -> Result<IncidentSet, SpatialError> {
    let file = std::fs::File::open(path).map_err(|e| SpatialError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    read_incidents_csv(std::io::BufReader::new(file), crs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::tests::grid_2x2;

    fn incident(lng: f64, lat: f64, category: &str) -> Incident {
        Incident {
            id: None,
            longitude: lng,
            latitude: lat,
            category: Some(category.to_string()),
        }
    }

    #[test]
    fn counts_points_per_unit() {
        let set = grid_2x2();
        let incidents = IncidentSet::new(
            Crs::WGS84,
            vec![
                incident(0.5, 1.5, "THEFT"),
                incident(0.2, 1.8, "THEFT"),
                incident(1.5, 0.5, "BURGLARY"),
                incident(9.0, 9.0, "THEFT"),
            ],
        );

        let counts = count_incidents(&set, &incidents, &[]).unwrap();
        assert_eq!(counts.counts, vec![2, 0, 0, 1]);
        assert_eq!(counts.unmatched, 1);
        assert_eq!(counts.matched(), 3);
        assert_eq!(counts.values(), vec![2.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn category_filter_is_case_insensitive() {
        let set = grid_2x2();
        let incidents = IncidentSet::new(
            Crs::WGS84,
            vec![
                incident(0.5, 1.5, "Theft"),
                incident(1.5, 0.5, "BURGLARY"),
            ],
        );

        let counts = count_incidents(&set, &incidents, &["theft".to_string()]).unwrap();
        assert_eq!(counts.counts, vec![1, 0, 0, 0]);
        assert_eq!(counts.filtered_out, 1);
    }

    #[test]
    fn crs_mismatch_is_fatal() {
        let set = grid_2x2();
        let incidents = IncidentSet::new(Crs(3857), vec![incident(0.5, 0.5, "THEFT")]);
        let err = count_incidents(&set, &incidents, &[]).unwrap_err();
        assert!(matches!(err, SpatialError::InputMismatch { .. }));
    }

    #[test]
    fn unit_counts_carry_ids() {
        let set = grid_2x2();
        let incidents = IncidentSet::new(Crs::WGS84, vec![incident(1.5, 1.5, "THEFT")]);
        let counts = count_incidents(&set, &incidents, &[]).unwrap();
        let rows = counts.unit_counts(&set);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].unit_id, "B");
        assert_eq!(rows[1].count, 1);
    }

    #[test]
    fn reads_csv_and_skips_malformed_rows() {
        let csv = "id,longitude,latitude,category\n\
                   1,0.5,1.5,THEFT\n\
                   2,not-a-number,1.5,THEFT\n\
                   3,1.5,0.5,\n";
        let set = read_incidents_csv(csv.as_bytes(), Crs::WGS84).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.incidents[0].id.as_deref(), Some("1"));
        assert_eq!(set.incidents[0].category.as_deref(), Some("THEFT"));
        assert_eq!(set.incidents[1].category, None);
    }
}
