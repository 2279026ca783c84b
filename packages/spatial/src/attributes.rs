//! Attribute tables keyed by unit identifier.
//!
//! An external table (population, rates, precomputed counts) is joined onto
//! the boundary order by identifier. The join is exact: every unit needs
//! exactly one row and every row needs a unit, otherwise there is no
//! deterministic row-to-unit mapping and the analysis cannot proceed.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::{BoundarySet, SpatialError};

/// Maximum number of identifiers listed in a mismatch message.
const MAX_LISTED_IDS: usize = 5;

/// Numeric attribute values keyed by unit identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTable {
    values: BTreeMap<String, f64>,
}

impl AttributeTable {
    /// Builds a table from `(id, value)` pairs.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::InputMismatch`] on a duplicate identifier
    /// * [`SpatialError::Parse`] on a non-finite value
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (String, f64)>,
    ) -> Result<Self, SpatialError> {
        let mut values = BTreeMap::new();

        for (id, value) in pairs {
            if !value.is_finite() {
                return Err(SpatialError::Parse {
                    message: format!("value for unit '{id}' is not finite ({value})"),
                });
            }
            if values.insert(id.clone(), value).is_some() {
                return Err(SpatialError::InputMismatch {
                    message: format!("attribute table lists unit '{id}' more than once"),
                });
            }
        }

        Ok(Self { values })
    }

    /// Reads a table from CSV, using the named identifier and value columns.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::Csv`] if the CSV is malformed
    /// * [`SpatialError::Parse`] if a column is missing or a value is not a
    ///   finite number
    /// * [`SpatialError::InputMismatch`] on a duplicate identifier
    pub fn from_csv(
        reader: impl Read,
        id_column: &str,
        value_column: &str,
    ) -> Result<Self, SpatialError> {
        let mut csv_reader = csv::ReaderBuilder::new().from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| SpatialError::Parse {
                    message: format!("attribute table has no '{name}' column"),
                })
        };
        let id_idx = column(id_column)?;
        let value_idx = column(value_column)?;

        let mut pairs = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let id = record.get(id_idx).map(str::trim).unwrap_or_default();
            let raw = record.get(value_idx).map(str::trim).unwrap_or_default();

            if id.is_empty() {
                return Err(SpatialError::Parse {
                    message: format!("row {} has an empty '{id_column}'", row + 1),
                });
            }

            let value: f64 = raw.parse().map_err(|_| SpatialError::Parse {
                message: format!(
                    "row {} ({id}): '{raw}' in '{value_column}' is not a number",
                    row + 1
                ),
            })?;

            pairs.push((id.to_string(), value));
        }

        let table = Self::from_pairs(pairs)?;
        log::info!("Read {} attribute rows ('{value_column}')", table.len());
        Ok(table)
    }

    /// Reads a table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Io`] if the file cannot be opened, otherwise
    /// any error from [`AttributeTable::from_csv`].
    pub fn from_csv_path(
        path: &Path,
        id_column: &str,
        value_column: &str,
    ) -> Result<Self, SpatialError> {
        let file = std::fs::File::open(path).map_err(|e| SpatialError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_csv(std::io::BufReader::new(file), id_column, value_column)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for a unit identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<f64> {
        self.values.get(id).copied()
    }

    /// Returns the values in boundary order.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InputMismatch`] if the row count differs from
    /// the unit count or the identifier sets differ. The message lists the
    /// first few missing and unexpected identifiers.
    pub fn align(&self, boundaries: &BoundarySet) -> Result<Vec<f64>, SpatialError> {
        let missing: Vec<&str> = boundaries
            .ids()
            .filter(|id| !self.values.contains_key(*id))
            .collect();
        let unexpected: Vec<&str> = self
            .values
            .keys()
            .map(String::as_str)
            .filter(|id| boundaries.index_of(id).is_none())
            .collect();

        if self.values.len() != boundaries.len() || !missing.is_empty() || !unexpected.is_empty() {
            return Err(SpatialError::InputMismatch {
                message: format!(
                    "attribute table has {} rows for {} units; missing: [{}]; unexpected: [{}]",
                    self.values.len(),
                    boundaries.len(),
                    list_ids(&missing),
                    list_ids(&unexpected)
                ),
            });
        }

        Ok(boundaries
            .ids()
            .filter_map(|id| self.values.get(id).copied())
            .collect())
    }
}

fn list_ids(ids: &[&str]) -> String {
    let mut listed = ids
        .iter()
        .take(MAX_LISTED_IDS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if ids.len() > MAX_LISTED_IDS {
        listed.push_str(&format!(", ... {} more", ids.len() - MAX_LISTED_IDS));
    }
    listed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::tests::grid_2x2;

    #[test]
    fn aligns_to_boundary_order() {
        let csv = "geoid,count\nD,4\nB,2\nA,1\nC,3\n";
        let table = AttributeTable::from_csv(csv.as_bytes(), "geoid", "count").unwrap();
        let values = table.align(&grid_2x2()).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn missing_unit_is_a_mismatch() {
        let csv = "geoid,count\nA,1\nB,2\nC,3\n";
        let table = AttributeTable::from_csv(csv.as_bytes(), "geoid", "count").unwrap();
        let err = table.align(&grid_2x2()).unwrap_err();
        match err {
            SpatialError::InputMismatch { message } => {
                assert!(message.contains("missing: [D]"), "message: {message}");
            }
            other => panic!("expected InputMismatch, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_unit_is_a_mismatch() {
        let csv = "geoid,count\nA,1\nB,2\nC,3\nE,5\n";
        let table = AttributeTable::from_csv(csv.as_bytes(), "geoid", "count").unwrap();
        let err = table.align(&grid_2x2()).unwrap_err();
        match err {
            SpatialError::InputMismatch { message } => {
                assert!(message.contains("unexpected: [E]"), "message: {message}");
                assert!(message.contains("missing: [D]"), "message: {message}");
            }
            other => panic!("expected InputMismatch, got {other:?}"),
        }
    }

    #[test]
    fn extra_row_count_is_a_mismatch() {
        let csv = "geoid,count\nA,1\nB,2\nC,3\nD,4\nE,5\n";
        let table = AttributeTable::from_csv(csv.as_bytes(), "geoid", "count").unwrap();
        assert!(matches!(
            table.align(&grid_2x2()),
            Err(SpatialError::InputMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let csv = "geoid,count\nA,1\nA,2\n";
        let err = AttributeTable::from_csv(csv.as_bytes(), "geoid", "count").unwrap_err();
        assert!(matches!(err, SpatialError::InputMismatch { .. }));
    }

    #[test]
    fn missing_column_is_a_parse_error() {
        let csv = "geoid,total\nA,1\n";
        let err = AttributeTable::from_csv(csv.as_bytes(), "geoid", "count").unwrap_err();
        assert!(matches!(err, SpatialError::Parse { .. }));
    }

    #[test]
    fn non_numeric_value_is_a_parse_error() {
        let csv = "geoid,count\nA,many\n";
        let err = AttributeTable::from_csv(csv.as_bytes(), "geoid", "count").unwrap_err();
        assert!(matches!(err, SpatialError::Parse { .. }));
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let err = AttributeTable::from_pairs([("A".to_string(), f64::INFINITY)]).unwrap_err();
        assert!(matches!(err, SpatialError::Parse { .. }));
    }
}
