//! Result files: count CSV, neighbour JSON, global JSON, LISA CSV and
//! `GeoJSON`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crime_lisa_autocorrelation::{ClusterLabel, Inference, LocalMoran};
use crime_lisa_autocorrelation_models::{GlobalReport, LisaRow};
use crime_lisa_geography_models::UnitCount;
use crime_lisa_spatial::BoundarySet;
use crime_lisa_weights::NeighborList;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, feature::Id};

/// Builds one LISA row per unit, in boundary order.
///
/// `labels` comes from
/// [`classify_all`](crime_lisa_autocorrelation::classify_all) and has one
/// entry per unit. Isolated units keep their row with empty statistic and
/// label columns.
#[must_use]
pub fn lisa_rows(
    boundaries: &BoundarySet,
    values: &[f64],
    local: &LocalMoran,
    labels: &[Option<ClusterLabel>],
    inference: Inference,
) -> Vec<LisaRow> {
    boundaries
        .units()
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            let stat = local.get(i);
            LisaRow {
                unit_id: unit.id.clone(),
                value: values[i],
                local_i: stat.map(|s| s.i),
                z_score: stat.and_then(|s| s.z_score),
                p_value: stat.and_then(|s| s.p_for(inference)),
                value_std: stat.map(|s| s.value_std),
                lag_std: stat.map(|s| s.lag_std),
                quadrant: stat.map(|s| s.quadrant.code()),
                cluster: labels.get(i).copied().flatten(),
            }
        })
        .collect()
}

/// Writes per-unit incident counts as `unit_id,unit_name,count`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_counts_csv(path: &Path, counts: &[UnitCount]) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["unit_id", "unit_name", "count"])?;
    for row in counts {
        writer.write_record([
            row.unit_id.as_str(),
            row.unit_name.as_deref().unwrap_or_default(),
            &row.count.to_string(),
        ])?;
    }
    writer.flush()?;
    log::info!("Wrote {} unit counts to {}", counts.len(), path.display());
    Ok(())
}

/// Writes the neighbour list as a JSON object of id -> neighbour ids.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_neighbors_json(
    path: &Path,
    neighbors: &NeighborList,
) -> Result<(), Box<dyn std::error::Error>> {
    write_json(path, neighbors)?;
    log::info!("Wrote neighbour list for {} units to {}", neighbors.len(), path.display());
    Ok(())
}

/// Writes the global statistic report.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_global_json(path: &Path, report: &GlobalReport) -> Result<(), Box<dyn std::error::Error>> {
    write_json(path, report)?;
    log::info!("Wrote global statistic to {}", path.display());
    Ok(())
}

/// Writes the per-unit LISA table.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_lisa_csv(path: &Path, rows: &[LisaRow]) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("Wrote {} LISA rows to {}", rows.len(), path.display());
    Ok(())
}

/// Writes the boundary polygons with the LISA columns as feature
/// properties.
///
/// # Errors
///
/// Returns an error if the rows do not match the boundary set or the file
/// cannot be written.
pub fn write_lisa_geojson(
    path: &Path,
    boundaries: &BoundarySet,
    rows: &[LisaRow],
) -> Result<(), Box<dyn std::error::Error>> {
    if rows.len() != boundaries.len() {
        return Err(format!(
            "{} LISA rows for {} boundary units",
            rows.len(),
            boundaries.len()
        )
        .into());
    }

    let mut features = Vec::with_capacity(rows.len());
    for (unit, row) in boundaries.units().iter().zip(rows) {
        let serde_json::Value::Object(properties) = serde_json::to_value(row)? else {
            return Err(format!("LISA row for '{}' is not a JSON object", row.unit_id).into());
        };

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&unit.geometry))),
            id: Some(Id::String(unit.id.clone())),
            properties: Some(properties),
            foreign_members: None,
        });
    }

    let collection = GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(collection.to_string().as_bytes())?;
    writer.flush()?;
    log::info!("Wrote {} features to {}", rows.len(), path.display());
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
