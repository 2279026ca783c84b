//! Subcommand runners.
//!
//! Each runner loads its inputs from a resolved [`AnalysisConfig`], calls
//! the library crates in order, and writes its result files. Nothing is
//! shared between runs.

use std::path::Path;
use std::time::Instant;

use crime_lisa_autocorrelation::{
    Inference, LocalOptions, PermutationOptions, classify_all, global_moran, local_moran_with,
    moran_permutation_test_with,
};
use crime_lisa_autocorrelation_models::{GlobalReport, WeightsDescription};
use crime_lisa_cli_utils::{IndicatifProgress, MultiProgress};
use crime_lisa_geography_models::Crs;
use crime_lisa_spatial::{AttributeTable, BoundarySet, count_incidents, read_incidents_path};
use crime_lisa_weights::{SpatialWeights, build_adjacency};

use crate::config::AnalysisConfig;
use crate::output;

/// File names written by [`run_analyze`].
pub const GLOBAL_FILE: &str = "global.json";
pub const LISA_CSV_FILE: &str = "lisa.csv";
pub const LISA_GEOJSON_FILE: &str = "lisa.geojson";

/// Reads and validates the boundary file.
///
/// # Errors
///
/// Returns an error if the path is missing or the file is invalid.
pub fn load_boundaries(config: &AnalysisConfig) -> Result<BoundarySet, Box<dyn std::error::Error>> {
    let path = config.boundaries_path()?;
    let boundaries = BoundarySet::from_geojson_path(
        path,
        &config.boundaries.id_property,
        config.boundaries.name_property.as_deref(),
        Crs(config.boundaries.crs),
    )?;
    log::info!("Loaded {} units from {}", boundaries.len(), path.display());
    Ok(boundaries)
}

/// Produces the analysed values in boundary order, with a variable name.
///
/// An attribute table takes precedence over incident counts.
///
/// # Errors
///
/// Returns an error if neither input is configured or an input is invalid.
pub fn load_values(
    config: &AnalysisConfig,
    boundaries: &BoundarySet,
) -> Result<(String, Vec<f64>), Box<dyn std::error::Error>> {
    if let Some(path) = &config.attributes.path {
        let table = AttributeTable::from_csv_path(
            path,
            &config.attributes.id_column,
            &config.attributes.value_column,
        )?;
        return Ok((config.attributes.value_column.clone(), table.align(boundaries)?));
    }

    let incidents = read_incidents_path(config.incidents_path()?, Crs(config.incidents.crs))?;
    let counts = count_incidents(boundaries, &incidents, &config.incidents.categories)?;
    Ok(("count".to_string(), counts.values()))
}

/// `count` subcommand: per-unit incident counts.
///
/// # Errors
///
/// Returns an error if an input is missing or invalid or the output cannot
/// be written.
pub fn run_count(config: &AnalysisConfig, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let boundaries = load_boundaries(config)?;
    let incidents = read_incidents_path(config.incidents_path()?, Crs(config.incidents.crs))?;
    let counts = count_incidents(&boundaries, &incidents, &config.incidents.categories)?;

    output::write_counts_csv(out, &counts.unit_counts(&boundaries))
}

/// `neighbors` subcommand: neighbour list JSON.
///
/// # Errors
///
/// Returns an error if the boundaries are invalid, the order is zero, or
/// the output cannot be written.
pub fn run_neighbors(config: &AnalysisConfig, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let boundaries = load_boundaries(config)?;
    let adjacency = build_adjacency(
        &boundaries,
        config.weights.contiguity,
        config.weights.order,
    )?;

    let summary = adjacency.summary(&boundaries)?;
    log::info!(
        "{} units, {} links, degree {}..{} (mean {:.2}), {} islands",
        summary.units,
        summary.links,
        summary.min_degree,
        summary.max_degree,
        summary.mean_degree,
        summary.islands.len()
    );

    output::write_neighbors_json(out, &adjacency.to_neighbor_list(&boundaries)?)
}

/// `analyze` subcommand: global and local Moran's I with result files.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete, an input is
/// invalid, a statistic is undefined for the data, or an output cannot be
/// written.
pub fn run_analyze(
    config: &AnalysisConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate_for_analysis()?;
    let start = Instant::now();
    let steps = IndicatifProgress::steps_bar(multi, "Analysis", 5);

    // ── Inputs ──
    steps.set_message("Loading inputs".to_string());
    let boundaries = load_boundaries(config)?;
    let (variable, values) = load_values(config, &boundaries)?;
    steps.inc(1);

    // ── Weights ──
    steps.set_message("Building weights".to_string());
    let adjacency = build_adjacency(
        &boundaries,
        config.weights.contiguity,
        config.weights.order,
    )?;
    let weights =
        SpatialWeights::with_island_policy(&adjacency, config.weights.style, config.weights.islands)?;
    let isolated: Vec<String> = adjacency
        .islands()
        .into_iter()
        .map(|i| boundaries.unit(i).id.clone())
        .collect();
    steps.inc(1);

    // ── Global ──
    steps.set_message("Global Moran's I".to_string());
    let moran = global_moran(&values, &weights)?;
    log::info!(
        "Global Moran's I = {:.4} (E[I] = {:.4}, z = {:.3}, p = {:.4})",
        moran.i,
        moran.expected_i,
        moran.z_normality,
        moran.p_normality
    );

    let permutations = config.inference.permutations;
    let permutation = if permutations > 0 {
        let bar = IndicatifProgress::trials_bar(multi, "Global permutations");
        let test = moran_permutation_test_with(
            &values,
            &weights,
            &PermutationOptions {
                permutations,
                seed: config.inference.seed,
                alternative: config.inference.alternative,
            },
            bar.as_ref(),
        )?;
        Some(test)
    } else {
        None
    };
    steps.inc(1);

    // ── Local ──
    steps.set_message("Local Moran's I".to_string());
    let bar = IndicatifProgress::units_bar(multi, "Local statistics");
    let local = local_moran_with(
        &values,
        &weights,
        &LocalOptions {
            permutations: (permutations > 0).then_some(permutations),
            seed: config.inference.seed,
        },
        bar.as_ref(),
    )?;
    if permutations == 0 && config.inference.method == Inference::Permutation {
        log::warn!("Permutations disabled; classifying with analytic p-values");
    }
    let labels = classify_all(&local, config.inference.method, config.inference.alpha)?;
    steps.inc(1);

    // ── Outputs ──
    steps.set_message("Writing outputs".to_string());
    let dir = &config.output.dir;
    std::fs::create_dir_all(dir)?;

    let report = GlobalReport {
        variable,
        weights: WeightsDescription {
            contiguity: config.weights.contiguity,
            order: config.weights.order,
            style: config.weights.style,
        },
        moran,
        permutation,
        isolated,
    };
    output::write_global_json(&dir.join(GLOBAL_FILE), &report)?;

    let rows = output::lisa_rows(&boundaries, &values, &local, &labels, config.inference.method);
    output::write_lisa_csv(&dir.join(LISA_CSV_FILE), &rows)?;
    if config.output.geojson {
        output::write_lisa_geojson(&dir.join(LISA_GEOJSON_FILE), &boundaries, &rows)?;
    }
    steps.inc(1);

    steps.finish(format!("Analysis complete in {:.1}s", start.elapsed().as_secs_f64()));
    Ok(())
}
