#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line runner for spatial autocorrelation of crime counts.
//!
//! Aggregates incidents to boundary polygons, builds contiguity weights,
//! and writes global Moran's I and LISA cluster results. Settings come from
//! an optional TOML file (`--config`) overridden by flags; verbosity comes
//! from `RUST_LOG`.

mod config;
mod output;
mod pipeline;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crime_lisa_autocorrelation::{Alternative, Inference};
use crime_lisa_weights::{Contiguity, IslandPolicy, WeightStyle};

use crate::config::{AnalysisConfig, Overrides};

#[derive(Parser)]
#[command(
    name = "crime_lisa_cli",
    about = "Spatial autocorrelation (Moran's I, LISA) of crime counts over polygons"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count incidents per boundary unit
    Count {
        #[command(flatten)]
        inputs: InputArgs,
        /// Output CSV path
        #[arg(long, default_value = "counts.csv")]
        output: PathBuf,
    },
    /// Write the contiguity neighbour list as JSON
    Neighbors {
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        weights: WeightArgs,
        /// Output JSON path
        #[arg(long, default_value = "neighbors.json")]
        output: PathBuf,
    },
    /// Compute global Moran's I and LISA clusters
    Analyze {
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        weights: WeightArgs,
        #[command(flatten)]
        inference: InferenceArgs,
        /// Directory for global.json, lisa.csv and lisa.geojson
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Also write lisa.geojson for map rendering
        #[arg(long)]
        geojson: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// TOML analysis configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Boundary `GeoJSON` `FeatureCollection`
    #[arg(long)]
    boundaries: Option<PathBuf>,
    /// Feature property holding the unit identifier
    #[arg(long)]
    id_property: Option<String>,
    /// Feature property holding the unit name
    #[arg(long)]
    name_property: Option<String>,
    /// EPSG code shared by boundaries and incidents
    #[arg(long)]
    crs: Option<u32>,
    /// Incident CSV with longitude and latitude columns
    #[arg(long)]
    incidents: Option<PathBuf>,
    /// Only count incidents in this category (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Attribute CSV analysed instead of incident counts
    #[arg(long)]
    attributes: Option<PathBuf>,
    /// Identifier column of the attribute CSV
    #[arg(long)]
    id_column: Option<String>,
    /// Value column of the attribute CSV
    #[arg(long)]
    value_column: Option<String>,
}

#[derive(Args)]
struct WeightArgs {
    /// Contiguity rule (rook, queen)
    #[arg(long)]
    contiguity: Option<Contiguity>,
    /// Neighbour order
    #[arg(long)]
    order: Option<usize>,
    /// Weight style (binary, row-standardized)
    #[arg(long)]
    style: Option<WeightStyle>,
    /// Units without neighbours under row-standardization (reject, exclude)
    #[arg(long)]
    islands: Option<IslandPolicy>,
}

#[derive(Args)]
struct InferenceArgs {
    /// Permutations for the global and local tests (0 disables them)
    #[arg(long)]
    permutations: Option<u64>,
    /// Seed of the permutation streams
    #[arg(long)]
    seed: Option<u64>,
    /// Tail of the global permutation test (greater, less, two-sided, folded)
    #[arg(long)]
    alternative: Option<Alternative>,
    /// p-value used for cluster labels (analytic, permutation)
    #[arg(long)]
    method: Option<Inference>,
    /// Significance level
    #[arg(long)]
    alpha: Option<f64>,
}

impl InputArgs {
    fn load(self, mut overrides: Overrides) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
        overrides.boundaries = self.boundaries;
        overrides.id_property = self.id_property;
        overrides.name_property = self.name_property;
        overrides.crs = self.crs;
        overrides.incidents = self.incidents;
        overrides.categories = self.categories;
        overrides.attributes = self.attributes;
        overrides.id_column = self.id_column;
        overrides.value_column = self.value_column;

        Ok(AnalysisConfig::load(self.config.as_deref())?.with_overrides(overrides))
    }
}

impl WeightArgs {
    fn apply(self, overrides: &mut Overrides) {
        overrides.contiguity = self.contiguity;
        overrides.order = self.order;
        overrides.style = self.style;
        overrides.islands = self.islands;
    }
}

impl InferenceArgs {
    fn apply(self, overrides: &mut Overrides) {
        overrides.permutations = self.permutations;
        overrides.seed = self.seed;
        overrides.alternative = self.alternative;
        overrides.method = self.method;
        overrides.alpha = self.alpha;
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_lisa_cli_utils::init_logger("info");
    let cli = Cli::parse();

    match cli.command {
        Commands::Count { inputs, output } => {
            let config = inputs.load(Overrides::default())?;
            pipeline::run_count(&config, &output)?;
        }
        Commands::Neighbors {
            inputs,
            weights,
            output,
        } => {
            let mut overrides = Overrides::default();
            weights.apply(&mut overrides);
            let config = inputs.load(overrides)?;
            pipeline::run_neighbors(&config, &output)?;
        }
        Commands::Analyze {
            inputs,
            weights,
            inference,
            output_dir,
            geojson,
        } => {
            let mut overrides = Overrides {
                output_dir,
                geojson,
                ..Overrides::default()
            };
            weights.apply(&mut overrides);
            inference.apply(&mut overrides);
            let config = inputs.load(overrides)?;
            pipeline::run_analyze(&config, &multi)?;
        }
    }

    Ok(())
}
