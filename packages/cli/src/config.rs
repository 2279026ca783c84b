//! Analysis configuration.
//!
//! A TOML file provides the defaults for a run; command-line flags override
//! individual fields. Every table is optional in the file, but a run needs
//! a boundary file and either an incident file or an attribute table.

use std::path::{Path, PathBuf};

use crime_lisa_autocorrelation::{Alternative, DEFAULT_ALPHA, Inference};
use crime_lisa_geography_models::Crs;
use crime_lisa_weights::{Contiguity, IslandPolicy, WeightStyle};
use serde::Deserialize;

/// Errors that can occur while loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required setting is absent from both the file and the flags.
    #[error("Missing setting: {0}")]
    Missing(String),

    /// A setting has an out-of-range value.
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// `[boundaries]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundariesConfig {
    /// `GeoJSON` `FeatureCollection` of unit polygons.
    pub path: Option<PathBuf>,
    /// Feature property holding the unit identifier.
    pub id_property: String,
    /// Feature property holding a display name.
    pub name_property: Option<String>,
    /// EPSG code of the coordinates.
    pub crs: u32,
}

impl Default for BoundariesConfig {
    fn default() -> Self {
        Self {
            path: None,
            id_property: "id".to_string(),
            name_property: None,
            crs: Crs::WGS84.epsg(),
        }
    }
}

/// `[incidents]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncidentsConfig {
    /// Incident CSV with `longitude` and `latitude` columns.
    pub path: Option<PathBuf>,
    /// EPSG code of the coordinates.
    pub crs: u32,
    /// Categories to keep; empty keeps everything.
    pub categories: Vec<String>,
}

impl Default for IncidentsConfig {
    fn default() -> Self {
        Self {
            path: None,
            crs: Crs::WGS84.epsg(),
            categories: Vec::new(),
        }
    }
}

/// `[attributes]` table. When a path is set, the attribute column is
/// analysed instead of incident counts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttributesConfig {
    /// Attribute CSV.
    pub path: Option<PathBuf>,
    /// Column holding the unit identifier.
    pub id_column: String,
    /// Column holding the value to analyse.
    pub value_column: String,
}

impl Default for AttributesConfig {
    fn default() -> Self {
        Self {
            path: None,
            id_column: "id".to_string(),
            value_column: "value".to_string(),
        }
    }
}

/// `[weights]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightsConfig {
    /// Contiguity rule.
    pub contiguity: Contiguity,
    /// Neighbour order (1 = direct neighbours).
    pub order: usize,
    /// Weighting style.
    pub style: WeightStyle,
    /// Handling of units without neighbours under row-standardization.
    pub islands: IslandPolicy,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            contiguity: Contiguity::Queen,
            order: 1,
            style: WeightStyle::RowStandardized,
            islands: IslandPolicy::Reject,
        }
    }
}

/// `[inference]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Permutations for the global and local tests; `0` disables them.
    pub permutations: u64,
    /// Seed of the permutation streams.
    pub seed: u64,
    /// Tail used by the global permutation test.
    pub alternative: Alternative,
    /// p-value used to classify local statistics.
    pub method: Inference,
    /// Significance level.
    pub alpha: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            permutations: 999,
            seed: 12345,
            alternative: Alternative::Folded,
            method: Inference::Permutation,
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// `[output]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory the result files are written to.
    pub dir: PathBuf,
    /// Also write `lisa.geojson`.
    pub geojson: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            geojson: false,
        }
    }
}

/// Complete analysis configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Boundary input.
    pub boundaries: BoundariesConfig,
    /// Incident input.
    pub incidents: IncidentsConfig,
    /// Attribute input.
    pub attributes: AttributesConfig,
    /// Neighbour graph and weights.
    pub weights: WeightsConfig,
    /// Permutation inference and classification.
    pub inference: InferenceConfig,
    /// Result files.
    pub output: OutputConfig,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub boundaries: Option<PathBuf>,
    pub id_property: Option<String>,
    pub name_property: Option<String>,
    pub crs: Option<u32>,
    pub incidents: Option<PathBuf>,
    pub categories: Vec<String>,
    pub attributes: Option<PathBuf>,
    pub id_column: Option<String>,
    pub value_column: Option<String>,
    pub contiguity: Option<Contiguity>,
    pub order: Option<usize>,
    pub style: Option<WeightStyle>,
    pub islands: Option<IslandPolicy>,
    pub permutations: Option<u64>,
    pub seed: Option<u64>,
    pub alternative: Option<Alternative>,
    pub method: Option<Inference>,
    pub alpha: Option<f64>,
    pub output_dir: Option<PathBuf>,
    pub geojson: bool,
}

impl AnalysisConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid for this
    /// schema (unknown keys are rejected).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Loads a configuration file, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies command-line overrides.
    ///
    /// `--crs` sets both the boundary and incident reference system.
    /// Categories given on the command line replace the file's list.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        if overrides.boundaries.is_some() {
            self.boundaries.path = overrides.boundaries;
        }
        set(&mut self.boundaries.id_property, overrides.id_property);
        if overrides.name_property.is_some() {
            self.boundaries.name_property = overrides.name_property;
        }
        set(&mut self.boundaries.crs, overrides.crs);
        set(&mut self.incidents.crs, overrides.crs);

        if overrides.incidents.is_some() {
            self.incidents.path = overrides.incidents;
        }
        if !overrides.categories.is_empty() {
            self.incidents.categories = overrides.categories;
        }

        if overrides.attributes.is_some() {
            self.attributes.path = overrides.attributes;
        }
        set(&mut self.attributes.id_column, overrides.id_column);
        set(&mut self.attributes.value_column, overrides.value_column);

        set(&mut self.weights.contiguity, overrides.contiguity);
        set(&mut self.weights.order, overrides.order);
        set(&mut self.weights.style, overrides.style);
        set(&mut self.weights.islands, overrides.islands);

        set(&mut self.inference.permutations, overrides.permutations);
        set(&mut self.inference.seed, overrides.seed);
        set(&mut self.inference.alternative, overrides.alternative);
        set(&mut self.inference.method, overrides.method);
        set(&mut self.inference.alpha, overrides.alpha);

        set(&mut self.output.dir, overrides.output_dir);
        self.output.geojson |= overrides.geojson;

        self
    }

    /// Boundary file path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if no boundary file is configured.
    pub fn boundaries_path(&self) -> Result<&Path, ConfigError> {
        self.boundaries
            .path
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("boundaries.path (--boundaries)".to_string()))
    }

    /// Incident file path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if no incident file is configured.
    pub fn incidents_path(&self) -> Result<&Path, ConfigError> {
        self.incidents
            .path
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("incidents.path (--incidents)".to_string()))
    }

    /// Checks the settings an analysis run needs.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Missing`] if there is no boundary file, or neither
    ///   an incident file nor an attribute table
    /// * [`ConfigError::Invalid`] if the order is zero or alpha is outside
    ///   `(0, 1]`
    pub fn validate_for_analysis(&self) -> Result<(), ConfigError> {
        self.boundaries_path()?;

        if self.incidents.path.is_none() && self.attributes.path.is_none() {
            return Err(ConfigError::Missing(
                "incidents.path (--incidents) or attributes.path (--attributes)".to_string(),
            ));
        }

        if self.weights.order == 0 {
            return Err(ConfigError::Invalid(
                "weights.order must be at least 1".to_string(),
            ));
        }

        let alpha = self.inference.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "inference.alpha must be in (0, 1], got {alpha}"
            )));
        }

        Ok(())
    }
}
