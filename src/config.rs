//! TOML-based analysis configuration.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::analysis::TapObjective;
use crate::grid::Id;
use crate::sim::SimulationOptions;

/// Top-level analysis configuration parsed from TOML.
///
/// Every section is optional and falls back to its defaults. Load with
/// [`AnalysisConfig::from_toml_file`], or use `AnalysisConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Batch execution options.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// EV penetration parameters.
    #[serde(default)]
    pub ev: EvConfig,
    /// Tap search parameters.
    #[serde(default)]
    pub tap: TapConfig,
    /// Lines to run N-1 analysis for.
    #[serde(default)]
    pub contingency: ContingencyConfig,
    /// Log filter used when neither `--log` nor `RUST_LOG` is given.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Solve timestamps and contingency candidates on the rayon pool.
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvConfig {
    /// Share of loads that get an EV, in `[0.0, 1.0]`.
    pub penetration_level: f64,
    /// Seed for the load and curve draw.
    pub seed: u64,
}

impl Default for EvConfig {
    fn default() -> Self {
        Self {
            penetration_level: 0.5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TapConfig {
    /// `"minimal_energy_loss"` or `"minimal_deviation_u_pu"`.
    pub objective: String,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            objective: TapObjective::MinimalVoltageDeviation.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContingencyConfig {
    pub lines: Vec<Id>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, e.g. `"info"` or `"lv_grid_sim=debug"`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"ev.penetration_level"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl AnalysisConfig {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let ev = &self.ev;
        if !(0.0..=1.0).contains(&ev.penetration_level) {
            errors.push(ConfigError {
                field: "ev.penetration_level".into(),
                message: "must be in [0.0, 1.0]".into(),
            });
        }

        if let Err(e) = self.tap_objective() {
            errors.push(e);
        }

        let lines = &self.contingency.lines;
        for (i, id) in lines.iter().enumerate() {
            if lines[..i].contains(id) {
                errors.push(ConfigError {
                    field: "contingency.lines".into(),
                    message: format!("line {id} listed more than once"),
                });
            }
        }

        if let Err(e) = EnvFilter::try_new(&self.logging.filter) {
            errors.push(ConfigError {
                field: "logging.filter".into(),
                message: format!("invalid filter \"{}\": {e}", self.logging.filter),
            });
        }

        errors
    }

    pub fn simulation_options(&self) -> SimulationOptions {
        SimulationOptions {
            parallel: self.simulation.parallel,
        }
    }

    /// Parses `tap.objective`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming `tap.objective` for unknown names.
    pub fn tap_objective(&self) -> Result<TapObjective, ConfigError> {
        self.tap
            .objective
            .parse()
            .map_err(|message| ConfigError {
                field: "tap.objective".into(),
                message,
            })
    }
}
