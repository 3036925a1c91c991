//! Layered configuration using Figment.
//!
//! Configuration is assembled from, in increasing priority:
//! 1. Built-in defaults
//! 2. A TOML file (`disc_probe.toml` unless another path is given)
//! 3. Environment variables prefixed with `DISC_PROBE_`, nested with `__`
//!
//! CLI flags are applied on top by the binary after extraction.
//!
//! # Example
//! ```no_run
//! use disc_probe::config::ProbeConfig;
//!
//! let config = ProbeConfig::load()?;
//! println!("theta step: {}", config.analysis.theta_step);
//! # Ok::<(), disc_probe::error::ProbeError>(())
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ProbeError};
use crate::sync::rotation::DEFAULT_SPEED_TOLERANCE;
use crate::sync::{AngleGrid, EngineSettings, SpeedPolicy, Statistic};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "disc_probe.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DISC_PROBE_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProbeConfig {
    /// Logging and general settings.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Angle grid, wire and speed-gate settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Worker count and output settings.
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Angle grid, wire selection and speed gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Lower edge of the angle window in radians (inclusive)
    #[serde(default = "default_theta_min")]
    pub theta_min: f64,
    /// Upper edge of the angle window in radians (exclusive)
    #[serde(default = "default_theta_max")]
    pub theta_max: f64,
    /// Bin width in radians
    #[serde(default = "default_theta_step")]
    pub theta_step: f64,
    /// Wire count override; taken from recording metadata when unset
    #[serde(default)]
    pub wires: Option<usize>,
    /// Sanity bound on the wire count
    #[serde(default = "default_max_wires")]
    pub max_wires: usize,
    /// Wires excluded from output rows
    #[serde(default)]
    pub ignore: BTreeSet<usize>,
    /// Behaviour when the rotation speed is not constant
    #[serde(default)]
    pub speed_policy: SpeedPolicy,
    /// Tolerated max/min rotation period excess
    #[serde(default = "default_speed_tolerance")]
    pub speed_tolerance: f64,
    /// Statistic written to the output
    #[serde(default)]
    pub statistic: Statistic,
}

/// Batch processing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Recordings processed concurrently (0 = available parallelism)
    #[serde(default)]
    pub workers: usize,
    /// File extension picked up when an input is a directory
    #[serde(default = "default_extension")]
    pub extension: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_theta_min() -> f64 {
    AngleGrid::default().theta_min
}

fn default_theta_max() -> f64 {
    AngleGrid::default().theta_max
}

fn default_theta_step() -> f64 {
    AngleGrid::default().theta_step
}

fn default_max_wires() -> usize {
    16
}

fn default_speed_tolerance() -> f64 {
    DEFAULT_SPEED_TOLERANCE
}

fn default_extension() -> String {
    "json".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            theta_min: default_theta_min(),
            theta_max: default_theta_max(),
            theta_step: default_theta_step(),
            wires: None,
            max_wires: default_max_wires(),
            ignore: BTreeSet::new(),
            speed_policy: SpeedPolicy::default(),
            speed_tolerance: default_speed_tolerance(),
            statistic: Statistic::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            extension: default_extension(),
        }
    }
}

impl ProbeConfig {
    /// Load configuration from `disc_probe.toml` (if present) and the environment
    pub fn load() -> AppResult<Self> {
        Self::figment(Path::new(DEFAULT_CONFIG_FILE))
            .extract()
            .map_err(ProbeError::from)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ProbeError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        Self::figment(path).extract().map_err(ProbeError::from)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ProbeConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(ProbeError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(ProbeError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        self.analysis.validate()?;

        if self.batch.extension.trim().is_empty() {
            return Err(ProbeError::Configuration(
                "batch.extension cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Renders the effective configuration as TOML
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| ProbeError::Configuration(e.to_string()))
    }
}

impl AnalysisConfig {
    /// Angle grid described by the `theta_*` fields.
    pub fn grid(&self) -> AngleGrid {
        AngleGrid {
            theta_min: self.theta_min,
            theta_max: self.theta_max,
            theta_step: self.theta_step,
        }
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        self.grid().validate()?;
        if self.max_wires == 0 {
            return Err(ProbeError::Configuration(
                "max_wires must be at least 1".to_string(),
            ));
        }
        if let Some(wires) = self.wires {
            self.check_wire_count(wires)?;
            self.grid().validate_for_wires(wires)?;
        }
        if !(self.speed_tolerance.is_finite() && self.speed_tolerance >= 0.0) {
            return Err(ProbeError::Configuration(format!(
                "speed_tolerance must be a non-negative number, got {}",
                self.speed_tolerance
            )));
        }
        Ok(())
    }

    /// Picks the wire count for a recording: the override if set, else the metadata count.
    pub fn resolve_wires(&self, declared: usize) -> AppResult<usize> {
        let wires = self.wires.unwrap_or(declared);
        self.check_wire_count(wires)?;
        Ok(wires)
    }

    fn check_wire_count(&self, wires: usize) -> AppResult<()> {
        if wires == 0 {
            return Err(ProbeError::NoWiresDefined);
        }
        if wires > self.max_wires {
            return Err(ProbeError::TooManyWires {
                found: wires,
                max: self.max_wires,
            });
        }
        Ok(())
    }

    /// Engine parameters for a recording with `wires` wires.
    pub fn engine_settings(&self, wires: usize) -> EngineSettings {
        EngineSettings::new(self.grid(), wires)
            .with_speed_policy(self.speed_policy)
            .with_speed_tolerance(self.speed_tolerance)
    }
}
