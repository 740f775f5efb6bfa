//! Configuration for the incremental scoring network.
//!
//! Controls assertion level, constraint match tracking and constraint weight
//! overrides without code changes.
//!
//! ```
//! use solverforge_config::{EnvironmentMode, NetworkConfig};
//!
//! let config = NetworkConfig::from_toml_str(r#"
//!     environment_mode = "full_assert"
//!     constraint_match_enabled = true
//!
//!     [constraint_weights]
//!     "Room conflict" = "-2hard/0soft"
//! "#).unwrap();
//!
//! assert_eq!(config.environment_mode, EnvironmentMode::FullAssert);
//! assert!(config.environment_mode.is_asserted());
//! assert_eq!(config.constraint_weights.len(), 1);
//! ```
//!
//! A missing file falls back to defaults:
//!
//! ```
//! use solverforge_config::NetworkConfig;
//!
//! let config = NetworkConfig::load("network.toml").unwrap_or_default();
//! assert!(!config.constraint_match_enabled);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use solverforge_core::ParseableScore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings read once when a network is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct NetworkConfig {
    /// Assertion level of score calculation.
    pub environment_mode: EnvironmentMode,

    /// Keep per-match justifications for explanation and indictments.
    pub constraint_match_enabled: bool,

    /// Constraint weight overrides keyed by constraint name (bare or
    /// `package/name`), in the textual score format.
    pub constraint_weights: BTreeMap<String, String>,

    /// Number of tuple slots the network preallocates.
    pub initial_tuple_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            environment_mode: EnvironmentMode::default(),
            constraint_match_enabled: false,
            constraint_weights: BTreeMap::new(),
            initial_tuple_capacity: 1024,
        }
    }
}

impl NetworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file; `.yaml`/`.yml` files are read as
    /// YAML, everything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()
    }

    pub fn with_environment_mode(mut self, mode: EnvironmentMode) -> Self {
        self.environment_mode = mode;
        self
    }

    pub fn with_constraint_match_enabled(mut self, enabled: bool) -> Self {
        self.constraint_match_enabled = enabled;
        self
    }

    /// Overrides the weight of the constraint named `name`.
    pub fn with_constraint_weight(
        mut self,
        name: impl Into<String>,
        weight: impl Into<String>,
    ) -> Self {
        self.constraint_weights.insert(name.into(), weight.into());
        self
    }

    pub fn with_initial_tuple_capacity(mut self, capacity: usize) -> Self {
        self.initial_tuple_capacity = capacity;
        self
    }

    /// Parses every weight override as `Sc`.
    pub fn parsed_weights<Sc: ParseableScore>(&self) -> Result<Vec<(&str, Sc)>, ConfigError> {
        self.constraint_weights
            .iter()
            .map(|(name, weight)| {
                Sc::parse(weight)
                    .map(|score| (name.as_str(), score))
                    .map_err(|e| {
                        ConfigError::Invalid(format!(
                            "weight of constraint '{}': {}",
                            name, e
                        ))
                    })
            })
            .collect()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if let Some(name) = self.constraint_weights.keys().find(|n| n.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "constraint weight override with blank name '{}'",
                name
            )));
        }
        Ok(self)
    }
}

/// How much checking a network does while it scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentMode {
    #[default]
    NonReproducible,

    Reproducible,

    /// Every flush recomputes the score from scratch and compares.
    FastAssert,

    /// Like `FastAssert`, and also compares per-constraint match counts.
    FullAssert,
}

impl EnvironmentMode {
    /// True when flushes are checked against a from-scratch recomputation.
    pub fn is_asserted(self) -> bool {
        matches!(self, EnvironmentMode::FastAssert | EnvironmentMode::FullAssert)
    }

    pub fn is_fully_asserted(self) -> bool {
        self == EnvironmentMode::FullAssert
    }
}
