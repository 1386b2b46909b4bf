//! Engine configuration loaded from JSON.
//!
//! Every field has a default, so `{}` is a valid configuration. Unknown
//! fields are rejected to catch typos early.
//!
//! ```
//! use keystone_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "fixed_dt": 0.02, "guid_seed": 7 }"#).unwrap();
//! assert_eq!(config.fixed_dt, 0.02);
//! assert_eq!(config.guid_seed, Some(7));
//! assert_eq!(config.log_filter, "info");
//! ```

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Errors produced while loading or validating an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Runtime settings for a [`Scene`](crate::scene::Scene) and its tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Fixed simulation step in seconds. Must be positive and finite.
    pub fixed_dt: f64,
    /// Gravity applied by the built-in physics world.
    pub gravity: Vec3,
    /// Seed for entity guids. `None` seeds from OS entropy.
    pub guid_seed: Option<u64>,
    /// Default `tracing` filter directives; `RUST_LOG` takes precedence.
    /// Installed by [`EngineConfig::init_logging`], which
    /// [`TickLoop::new`](crate::tick::TickLoop::new) calls.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            guid_seed: None,
            log_filter: "info".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Install the global subscriber with [`log_filter`](Self::log_filter).
    /// Returns `false` if one was already installed.
    pub fn init_logging(&self) -> bool {
        crate::logging::init_logging(&self.log_filter)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "fixed_dt",
                reason: format!("must be positive and finite, got {}", self.fixed_dt),
            });
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::Invalid {
                field: "gravity",
                reason: format!("must be finite, got {}", self.gravity),
            });
        }
        Ok(())
    }
}
