//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables. Each binary
//! loads it once and hands the relevant section to the components it builds.

use serde::Deserialize;
use thiserror::Error;

use crate::lease::LeaseConfig;
use crate::staging::StagingConfig;
use crate::warehouse::WarehouseConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "CDCFLOW_CONFIG";
/// Prefix for configuration environment variables (`CDCFLOW__WAREHOUSE__HOST`).
pub const CONFIG_ENV_PREFIX: &str = "CDCFLOW";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Staging area shared by the stream writer and the loader.
    pub staging: StagingConfig,
    /// Destination warehouse (loader and bootstrap).
    pub warehouse: WarehouseConfig,
    /// Per-object leasing in the loader.
    pub lease: LeaseConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config: Config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks shared by every binary.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pending = self.staging.pending_prefix.trim_end_matches('/');
        let processed = self.staging.processed_prefix.trim_end_matches('/');
        if pending.is_empty() || processed.is_empty() {
            return Err(ConfigError::Invalid {
                field: "staging",
                reason: "pending_prefix and processed_prefix must be non-empty".to_string(),
            });
        }
        if pending == processed {
            return Err(ConfigError::Invalid {
                field: "staging",
                reason: format!("pending and processed prefixes are both {:?}", pending),
            });
        }
        Ok(())
    }

    /// Extra checks for the loader, which needs a role for `COPY` and, with
    /// leasing on, a TTL longer than the deadlines of one object's work.
    pub fn validate_for_loader(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.warehouse.iam_role_arn.is_empty() {
            return Err(ConfigError::Invalid {
                field: "warehouse.iam_role_arn",
                reason: "required for bulk loads".to_string(),
            });
        }
        if self.lease.enabled {
            // exists check, load, and move must all finish under one lease
            let work = self.warehouse.load_timeout() + self.staging.timeout() * 2;
            if self.lease.ttl() <= work {
                return Err(ConfigError::Invalid {
                    field: "lease.ttl_secs",
                    reason: format!(
                        "{}s does not outlast one object's work ({}s)",
                        self.lease.ttl_secs,
                        work.as_secs()
                    ),
                });
            }
        }
        Ok(())
    }
}
