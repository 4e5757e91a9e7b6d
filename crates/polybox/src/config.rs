//! Engine configuration
//!
//! Loaded from TOML via the config crate. The embedded example config doubles
//! as the default: an engine built with [`EngineConfig::default`] works on
//! any host with `isolate` on `PATH`.

use std::path::{Path, PathBuf};

use config::{Config as ConfigBuilder, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{MountConfig, ResourceLimits};

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../polybox.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Range of isolate box ids leased to concurrent jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct BoxRange {
    /// First box id
    #[serde(default)]
    pub start: u32,

    /// Number of boxes, which caps job concurrency
    #[serde(default = "default_box_count")]
    pub count: u32,
}

impl Default for BoxRange {
    fn default() -> Self {
        Self {
            start: 0,
            count: default_box_count(),
        }
    }
}

fn default_box_count() -> u32 {
    16
}

/// Configuration for the execution engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Path to the isolate binary (uses PATH if not specified)
    #[serde(default)]
    pub isolate_path: Option<PathBuf>,

    /// Global directory mounts applied to every sandbox invocation
    #[serde(default)]
    pub allowed_dirs: Vec<MountConfig>,

    /// Box id range for the pool
    #[serde(default)]
    pub boxes: BoxRange,

    /// Baseline limits for compile phases
    #[serde(default)]
    pub compile_limits: ResourceLimits,

    /// Baseline limits for test runs
    #[serde(default)]
    pub execute_limits: ResourceLimits,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        let config: EngineConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: EngineConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Path to the isolate binary.
    pub fn isolate_binary(&self) -> PathBuf {
        self.isolate_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("isolate"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.boxes.count == 0 {
            return Err(ConfigError::Invalid(
                "boxes.count must be at least 1".to_owned(),
            ));
        }
        for mount in &self.allowed_dirs {
            if mount.source.is_empty() || mount.target.is_empty() {
                return Err(ConfigError::Invalid(
                    "allowed_dirs entries need a source and a target".to_owned(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}
