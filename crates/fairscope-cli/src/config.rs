use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fairscope_core::{AttributeCatalog, AttributeSpec, SeverityThresholds};

use crate::registry::{RegistryError, write_text_atomic};

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "fairscope.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config encoding error: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("config write error: {0}")]
    Write(#[from] RegistryError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Upper bound for one audit, in seconds.
    pub timeout_secs: u64,
    /// Run audits in a child `fairscope worker` process.
    pub isolate: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            isolate: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeSettings {
    /// Outcome values counted as favorable when the command line names none.
    pub positive_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairscopeConfig {
    pub thresholds: SeverityThresholds,
    pub worker: WorkerSettings,
    pub outcome: OutcomeSettings,
    /// Attribute specs layered over the built-in catalog.
    pub attributes: Vec<AttributeSpec>,
}

impl Default for FairscopeConfig {
    fn default() -> Self {
        Self {
            thresholds: SeverityThresholds::default(),
            worker: WorkerSettings::default(),
            outcome: OutcomeSettings::default(),
            attributes: AttributeCatalog::conventional().attributes,
        }
    }
}

pub fn load_or_create_config(path: &Path) -> ConfigResult<FairscopeConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: FairscopeConfig = toml::from_str(&content)?;
        return Ok(config);
    }

    let config = FairscopeConfig::default();
    save_config(path, &config)?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &FairscopeConfig) -> ConfigResult<()> {
    let encoded = toml::to_string_pretty(config)?;
    write_text_atomic(path, &encoded).map_err(ConfigError::from)
}
