//! Engine configuration file.

use std::path::Path;

use nr_rules::RuleConfig;
use nr_sync::{RetryConfig, SyncOptions};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub parallel: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Everything tunable about a validation/sync cycle. Missing sections and
/// fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rules: RuleConfig,
    pub retry: RetryConfig,
    pub sync: SyncSection,
}

impl EngineConfig {
    pub fn validate(&self) -> AppResult<()> {
        self.rules
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.retry.validate().map_err(AppError::Config)?;
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            retry: self.retry.clone(),
            parallel: self.sync.parallel,
        }
    }

    pub fn from_yaml(content: &str) -> AppResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

/// Load and validate a YAML config file.
pub fn load_config(path: &Path) -> AppResult<EngineConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    EngineConfig::from_yaml(&content)
}
