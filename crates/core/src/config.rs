//! Configuration management for the turnaround desk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub ledger: LedgerConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    pub json: bool,
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite file mirroring every audit record. No mirror when unset.
    pub path: Option<PathBuf>,
    /// Identifier written into ledger health reports
    pub ledger_id: Option<String>,
}

/// Which task mutations remain open after a turnaround is sealed.
///
/// The sealed KPI snapshot is never affected by these switches; they only
/// decide whether the live task records may still change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub allow_post_certification_justification: bool,
    pub allow_post_certification_mandatory_change: bool,
    /// Whether a justification may be replaced once supplied
    pub allow_justification_revision: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_post_certification_justification: false,
            allow_post_certification_mandatory_change: false,
            allow_justification_revision: true,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: Config =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.logging.level.trim().is_empty() {
            return Err(CoreError::Config("logging.level cannot be empty".to_string()));
        }
        if let Some(id) = &self.ledger.ledger_id {
            if id.trim().is_empty() {
                return Err(CoreError::Config(
                    "ledger.ledger_id cannot be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Ledger identifier, falling back to the file stem of the ledger path.
    pub fn ledger_id(&self) -> String {
        if let Some(id) = &self.ledger.ledger_id {
            return id.clone();
        }
        self.ledger
            .path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "turnaround-ledger".to_string())
    }
}
