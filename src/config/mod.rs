//! Process configuration read from `conf.yaml`.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "conf.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// JSON log file.
    pub log: PathBuf,
}

impl Configuration {
    /// Defaults used when no configuration file exists.
    pub fn with_defaults() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self {
            log: home.join(".henchman").join("system.log"),
        })
    }

    /// Load `path`. A missing file yields the defaults; a missing `log` key
    /// falls back to the default log path.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Self::with_defaults();
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, path)
    }

    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        struct RawConfiguration {
            log: Option<String>,
        }

        let raw: Option<RawConfiguration> =
            serde_yaml::from_str(content).map_err(|e| ConfigError::InvalidYaml {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        match raw.and_then(|r| r.log).filter(|l| !l.trim().is_empty()) {
            Some(log) => Ok(Self {
                log: PathBuf::from(shellexpand::tilde(log.trim()).into_owned()),
            }),
            None => Self::with_defaults(),
        }
    }
}
