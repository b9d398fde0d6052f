use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration {path}: {reason}")]
    InvalidYaml { path: PathBuf, reason: String },

    #[error("Cannot determine a home directory for the default log path")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for crate::error::HenchmanError {
    fn from(err: ConfigError) -> Self {
        use crate::error::{ErrorKind, Fields, HenchmanError};
        HenchmanError::from_error(ErrorKind::Config, err, Fields::new(), "")
    }
}
