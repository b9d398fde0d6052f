use crate::modules::ModuleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to read plan file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML format in {path}: {reason}")]
    InvalidYaml { path: String, reason: String },

    #[error("Invalid task '{task}': {reason}")]
    InvalidTask { task: String, reason: String },

    #[error("Invalid module for task '{task}': {source}")]
    Module {
        task: String,
        #[source]
        source: ModuleError,
    },

    #[error("Task '{task}' cannot register into '{name}': {reason}")]
    InvalidRegister {
        task: String,
        name: String,
        reason: String,
    },

    #[error("Invalid include '{path}': {reason}")]
    InvalidInclude { path: String, reason: String },

    #[error("Include depth exceeded {max} while loading {path}")]
    IncludeDepthExceeded { path: String, max: usize },

    #[error("Invalid vars include: {reason}")]
    InvalidVarsInclude { reason: String },
}

pub type Result<T> = std::result::Result<T, PlanError>;

impl From<PlanError> for crate::error::HenchmanError {
    fn from(err: PlanError) -> Self {
        use crate::error::{ErrorKind, Fields, HenchmanError};
        let kind = match err {
            PlanError::IncludeDepthExceeded { .. } => ErrorKind::Internal,
            PlanError::Module { .. } | PlanError::InvalidRegister { .. } => ErrorKind::Validation,
            _ => ErrorKind::Config,
        };
        HenchmanError::from_error(kind, err, Fields::new(), "")
    }
}
