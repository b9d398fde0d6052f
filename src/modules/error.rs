use thiserror::Error;

/// Errors that can occur while resolving or preparing a module
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {name} (searched: {searched:?})")]
    ModuleNotFound { name: String, searched: Vec<String> },

    #[error("Invalid module name: '{name}'")]
    InvalidName { name: String },

    #[error("Module args are invalid: {args}")]
    InvalidArgs { args: String },

    #[error("Module {module} requires parameter '{param}'")]
    MissingParam { module: String, param: String },

    #[error("Failed to stage {path} for module {module}: {reason}")]
    Staging {
        module: String,
        path: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModuleError>;

impl From<ModuleError> for crate::error::HenchmanError {
    fn from(err: ModuleError) -> Self {
        use crate::error::{ErrorKind, Fields, HenchmanError};
        let kind = match err {
            ModuleError::ModuleNotFound { .. }
            | ModuleError::InvalidName { .. }
            | ModuleError::InvalidArgs { .. }
            | ModuleError::MissingParam { .. } => ErrorKind::Validation,
            ModuleError::Staging { .. } | ModuleError::Io(_) => ErrorKind::Config,
            ModuleError::Serialization(_) => ErrorKind::Internal,
        };
        HenchmanError::from_error(kind, err, Fields::new(), "")
    }
}
