use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("Unbalanced template delimiters in '{template}'")]
    Unbalanced { template: String },

    #[error("Nested template delimiters in '{template}'")]
    Nested { template: String },

    #[error("Template syntax error in '{expr}': {reason}")]
    Syntax { expr: String, reason: String },

    #[error("'{name}' is undefined")]
    Undefined { name: String },

    #[error("Type error: {reason}")]
    Type { reason: String },

    #[error("Unknown filter '{name}'")]
    UnknownFilter { name: String },

    #[error("when must render to True or False, got '{value}'")]
    InvalidWhen { value: String },

    #[error("with_items must render to a sequence, got {kind}")]
    NotSequence { kind: String },
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for crate::error::HenchmanError {
    fn from(err: RenderError) -> Self {
        use crate::error::{ErrorKind, Fields, HenchmanError};
        HenchmanError::from_error(ErrorKind::Render, err, Fields::new(), "")
    }
}
