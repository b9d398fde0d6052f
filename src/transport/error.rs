use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid transport configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH session error on {host}: {reason}")]
    Session { host: String, reason: String },

    #[error("Authentication failed for {user}@{host}: {reason}")]
    Auth {
        host: String,
        user: String,
        reason: String,
    },

    #[error("Command `{command}` exited with status {status}: {stdout}{stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Transfer to {dest} failed: {reason}")]
    Transfer { dest: String, reason: String },

    #[error("Transport task aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for TransportError {
    fn from(err: tokio::task::JoinError) -> Self {
        TransportError::Aborted(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

impl From<TransportError> for crate::error::HenchmanError {
    fn from(err: TransportError) -> Self {
        use crate::error::{ErrorKind, Fields, HenchmanError};
        let kind = match err {
            TransportError::InvalidConfig { .. } => ErrorKind::Validation,
            _ => ErrorKind::Transport,
        };
        HenchmanError::from_error(kind, err, Fields::new(), "")
    }
}
