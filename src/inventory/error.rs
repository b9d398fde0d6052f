use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Failed to read inventory {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML format: {reason}")]
    InvalidYaml { reason: String },

    #[error("Inventory has no 'groups' section")]
    MissingGroups,

    #[error("Group name '{name}' is reserved")]
    ReservedGroup { name: String },

    #[error("Group '{group}' must declare a non-empty 'hosts' list")]
    MissingHosts { group: String },

    #[error("Unknown inventory group: {group}")]
    UnknownGroup { group: String },

    #[error("Transport setup failed for {host}: {source}")]
    Transport {
        host: String,
        #[source]
        source: TransportError,
    },
}

pub type Result<T> = std::result::Result<T, InventoryError>;

impl From<InventoryError> for crate::error::HenchmanError {
    fn from(err: InventoryError) -> Self {
        use crate::error::{ErrorKind, Fields, HenchmanError};
        let kind = match &err {
            InventoryError::Transport {
                source: TransportError::InvalidConfig { .. },
                ..
            } => ErrorKind::Validation,
            InventoryError::Transport { .. } => ErrorKind::Transport,
            _ => ErrorKind::Config,
        };
        HenchmanError::from_error(kind, err, Fields::new(), "")
    }
}
