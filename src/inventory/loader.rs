use super::error::{InventoryError, Result};
use super::model::Inventory;
use std::path::{Path, PathBuf};

/// Source of an inventory.
pub trait InventoryLoader {
    fn load(&self) -> Result<Inventory>;
}

/// Inventory read from a YAML file on disk.
#[derive(Debug, Clone)]
pub struct YamlInventory {
    path: PathBuf,
}

impl YamlInventory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl InventoryLoader for YamlInventory {
    fn load(&self) -> Result<Inventory> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| InventoryError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        Inventory::from_yaml(&content)
    }
}
