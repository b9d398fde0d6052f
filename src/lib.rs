//! Henchman - agentless configuration management
//!
//! Plans are ordered lists of tasks. Each task names a module: a standalone
//! executable that is uploaded to the target, fed its parameters as JSON on
//! stdin, and answers with a JSON result on stdout. Hosts come from a YAML
//! inventory and are reached over SSH, or through the local shell.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod modules;
pub mod plan;
pub mod template;
pub mod transport;
pub mod types;

pub use error::{ErrorKind, HenchmanError};
pub use inventory::{Inventory, Machine};
pub use plan::{Plan, Task};
