//! Plans, tasks and the preprocessor that builds them from YAML.

pub mod error;
pub mod preprocessor;
pub mod task;

pub use error::*;
pub use preprocessor::*;
pub use task::*;
