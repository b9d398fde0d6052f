//! Scheduling a plan over machines.

pub mod merge;
pub mod rolling;
pub mod runner;
pub mod standard;
pub mod strategy;

pub use merge::merge_errors;
pub use rolling::RollingDeploy;
pub use runner::*;
pub use standard::StandardDeploy;
pub use strategy::*;
