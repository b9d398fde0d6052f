//! Module references, resolution, parameters and the execution protocol.

pub mod error;
pub mod module;
pub mod params;
pub mod phase;
pub mod resolver;
pub mod result;

pub use error::*;
pub use module::*;
pub use params::*;
pub use phase::*;
pub use resolver::*;
pub use result::*;
