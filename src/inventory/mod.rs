pub mod error;
pub mod loader;
pub mod machine;
pub mod model;
pub mod variables;

pub use error::*;
pub use loader::*;
pub use machine::*;
pub use model::*;
pub use variables::*;
