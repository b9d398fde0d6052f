pub mod layout;
pub mod vars;

pub use layout::*;
pub use vars::*;
