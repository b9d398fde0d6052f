//! Per-machine task execution.

pub mod invocation;
pub mod report;
pub mod task_engine;
pub mod vars;

pub use invocation::ModuleInvocation;
pub use report::*;
pub use task_engine::TaskEngine;
pub use vars::*;
