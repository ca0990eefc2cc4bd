//! # Execution Layer
//!
//! Run identity, cooperative cancellation, outcome classification, and the
//! scheduler-facing task runner.

pub mod context;
pub mod result;
pub mod runner;

pub use context::{ExecutionContext, StopSignal};
pub use result::TaskRunResult;
pub use runner::TaskRunner;
