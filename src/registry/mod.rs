//! # Handler Registry
//!
//! Explicit dispatch wiring for the engine: the work definition factory plus the
//! kind-to-handler table. Registration happens once at process startup; execution
//! only ever reads.

pub mod handler_registry;

pub use handler_registry::ActivityHandlerRegistry;
