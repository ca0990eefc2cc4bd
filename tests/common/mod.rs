pub mod builders;
pub mod flaky_store;
pub mod handlers;
pub mod strategies;

pub use builders::*;
pub use flaky_store::*;
pub use handlers::*;
