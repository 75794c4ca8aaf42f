//! Database module for PostgreSQL persistence.

mod authz;
mod boards;
mod pool;
mod store;

pub use authz::*;
pub use boards::*;
pub use pool::*;
pub use store::*;
