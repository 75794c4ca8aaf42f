//! Request handlers for boards and ordering.

mod boards;
mod ordering;

pub use boards::*;
pub use ordering::*;
