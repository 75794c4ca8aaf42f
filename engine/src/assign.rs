//! Append positions for newly created items.

use crate::{clock::Clock, Position};
use std::sync::Arc;

/// Hands out a position greater than any sibling's at the moment of the call.
///
/// The key is the clock reading itself, so no sibling read is needed. Two
/// calls within one millisecond return the same value; the store's
/// uniqueness check catches that and [`crate::ConflictResolver`] retries.
#[derive(Clone)]
pub struct PositionAssigner {
    clock: Arc<dyn Clock>,
}

impl PositionAssigner {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Position for an item appended to `container_id`.
    pub fn assign(&self, container_id: &str) -> Position {
        let position = self.clock.now_millis();
        tracing::trace!(container = container_id, position, "assigned append position");
        position
    }
}
