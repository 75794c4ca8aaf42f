//! Bounded retry for position-carrying writes.

use crate::{
    clock::{Clock, Jitter},
    error::{Error, Result},
    store::{StoreError, StoreResult},
    Position,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Total write attempts, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Upper bound (inclusive) of the random offset added on retry.
pub const DEFAULT_MAX_JITTER: i64 = 9_999;

/// Retry policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    pub max_attempts: u32,
    pub max_jitter: i64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

/// Wraps one position-carrying write and retries it on a uniqueness violation.
///
/// A retry regenerates the position as `now + jitter(0..=max_jitter)`. After
/// `max_attempts` collisions the write fails with [`Error::Conflict`]. Every
/// other store error is returned immediately.
#[derive(Clone)]
pub struct ConflictResolver {
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
    config: ResolverConfig,
}

impl ConflictResolver {
    pub fn new(clock: Arc<dyn Clock>, jitter: Arc<dyn Jitter>, config: ResolverConfig) -> Self {
        let config = ResolverConfig {
            max_attempts: config.max_attempts.max(1),
            max_jitter: config.max_jitter.max(0),
        };
        Self {
            clock,
            jitter,
            config,
        }
    }

    pub fn config(&self) -> ResolverConfig {
        self.config
    }

    /// Run `write` with `first` and retry with fresh positions on collision.
    ///
    /// Returns the write's output together with the position that stuck.
    pub async fn write<T, F, Fut>(
        &self,
        container_id: &str,
        first: Position,
        mut write: F,
    ) -> Result<(T, Position)>
    where
        F: FnMut(Position) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut position = first;
        let mut attempt = 1;

        loop {
            match write(position).await {
                Ok(output) => return Ok((output, position)),
                Err(StoreError::UniqueViolation { .. }) if attempt < self.config.max_attempts => {
                    let retry = self.regenerate();
                    tracing::warn!(
                        container = container_id,
                        position,
                        retry,
                        attempt,
                        "position collision, retrying"
                    );
                    position = retry;
                    attempt += 1;
                }
                Err(StoreError::UniqueViolation { .. }) => {
                    tracing::warn!(
                        container = container_id,
                        position,
                        attempts = attempt,
                        "position collision persisted, giving up"
                    );
                    return Err(Error::Conflict {
                        container: container_id.to_string(),
                        attempts: attempt,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn regenerate(&self) -> Position {
        self.clock
            .now_millis()
            .saturating_add(self.jitter.next(self.config.max_jitter))
    }
}
