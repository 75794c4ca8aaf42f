//! # Ordo Engine
//!
//! Ordering for boards, columns and cards: where a new item lands, how a
//! container is reordered, how an item moves between containers, and how a
//! client keeps its view consistent while changes are in flight.
//!
//! ## Design Principles
//!
//! - **Storage behind a trait**: the engine talks to an [`OrderingStore`];
//!   [`MemoryStore`] ships for tests and embedding
//! - **Injected time**: every position comes from a [`Clock`], so tests can
//!   pin it with [`ManualClock`]
//! - **Explicit failures**: every operation returns an [`Error`] with a
//!   machine-readable [`ErrorKind`]
//!
//! ## Core Concepts
//!
//! ### Positions
//!
//! A position is an integer sort key. Items are read in `(position, id)`
//! order. New items take the current time in milliseconds, so they sort
//! after everything created earlier. A collision under a unique constraint
//! is retried by the [`ConflictResolver`] with a jittered key.
//!
//! ### Reorder and move
//!
//! - [`ReorderCoordinator`] rewrites one container to match a full order
//! - [`MoveCoordinator`] reparents one item and rewrites the target only
//!
//! ### Maintenance
//!
//! The [`IntegrityScanner`] finds containers whose items share a position
//! and rewrites them in creation order.
//!
//! ### Client cache
//!
//! [`OrderCache`] applies drag results optimistically and reconciles the
//! server's answers with per-container sequence numbers.
//!
//! ## Quick Start
//!
//! ```rust
//! use ordo_engine::{AckEffect, Error, OrderCache, ReorderIntent, TargetIndex};
//!
//! let mut cache = OrderCache::new();
//! cache.replace("todo", vec!["a".into(), "b".into()]);
//! cache.replace("done", vec![]);
//!
//! // Drag "a" into "done"; the cache updates immediately.
//! let dispatch = cache
//!     .apply(ReorderIntent::move_item("a", "todo", "done", TargetIndex::Append))
//!     .unwrap();
//! assert_eq!(cache.order("done").unwrap(), ["a".to_string()].as_slice());
//!
//! // The server refused: the last confirmed order comes back.
//! let effect = cache.acknowledge(&dispatch, &Err(Error::Transient("offline".into())));
//! assert!(matches!(effect, AckEffect::Rollback { .. }));
//! assert_eq!(cache.order("todo").unwrap().len(), 2);
//! assert!(cache.needs_reload("done"));
//! ```
//!
//! ## Persistence
//!
//! Use [`CacheSnapshot::from_cache`] and [`CacheSnapshot::into_cache`] to
//! keep a client's ordering across restarts. Snapshots serialize to JSON
//! with deterministic ordering.

pub mod assign;
pub mod authz;
pub mod cache;
pub mod clock;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod model;
pub mod relocate;
pub mod reorder;
pub mod scanner;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use assign::PositionAssigner;
pub use authz::{AllowAll, Authorizer, StaticAcl};
pub use cache::{AckEffect, Dispatch, Notification, OptimisticSession, OrderCache, OrderingApi, Ticket};
pub use clock::{Clock, FixedJitter, Jitter, ManualClock, RandomJitter, SystemClock};
pub use conflict::{ConflictResolver, ResolverConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_JITTER};
pub use engine::{EngineBuilder, OrderingEngine};
pub use error::{Error, ErrorKind};
pub use model::{Ack, Container, ContainerKind, Item, ItemKind, NewItem, ReorderIntent, TargetIndex};
pub use relocate::MoveCoordinator;
pub use reorder::{rewrite_base, ReorderCoordinator};
pub use scanner::{has_duplicate_positions, IntegrityScanner, ScanReport};
pub use snapshot::{CacheSnapshot, CachedOrder, SNAPSHOT_FORMAT_VERSION};
pub use store::{MemoryStore, OrderingStore, StoreError, StoreResult};

/// Type aliases for clarity
pub type ItemId = String;
pub type ContainerId = String;
pub type Principal = String;
pub type Position = i64;
pub type Timestamp = i64;
pub type Sequence = u64;
