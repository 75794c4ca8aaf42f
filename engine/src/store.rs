//! Persistence boundary and the in-memory store.
//!
//! The engine never talks to a database directly. Everything it needs from
//! persistence goes through [`OrderingStore`]: container/item lookups, an
//! ordered sibling read, item creation and a single-record `(parent, position)`
//! update. Stores may enforce uniqueness of `(container, position)`; when they
//! do, a collision must come back as [`StoreError::UniqueViolation`].

use crate::{
    error::{Error, Result},
    Container, ContainerId, Item, ItemId, Position,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors reported by a store implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `(container, position)` is already taken by another item.
    #[error("position {position} already taken in container '{container}'")]
    UniqueViolation {
        container: ContainerId,
        position: Position,
    },

    /// An item with this ID already exists.
    #[error("item already exists: {0}")]
    AlreadyExists(ItemId),

    /// The record addressed by a write does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// I/O failure, lost connection, poisoned state.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { container, .. } => Error::Conflict {
                container,
                attempts: 1,
            },
            StoreError::AlreadyExists(id) => Error::Invalid(format!("item already exists: {id}")),
            StoreError::NotFound(what) => Error::NotFound(what),
            StoreError::Unavailable(reason) => Error::Transient(reason),
        }
    }
}

/// Persistence collaborator for the ordering engine.
#[async_trait]
pub trait OrderingStore: Send + Sync {
    /// Look up one container.
    async fn container(&self, id: &str) -> StoreResult<Option<Container>>;

    /// Every container, boards and columns alike.
    async fn containers(&self) -> StoreResult<Vec<Container>>;

    /// Look up one item.
    async fn item(&self, id: &str) -> StoreResult<Option<Item>>;

    /// Items of one container ordered by `(position, id)`.
    async fn items_in(&self, container_id: &str) -> StoreResult<Vec<Item>>;

    /// Create an item with its position already assigned.
    async fn insert_item(&self, item: &Item) -> StoreResult<()>;

    /// Atomically set an item's parent and position.
    async fn place(&self, item_id: &str, container_id: &str, position: Position)
        -> StoreResult<()>;
}

pub(crate) async fn require_container(store: &dyn OrderingStore, id: &str) -> Result<Container> {
    store
        .container(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("container {id}")))
}

pub(crate) async fn require_item(store: &dyn OrderingStore, id: &str) -> Result<Item> {
    store
        .item(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("item {id}")))
}

/// Sort key used for every sibling listing.
pub(crate) fn sort_siblings(items: &mut [Item]) {
    items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
}

#[derive(Debug, Default)]
struct MemoryState {
    containers: HashMap<ContainerId, Container>,
    items: HashMap<ItemId, Item>,
}

/// In-memory [`OrderingStore`].
///
/// Uniqueness of `(container, position)` is optional so both store flavours
/// can be exercised. Seeding helpers bypass the constraint, which is how
/// tests plant corrupted data for the scanner.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    unique_positions: bool,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store without a uniqueness constraint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that rejects duplicate `(container, position)`.
    pub fn with_unique_positions() -> Self {
        Self {
            unique_positions: true,
            ..Self::default()
        }
    }

    /// Whether this store enforces position uniqueness.
    pub fn enforces_unique_positions(&self) -> bool {
        self.unique_positions
    }

    /// Register a container.
    pub fn add_container(&self, container: Container) -> StoreResult<()> {
        self.lock()?
            .containers
            .insert(container.id.clone(), container);
        Ok(())
    }

    /// Insert or overwrite an item without any checks or write accounting.
    pub fn seed_item(&self, item: Item) -> StoreResult<()> {
        self.lock()?.items.insert(item.id.clone(), item);
        Ok(())
    }

    /// Number of successful `insert_item`/`place` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// IDs of a container's items in visible order.
    pub fn order_of(&self, container_id: &str) -> StoreResult<Vec<ItemId>> {
        Ok(self
            .siblings(&*self.lock()?, container_id)
            .into_iter()
            .map(|item| item.id)
            .collect())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn siblings(&self, state: &MemoryState, container_id: &str) -> Vec<Item> {
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|item| item.container_id == container_id)
            .cloned()
            .collect();
        sort_siblings(&mut items);
        items
    }

    fn check_free(
        &self,
        state: &MemoryState,
        item_id: &str,
        container_id: &str,
        position: Position,
    ) -> StoreResult<()> {
        if !self.unique_positions {
            return Ok(());
        }
        let taken = state.items.values().any(|other| {
            other.id != item_id && other.container_id == container_id && other.position == position
        });
        if taken {
            return Err(StoreError::UniqueViolation {
                container: container_id.to_string(),
                position,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderingStore for MemoryStore {
    async fn container(&self, id: &str) -> StoreResult<Option<Container>> {
        Ok(self.lock()?.containers.get(id).cloned())
    }

    async fn containers(&self) -> StoreResult<Vec<Container>> {
        let mut containers: Vec<Container> = self.lock()?.containers.values().cloned().collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(containers)
    }

    async fn item(&self, id: &str) -> StoreResult<Option<Item>> {
        Ok(self.lock()?.items.get(id).cloned())
    }

    async fn items_in(&self, container_id: &str) -> StoreResult<Vec<Item>> {
        let state = self.lock()?;
        Ok(self.siblings(&state, container_id))
    }

    async fn insert_item(&self, item: &Item) -> StoreResult<()> {
        let mut state = self.lock()?;
        if !state.containers.contains_key(&item.container_id) {
            return Err(StoreError::NotFound(format!(
                "container {}",
                item.container_id
            )));
        }
        if state.items.contains_key(&item.id) {
            return Err(StoreError::AlreadyExists(item.id.clone()));
        }
        self.check_free(&state, &item.id, &item.container_id, item.position)?;

        state.items.insert(item.id.clone(), item.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn place(
        &self,
        item_id: &str,
        container_id: &str,
        position: Position,
    ) -> StoreResult<()> {
        let mut state = self.lock()?;
        if !state.containers.contains_key(container_id) {
            return Err(StoreError::NotFound(format!("container {container_id}")));
        }
        if !state.items.contains_key(item_id) {
            return Err(StoreError::NotFound(format!("item {item_id}")));
        }
        self.check_free(&state, item_id, container_id, position)?;

        if let Some(item) = state.items.get_mut(item_id) {
            item.container_id = container_id.to_string();
            item.position = position;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
