//! The upward-facing API: one object wiring the coordinators together.

use crate::{
    assign::PositionAssigner,
    authz::{ensure_can_write, Authorizer},
    clock::{Clock, Jitter, RandomJitter, SystemClock},
    conflict::{ConflictResolver, ResolverConfig},
    error::{Error, Result},
    relocate::MoveCoordinator,
    reorder::ReorderCoordinator,
    scanner::{IntegrityScanner, ScanReport},
    store::{require_container, OrderingStore},
    Ack, Item, ItemId, NewItem, Position, TargetIndex,
};
use std::sync::Arc;

/// Assign, reorder, move and scan over one store.
///
/// Holds no mutable state of its own; share it behind an `Arc`.
#[derive(Clone)]
pub struct OrderingEngine {
    store: Arc<dyn OrderingStore>,
    authz: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
    assigner: PositionAssigner,
    resolver: ConflictResolver,
    reorderer: ReorderCoordinator,
    mover: MoveCoordinator,
    scanner: IntegrityScanner,
}

/// Builder for [`OrderingEngine`]; defaults to the system clock, random
/// jitter and [`ResolverConfig::default`].
pub struct EngineBuilder {
    store: Arc<dyn OrderingStore>,
    authz: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
    resolver: ResolverConfig,
}

impl EngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver = config;
        self
    }

    pub fn build(self) -> OrderingEngine {
        let Self {
            store,
            authz,
            clock,
            jitter,
            resolver,
        } = self;

        OrderingEngine {
            assigner: PositionAssigner::new(clock.clone()),
            resolver: ConflictResolver::new(clock.clone(), jitter, resolver),
            reorderer: ReorderCoordinator::new(store.clone(), authz.clone(), clock.clone()),
            mover: MoveCoordinator::new(store.clone(), authz.clone(), clock.clone()),
            scanner: IntegrityScanner::new(store.clone(), clock.clone()),
            store,
            authz,
            clock,
        }
    }
}

impl OrderingEngine {
    pub fn builder(store: Arc<dyn OrderingStore>, authz: Arc<dyn Authorizer>) -> EngineBuilder {
        EngineBuilder {
            store,
            authz,
            clock: Arc::new(SystemClock),
            jitter: Arc::new(RandomJitter),
            resolver: ResolverConfig::default(),
        }
    }

    /// Engine with all defaults.
    pub fn new(store: Arc<dyn OrderingStore>, authz: Arc<dyn Authorizer>) -> Self {
        Self::builder(store, authz).build()
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        self.resolver.config()
    }

    /// Create `new_item` at the end of its container and return its position.
    ///
    /// Collisions are retried by the conflict resolver; if they persist the
    /// result is [`Error::Conflict`].
    pub async fn assign_position(&self, principal: &str, new_item: NewItem) -> Result<Position> {
        let container = require_container(&*self.store, &new_item.container_id).await?;
        if !new_item.kind.fits(container.kind) {
            return Err(Error::Invalid(format!(
                "a {} cannot be created in a {}",
                new_item.kind.as_str(),
                container.kind.as_str()
            )));
        }
        ensure_can_write(&*self.authz, principal, &container.id).await?;

        let created_at = self.clock.now_millis();
        let first = self.assigner.assign(&container.id);
        let store = self.store.clone();

        let ((), position) = self
            .resolver
            .write(&container.id, first, |position| {
                let store = store.clone();
                let item = Item::new(
                    new_item.id.clone(),
                    new_item.kind,
                    container.id.clone(),
                    position,
                    created_at,
                );
                async move { store.insert_item(&item).await }
            })
            .await?;

        tracing::debug!(
            item = %new_item.id,
            container = %container.id,
            position,
            "item created"
        );
        Ok(position)
    }

    /// See [`ReorderCoordinator::reorder`].
    pub async fn reorder(
        &self,
        principal: &str,
        container_id: &str,
        ordered_ids: &[ItemId],
    ) -> Result<Ack> {
        self.reorderer
            .reorder(principal, container_id, ordered_ids)
            .await
    }

    /// See [`MoveCoordinator::move_item`].
    pub async fn move_item(
        &self,
        principal: &str,
        item_id: &str,
        source_id: &str,
        target_id: &str,
        index: TargetIndex,
    ) -> Result<Ack> {
        self.mover
            .move_item(principal, item_id, source_id, target_id, index)
            .await
    }

    /// Authoritative order of a container, for clients that need to refetch.
    ///
    /// Reading requires the same grant as writing.
    pub async fn order_of(&self, principal: &str, container_id: &str) -> Result<Vec<Item>> {
        let container = require_container(&*self.store, container_id).await?;
        ensure_can_write(&*self.authz, principal, &container.id).await?;
        Ok(self.store.items_in(&container.id).await?)
    }

    /// See [`IntegrityScanner::scan`].
    pub async fn scan(&self) -> Result<ScanReport> {
        self.scanner.scan().await
    }
}
