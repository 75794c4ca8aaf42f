//! Moving an item between containers.

use crate::{
    authz::{ensure_can_write, Authorizer},
    clock::Clock,
    error::{Error, Result},
    reorder::{apply_placements, placement_base, ReorderCoordinator},
    store::{require_container, require_item, OrderingStore},
    Ack, ItemId, Position, TargetIndex,
};
use std::sync::Arc;

/// Relocates one item, placing it at an index among the target's items.
///
/// Only the target container is rewritten. The source keeps its remaining
/// items' keys, which still sort in the same relative order.
#[derive(Clone)]
pub struct MoveCoordinator {
    store: Arc<dyn OrderingStore>,
    authz: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
    reorder: ReorderCoordinator,
}

impl MoveCoordinator {
    pub fn new(
        store: Arc<dyn OrderingStore>,
        authz: Arc<dyn Authorizer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reorder = ReorderCoordinator::new(store.clone(), authz.clone(), clock.clone());
        Self {
            store,
            authz,
            clock,
            reorder,
        }
    }

    /// Move `item_id` from `source_id` to `index` within `target_id`.
    pub async fn move_item(
        &self,
        principal: &str,
        item_id: &str,
        source_id: &str,
        target_id: &str,
        index: TargetIndex,
    ) -> Result<Ack> {
        let item = require_item(&*self.store, item_id).await?;
        let source = require_container(&*self.store, source_id).await?;
        let target = require_container(&*self.store, target_id).await?;

        if item.container_id != source.id {
            return Err(Error::Invalid(format!(
                "item {} belongs to container {}, not {}",
                item.id, item.container_id, source.id
            )));
        }
        if !item.kind.fits(target.kind) {
            return Err(Error::Invalid(format!(
                "a {} cannot be placed in a {}",
                item.kind.as_str(),
                target.kind.as_str()
            )));
        }

        ensure_can_write(&*self.authz, principal, &source.id).await?;
        if target.id != source.id {
            ensure_can_write(&*self.authz, principal, &target.id).await?;
        }

        let siblings = self.store.items_in(&target.id).await?;
        let mut order: Vec<ItemId> = siblings
            .iter()
            .filter(|sibling| sibling.id != item.id)
            .map(|sibling| sibling.id.clone())
            .collect();
        let at = index.resolve(order.len());
        order.insert(at, item.id.clone());

        if target.id == source.id {
            return self.reorder.rewrite(&target.id, &siblings, &order).await;
        }

        // The moved item goes first: its single write is the reparent.
        let base = placement_base(self.clock.now_millis(), &siblings, order.len())?;
        let mut placements: Vec<(ItemId, Position)> = Vec::with_capacity(order.len());
        placements.push((item.id.clone(), base + at as Position));
        placements.extend(
            order
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != at)
                .map(|(i, id)| (id.clone(), base + i as Position)),
        );

        let written = apply_placements(&*self.store, &target.id, &placements).await?;

        tracing::debug!(
            item = %item.id,
            source = %source.id,
            target = %target.id,
            index = at,
            written,
            "item moved"
        );
        Ok(Ack {
            containers: vec![source.id, target.id],
            written,
        })
    }
}
