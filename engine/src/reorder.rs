//! Wholesale position rewrite for an explicit ordering.
//!
//! # Algorithm
//!
//! 1. Validate that the given IDs are exactly the container's members
//! 2. Pick a base: the clock reading, raised above every current sibling.
//!    When that leaves no room below `i64::MAX`, the run goes just under
//!    the lowest sibling instead
//! 3. Write `position(id) = base + index` for each ID in order
//!
//! The same rewrite is reused by [`crate::MoveCoordinator`] and
//! [`crate::IntegrityScanner`].

use crate::{
    authz::{ensure_can_write, Authorizer},
    clock::Clock,
    error::{Error, Result},
    store::{require_container, OrderingStore},
    Ack, Item, ItemId, Position,
};
use std::collections::HashSet;
use std::sync::Arc;

/// First position of a rewrite over `siblings`.
///
/// `now` normally exceeds every stored position already. When it does not
/// (two rewrites in one tick, a lagging clock, a jittered retry value) the
/// base is lifted just past the current maximum so the rewrite cannot
/// collide with its own siblings.
pub fn rewrite_base(now: Position, siblings: &[Item]) -> Position {
    siblings
        .iter()
        .map(|item| item.position.saturating_add(1))
        .max()
        .map_or(now, |floor| now.max(floor))
}

/// Write each `(item, position)` into `container_id`, in order.
///
/// A failure before anything was written keeps its own kind. A failure after
/// at least one write leaves the container half rewritten and is reported as
/// [`Error::Transient`]; re-running the full rewrite is safe.
pub(crate) async fn apply_placements(
    store: &dyn OrderingStore,
    container_id: &str,
    placements: &[(ItemId, Position)],
) -> Result<usize> {
    let mut written = 0;
    for (item_id, position) in placements {
        match store.place(item_id, container_id, *position).await {
            Ok(()) => written += 1,
            Err(err) if written == 0 => return Err(err.into()),
            Err(err) => {
                tracing::warn!(
                    container = container_id,
                    written,
                    total = placements.len(),
                    error = %err,
                    "rewrite interrupted"
                );
                return Err(Error::Transient(format!(
                    "rewrite of container {container_id} interrupted after {written} of {} writes: {err}",
                    placements.len()
                )));
            }
        }
    }
    Ok(written)
}

/// Base for a run of `count` consecutive positions over `siblings`.
///
/// Prefers [`rewrite_base`]. If `base + count - 1` would overflow, the run
/// is placed entirely below the lowest sibling, which still never collides
/// with a sibling that has not been rewritten yet.
pub(crate) fn placement_base(now: Position, siblings: &[Item], count: usize) -> Result<Position> {
    let span = Position::try_from(count)
        .map_err(|_| Error::Invalid(format!("cannot place {count} items")))?;
    let base = rewrite_base(now, siblings);
    if span == 0 || base.checked_add(span - 1).is_some() {
        return Ok(base);
    }

    let lowest = siblings
        .iter()
        .map(|item| item.position)
        .min()
        .unwrap_or(now);
    match lowest.checked_sub(span) {
        Some(below) => {
            tracing::warn!(base, below, count, "no room above siblings, placing below");
            Ok(below)
        }
        None => Err(Error::Invalid(format!(
            "no room left to place {count} items"
        ))),
    }
}

/// `(id, base + index)` for an ordered list of IDs. `base` comes from
/// [`placement_base`] so the additions cannot overflow.
pub(crate) fn sequential_placements(ids: &[ItemId], base: Position) -> Vec<(ItemId, Position)> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| (id.clone(), base + index as Position))
        .collect()
}

/// Checks that `ordered_ids` is a permutation of the container's members.
pub(crate) fn check_membership(
    container_id: &str,
    siblings: &[Item],
    ordered_ids: &[ItemId],
) -> Result<()> {
    let members: HashSet<&str> = siblings.iter().map(|item| item.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(ordered_ids.len());

    for id in ordered_ids {
        if !members.contains(id.as_str()) {
            return Err(Error::Invalid(format!(
                "item {id} does not belong to container {container_id}"
            )));
        }
        if !seen.insert(id.as_str()) {
            return Err(Error::Invalid(format!("item {id} listed more than once")));
        }
    }

    if seen.len() != members.len() {
        let mut missing: Vec<&str> = members.difference(&seen).copied().collect();
        missing.sort_unstable();
        return Err(Error::Invalid(format!(
            "order for container {container_id} is missing items: {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

/// Rewrites a container's positions to match a caller-supplied order.
#[derive(Clone)]
pub struct ReorderCoordinator {
    store: Arc<dyn OrderingStore>,
    authz: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
}

impl ReorderCoordinator {
    pub fn new(
        store: Arc<dyn OrderingStore>,
        authz: Arc<dyn Authorizer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            authz,
            clock,
        }
    }

    /// Make `ordered_ids` the visible order of `container_id`.
    ///
    /// Re-running with the same list yields the same read-back order even
    /// though the stored numbers change.
    pub async fn reorder(
        &self,
        principal: &str,
        container_id: &str,
        ordered_ids: &[ItemId],
    ) -> Result<Ack> {
        let container = require_container(&*self.store, container_id).await?;
        ensure_can_write(&*self.authz, principal, &container.id).await?;

        let siblings = self.store.items_in(&container.id).await?;
        check_membership(&container.id, &siblings, ordered_ids)?;

        self.rewrite(&container.id, &siblings, ordered_ids).await
    }

    /// Rewrite without validation or authorization; callers have done both.
    pub(crate) async fn rewrite(
        &self,
        container_id: &str,
        siblings: &[Item],
        ordered_ids: &[ItemId],
    ) -> Result<Ack> {
        let base = placement_base(self.clock.now_millis(), siblings, ordered_ids.len())?;
        let placements = sequential_placements(ordered_ids, base);
        let written = apply_placements(&*self.store, container_id, &placements).await?;

        tracing::debug!(container = container_id, base, written, "container reordered");
        Ok(Ack {
            containers: vec![container_id.to_string()],
            written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ItemKind, MemoryStore};

    fn card(id: &str, position: Position) -> Item {
        Item::new(id, ItemKind::Card, "col-1", position, 0)
    }

    fn ids(values: &[&str]) -> Vec<ItemId> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn base_is_the_clock_when_ahead() {
        let siblings = vec![card("a", 100), card("b", 200)];
        assert_eq!(rewrite_base(5_000, &siblings), 5_000);
        assert_eq!(rewrite_base(5_000, &[]), 5_000);
    }

    #[test]
    fn base_is_lifted_above_siblings_when_clock_lags() {
        let siblings = vec![card("a", 100), card("b", 7_000)];
        assert_eq!(rewrite_base(5_000, &siblings), 7_001);
    }

    #[test]
    fn base_leaves_room_for_the_whole_run() {
        let siblings = vec![card("a", Position::MAX - 10), card("b", 5)];
        assert_eq!(placement_base(5_000, &siblings, 2).unwrap(), Position::MAX - 9);
        assert_eq!(placement_base(5_000, &[], 0).unwrap(), 5_000);
    }

    #[test]
    fn base_drops_below_siblings_when_the_top_is_full() {
        let siblings = vec![card("a", Position::MAX), card("b", 5)];
        assert_eq!(placement_base(5_000, &siblings, 2).unwrap(), 3);

        let siblings = vec![card("a", Position::MAX - 1), card("b", 40)];
        assert_eq!(placement_base(5_000, &siblings, 2).unwrap(), 38);
    }

    #[test]
    fn base_fails_when_the_whole_range_is_taken() {
        let siblings = vec![card("a", Position::MAX), card("b", Position::MIN)];
        let err = placement_base(0, &siblings, 2).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Invalid);
    }

    #[test]
    fn membership_accepts_permutations() {
        let siblings = vec![card("a", 1), card("b", 2), card("c", 3)];
        check_membership("col-1", &siblings, &ids(&["c", "a", "b"])).unwrap();
        check_membership("col-1", &[], &[]).unwrap();
    }

    #[test]
    fn membership_rejects_foreign_duplicate_and_missing() {
        let siblings = vec![card("a", 1), card("b", 2), card("c", 3)];

        let err = check_membership("col-1", &siblings, &ids(&["a", "b", "z"])).unwrap_err();
        assert_eq!(
            err,
            Error::Invalid("item z does not belong to container col-1".into())
        );

        let err = check_membership("col-1", &siblings, &ids(&["a", "a", "b"])).unwrap_err();
        assert_eq!(err, Error::Invalid("item a listed more than once".into()));

        let err = check_membership("col-1", &siblings, &ids(&["b"])).unwrap_err();
        assert_eq!(
            err,
            Error::Invalid("order for container col-1 is missing items: a, c".into())
        );
    }

    #[test]
    fn placements_are_sequential() {
        assert_eq!(
            sequential_placements(&ids(&["x", "y"]), 900),
            vec![("x".to_string(), 900), ("y".to_string(), 901)]
        );
    }

    #[tokio::test]
    async fn first_write_failure_keeps_its_kind() {
        let store = MemoryStore::new();
        store.add_container(crate::Container::column("col-1")).unwrap();

        let err = apply_placements(&store, "col-1", &[("ghost".into(), 1)])
            .await
            .unwrap_err();
        assert_eq!(err, Error::NotFound("item ghost".into()));
    }

    #[tokio::test]
    async fn later_write_failure_is_transient() {
        let store = MemoryStore::new();
        store.add_container(crate::Container::column("col-1")).unwrap();
        store.seed_item(card("a", 1)).unwrap();

        let err = apply_placements(&store, "col-1", &[("a".into(), 10), ("ghost".into(), 11)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transient(_)), "got {err:?}");
        assert_eq!(store.writes(), 1);
    }
}
