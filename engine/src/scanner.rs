//! Maintenance pass that repairs duplicated positions.

use crate::{
    clock::Clock,
    error::Result,
    reorder::{apply_placements, placement_base, sequential_placements},
    store::OrderingStore,
    Item, ItemId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub containers_scanned: usize,
    pub containers_repaired: usize,
    pub items_rewritten: usize,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.containers_repaired == 0
    }
}

/// Whether any two items share a position.
pub fn has_duplicate_positions(items: &[Item]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().any(|item| !seen.insert(item.position))
}

/// Visible order with ties broken by creation time, then ID.
fn sort_for_repair(items: &mut [Item]) {
    items.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Finds containers whose items share positions and rewrites them.
///
/// Repair keeps the visible order: items sort by position, and only tied
/// items fall back to `(created_at, id)`, so the older of two ends up first.
/// Items are never deleted or reparented, and a clean store sees no writes
/// at all.
#[derive(Clone)]
pub struct IntegrityScanner {
    store: Arc<dyn OrderingStore>,
    clock: Arc<dyn Clock>,
}

impl IntegrityScanner {
    pub fn new(store: Arc<dyn OrderingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn scan(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        for container in self.store.containers().await? {
            report.containers_scanned += 1;

            let mut items = self.store.items_in(&container.id).await?;
            if !has_duplicate_positions(&items) {
                continue;
            }

            tracing::warn!(
                container = %container.id,
                items = items.len(),
                "duplicate positions found"
            );

            sort_for_repair(&mut items);
            let base = placement_base(self.clock.now_millis(), &items, items.len())?;
            let ids: Vec<ItemId> = items.iter().map(|item| item.id.clone()).collect();
            let written = apply_placements(
                &*self.store,
                &container.id,
                &sequential_placements(&ids, base),
            )
            .await?;

            tracing::info!(container = %container.id, written, "positions repaired");
            report.containers_repaired += 1;
            report.items_rewritten += written;
        }

        if report.is_clean() {
            tracing::info!(
                containers = report.containers_scanned,
                "ordering integrity check passed"
            );
        } else {
            tracing::info!(
                containers = report.containers_scanned,
                repaired = report.containers_repaired,
                items = report.items_rewritten,
                "ordering integrity repaired"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemKind;

    fn card(id: &str, position: i64) -> Item {
        Item::new(id, ItemKind::Card, "col-1", position, 0)
    }

    #[test]
    fn detects_duplicates() {
        assert!(!has_duplicate_positions(&[]));
        assert!(!has_duplicate_positions(&[card("a", 1), card("b", 2)]));
        assert!(has_duplicate_positions(&[
            card("a", 1),
            card("b", 2),
            card("c", 1)
        ]));
    }

    #[test]
    fn repair_order_only_reorders_ties() {
        let mut items = vec![
            Item::new("first", ItemKind::Card, "col-1", 100, 3),
            Item::new("x", ItemKind::Card, "col-1", 200, 2),
            Item::new("y", ItemKind::Card, "col-1", 200, 1),
            Item::new("w", ItemKind::Card, "col-1", 200, 1),
        ];
        sort_for_repair(&mut items);
        let order: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(order, vec!["first", "w", "y", "x"]);
    }

    #[test]
    fn clean_report() {
        assert!(ScanReport::default().is_clean());
        let report = ScanReport {
            containers_scanned: 3,
            containers_repaired: 1,
            items_rewritten: 2,
        };
        assert!(!report.is_clean());
    }
}
