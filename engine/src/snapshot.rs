//! Snapshot types for persisting and restoring a client's order cache.
//!
//! A client restores its last known ordering on restart. In-flight
//! dispatches are not persisted, so a container whose visible order was never
//! confirmed keeps its confirmed order alongside and comes back flagged for
//! reload.

use crate::{
    cache::{ContainerState, OrderCache},
    error::{Error, Result},
    ContainerId, ItemId, Sequence,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// One container's cached order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedOrder {
    /// Item IDs in visible order
    pub order: Vec<ItemId>,
    /// Last server-confirmed order, when it differs from `order`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<Vec<ItemId>>,
    /// Highest sequence issued so far; restored so numbering keeps increasing
    pub issued: Sequence,
    #[serde(default)]
    pub needs_reload: bool,
}

/// A point-in-time snapshot of an [`OrderCache`].
///
/// Uses BTreeMap instead of HashMap for deterministic serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Cached orders keyed by container ID
    pub containers: BTreeMap<ContainerId, CachedOrder>,
}

impl Default for CacheSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            containers: BTreeMap::new(),
        }
    }

    /// Capture the visible and confirmed order of every loaded container.
    pub fn from_cache(cache: &OrderCache) -> Self {
        let containers = cache
            .containers
            .iter()
            .map(|(id, state)| {
                (
                    id.clone(),
                    CachedOrder {
                        order: state.order.clone(),
                        confirmed: (state.confirmed != state.order)
                            .then(|| state.confirmed.clone()),
                        issued: state.issued,
                        needs_reload: state.needs_reload,
                    },
                )
            })
            .collect();
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            containers,
        }
    }

    /// Rebuild a cache.
    ///
    /// A container with unconfirmed changes is flagged for reload: the answer
    /// that would have confirmed or rolled them back is gone.
    pub fn into_cache(self) -> OrderCache {
        let mut cache = OrderCache::new();
        for (id, cached) in self.containers {
            let unconfirmed = cached.confirmed.is_some();
            cache.containers.insert(
                id,
                ContainerState {
                    confirmed: cached.confirmed.unwrap_or_else(|| cached.order.clone()),
                    order: cached.order,
                    issued: cached.issued,
                    needs_reload: cached.needs_reload || unconfirmed,
                },
            );
        }
        cache
    }

    /// Count cached items across all containers.
    pub fn item_count(&self) -> usize {
        self.containers.values().map(|c| c.order.len()).sum()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Invalid(format!("cache snapshot: {e}")))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| Error::Invalid(format!("cache snapshot: {e}")))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::Invalid(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}
