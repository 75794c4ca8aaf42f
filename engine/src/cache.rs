//! Client-side optimistic mirror of container orderings.
//!
//! A drag result is applied to [`OrderCache`] immediately so the UI never
//! waits on the network. Each applied intent gets a fresh sequence number for
//! every container it touches; the server's answer is matched back through
//! those tickets.
//!
//! # Reconciliation rules
//!
//! 1. A ticket older than the newest issued for its container is stale; that
//!    container is left alone. An answer whose tickets are all stale is ignored
//! 2. Success needs no correction; the local order of each current container
//!    becomes the confirmed one
//! 3. Failure restores the last confirmed order of each current container,
//!    flags it for reload and queues a notification

use crate::{
    error::{Error, ErrorKind, Result},
    Ack, ContainerId, ItemId, ReorderIntent, Sequence,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `(container, sequence)` attached to a dispatched intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub container_id: ContainerId,
    pub sequence: Sequence,
}

/// An intent that has been applied locally and must now reach the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub intent: ReorderIntent,
    pub tickets: Vec<Ticket>,
}

/// What acknowledging a dispatch did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckEffect {
    /// Server agreed; nothing to correct.
    Confirmed,
    /// Every touched container has a newer local change; the answer was dropped.
    Stale,
    /// Server refused; local guess discarded for the containers listed in
    /// `tickets`, which need a refetch.
    Rollback { tickets: Vec<Ticket>, error: Error },
}

/// Short-lived message for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub containers: Vec<ContainerId>,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ContainerState {
    /// What the UI shows.
    pub(crate) order: Vec<ItemId>,
    /// Last order known to match the server.
    pub(crate) confirmed: Vec<ItemId>,
    /// Highest sequence issued for this container.
    pub(crate) issued: Sequence,
    pub(crate) needs_reload: bool,
}

/// Per-container orderings plus sequence bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct OrderCache {
    pub(crate) containers: HashMap<ContainerId, ContainerState>,
    notifications: Vec<Notification>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install authoritative order for a container.
    pub fn replace(&mut self, container_id: impl Into<ContainerId>, ids: Vec<ItemId>) {
        let state = self.containers.entry(container_id.into()).or_default();
        state.confirmed = ids.clone();
        state.order = ids;
        state.needs_reload = false;
    }

    /// Install refetched order unless a newer local change was made since
    /// `ticket` was issued. Returns whether the order was replaced.
    pub fn refresh(&mut self, ticket: &Ticket, ids: Vec<ItemId>) -> bool {
        match self.containers.get(&ticket.container_id) {
            Some(state) if state.issued == ticket.sequence => {
                self.replace(ticket.container_id.clone(), ids);
                true
            }
            _ => false,
        }
    }

    /// Visible order of a container, if loaded.
    pub fn order(&self, container_id: &str) -> Option<&[ItemId]> {
        self.containers
            .get(container_id)
            .map(|state| state.order.as_slice())
    }

    /// Highest sequence issued for a container (0 if none).
    pub fn issued(&self, container_id: &str) -> Sequence {
        self.containers
            .get(container_id)
            .map_or(0, |state| state.issued)
    }

    pub fn needs_reload(&self, container_id: &str) -> bool {
        self.containers
            .get(container_id)
            .is_some_and(|state| state.needs_reload)
    }

    /// Current tickets of every container flagged for reload, by container ID.
    pub fn pending_reloads(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self
            .containers
            .iter()
            .filter(|(_, state)| state.needs_reload)
            .map(|(id, state)| Ticket {
                container_id: id.clone(),
                sequence: state.issued,
            })
            .collect();
        tickets.sort_by(|a, b| a.container_id.cmp(&b.container_id));
        tickets
    }

    /// Drain queued UI notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Apply a drag result locally and issue tickets for it.
    ///
    /// Rejects intents that cannot apply to what the cache holds; nothing is
    /// mutated in that case.
    pub fn apply(&mut self, intent: ReorderIntent) -> Result<Dispatch> {
        match &intent {
            ReorderIntent::Reorder {
                container_id,
                ordered_ids,
            } => {
                let state = self.loaded_mut(container_id)?;
                if !is_permutation(&state.order, ordered_ids) {
                    return Err(Error::Invalid(format!(
                        "order does not match cached items of container {container_id}"
                    )));
                }
                state.order = ordered_ids.clone();
            }
            ReorderIntent::Move {
                item_id,
                source_id,
                target_id,
                index,
            } => {
                let from = self
                    .loaded(source_id)?
                    .order
                    .iter()
                    .position(|id| id == item_id)
                    .ok_or_else(|| {
                        Error::Invalid(format!("item {item_id} is not cached in {source_id}"))
                    })?;
                self.loaded(target_id)?;

                let source = self.loaded_mut(source_id)?;
                let moved = source.order.remove(from);
                let target = self.loaded_mut(target_id)?;
                let at = index.resolve(target.order.len());
                target.order.insert(at, moved);
            }
        }

        let tickets = intent
            .containers()
            .into_iter()
            .map(|container_id| self.issue(container_id))
            .collect();
        Ok(Dispatch { intent, tickets })
    }

    /// Reconcile the server's answer to `dispatch`.
    ///
    /// Staleness is decided per container: tickets superseded by a newer
    /// local change are skipped, the rest are confirmed or rolled back.
    pub fn acknowledge(&mut self, dispatch: &Dispatch, outcome: &Result<Ack>) -> AckEffect {
        let (current, superseded): (Vec<&Ticket>, Vec<&Ticket>) = dispatch
            .tickets
            .iter()
            .partition(|ticket| !self.is_superseded(ticket));

        for ticket in &superseded {
            tracing::debug!(
                container = %ticket.container_id,
                sequence = ticket.sequence,
                newest = self.issued(&ticket.container_id),
                "ignoring stale acknowledgement"
            );
        }
        if current.is_empty() {
            return AckEffect::Stale;
        }

        match outcome {
            Ok(_) => {
                for ticket in &current {
                    if let Some(state) = self.containers.get_mut(&ticket.container_id) {
                        state.confirmed = state.order.clone();
                    }
                }
                AckEffect::Confirmed
            }
            Err(error) => {
                for ticket in &current {
                    if let Some(state) = self.containers.get_mut(&ticket.container_id) {
                        state.order = state.confirmed.clone();
                        state.needs_reload = true;
                    }
                }
                tracing::warn!(error = %error, "order change rejected, rolling back");
                let tickets: Vec<Ticket> = current.into_iter().cloned().collect();
                self.notify(
                    tickets.iter().map(|t| t.container_id.clone()).collect(),
                    error,
                );
                AckEffect::Rollback {
                    tickets,
                    error: error.clone(),
                }
            }
        }
    }

    /// Record that refetching `container_id` failed; it stays flagged.
    pub fn reload_failed(&mut self, container_id: &str, error: &Error) {
        tracing::warn!(container = container_id, error = %error, "reload failed");
        self.notify(vec![container_id.to_string()], error);
    }

    fn notify(&mut self, containers: Vec<ContainerId>, error: &Error) {
        self.notifications.push(Notification {
            containers,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    fn is_superseded(&self, ticket: &Ticket) -> bool {
        self.containers
            .get(&ticket.container_id)
            .map_or(true, |state| ticket.sequence < state.issued)
    }

    fn issue(&mut self, container_id: &ContainerId) -> Ticket {
        let state = self.containers.entry(container_id.clone()).or_default();
        state.issued += 1;
        Ticket {
            container_id: container_id.clone(),
            sequence: state.issued,
        }
    }

    fn loaded(&self, container_id: &str) -> Result<&ContainerState> {
        self.containers
            .get(container_id)
            .ok_or_else(|| Error::NotFound(format!("container {container_id} is not loaded")))
    }

    fn loaded_mut(&mut self, container_id: &str) -> Result<&mut ContainerState> {
        self.containers
            .get_mut(container_id)
            .ok_or_else(|| Error::NotFound(format!("container {container_id} is not loaded")))
    }
}

fn is_permutation(current: &[ItemId], proposed: &[ItemId]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let mut a: Vec<&ItemId> = current.iter().collect();
    let mut b: Vec<&ItemId> = proposed.iter().collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b && b.windows(2).all(|pair| pair[0] != pair[1])
}

/// The server as seen from a client.
#[async_trait]
pub trait OrderingApi: Send + Sync {
    /// Send a reorder or move.
    async fn send(&self, intent: &ReorderIntent) -> Result<Ack>;

    /// Authoritative item order of a container.
    async fn fetch_order(&self, container_id: &str) -> Result<Vec<ItemId>>;
}

/// [`OrderCache`] wired to an [`OrderingApi`].
///
/// `submit` is synchronous so a UI loop can render the new order right away;
/// `complete` does the network round trip. The cache lock is never held
/// across an `.await`.
pub struct OptimisticSession<A> {
    api: A,
    cache: Mutex<OrderCache>,
}

impl<A: OrderingApi> OptimisticSession<A> {
    pub fn new(api: A) -> Self {
        Self::with_cache(api, OrderCache::new())
    }

    /// Start from a restored cache (see [`crate::CacheSnapshot`]).
    pub fn with_cache(api: A, cache: OrderCache) -> Self {
        Self {
            api,
            cache: Mutex::new(cache),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn cache(&self) -> MutexGuard<'_, OrderCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch and install a container's authoritative order.
    pub async fn load(&self, container_id: &str) -> Result<()> {
        let ids = self.api.fetch_order(container_id).await?;
        self.cache().replace(container_id, ids);
        Ok(())
    }

    /// Apply an intent locally; the returned dispatch goes to [`Self::complete`].
    pub fn submit(&self, intent: ReorderIntent) -> Result<Dispatch> {
        self.cache().apply(intent)
    }

    /// Send a dispatch, reconcile the answer and refetch on rollback.
    pub async fn complete(&self, dispatch: Dispatch) -> AckEffect {
        let outcome = self.api.send(&dispatch.intent).await;
        let effect = self.cache().acknowledge(&dispatch, &outcome);

        if let AckEffect::Rollback { tickets, .. } = &effect {
            self.refetch(tickets).await;
        }

        effect
    }

    /// Refetch every container flagged for reload, e.g. after restoring a
    /// snapshot. Returns how many orders were installed.
    pub async fn reload_flagged(&self) -> usize {
        let tickets = self.cache().pending_reloads();
        self.refetch(&tickets).await
    }

    async fn refetch(&self, tickets: &[Ticket]) -> usize {
        let mut installed = 0;
        for ticket in tickets {
            match self.api.fetch_order(&ticket.container_id).await {
                Ok(ids) => {
                    if self.cache().refresh(ticket, ids) {
                        installed += 1;
                    } else {
                        tracing::debug!(
                            container = %ticket.container_id,
                            "newer local change, keeping it over refetched order"
                        );
                    }
                }
                Err(err) => self.cache().reload_failed(&ticket.container_id, &err),
            }
        }
        installed
    }

    /// `submit` followed by `complete`.
    pub async fn drag_end(&self, intent: ReorderIntent) -> Result<AckEffect> {
        let dispatch = self.submit(intent)?;
        Ok(self.complete(dispatch).await)
    }

    pub fn order(&self, container_id: &str) -> Option<Vec<ItemId>> {
        self.cache().order(container_id).map(<[ItemId]>::to_vec)
    }

    pub fn needs_reload(&self, container_id: &str) -> bool {
        self.cache().needs_reload(container_id)
    }

    pub fn take_notifications(&self) -> Vec<Notification> {
        self.cache().take_notifications()
    }

    /// Copy of the cache, e.g. for [`crate::CacheSnapshot::from_cache`].
    pub fn cache_copy(&self) -> OrderCache {
        self.cache().clone()
    }
}
