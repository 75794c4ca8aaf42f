//! Client cache reconciliation against scripted and real servers.

use async_trait::async_trait;
use ordo_engine::error::Result;
use ordo_engine::{
    Ack, AckEffect, AllowAll, Authorizer, CacheSnapshot, Container, Error, ErrorKind, ItemId,
    ItemKind, ManualClock, MemoryStore, NewItem, OptimisticSession, OrderCache, OrderingApi,
    OrderingEngine, ReorderIntent, StaticAcl, TargetIndex,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn ids(values: &[&str]) -> Vec<ItemId> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Replays queued answers and serves fixed container orders.
#[derive(Default)]
struct ScriptedApi {
    answers: Mutex<VecDeque<Result<Ack>>>,
    orders: Mutex<HashMap<String, Vec<ItemId>>>,
    sent: Mutex<Vec<ReorderIntent>>,
    fetches: AtomicUsize,
}

impl ScriptedApi {
    fn with_orders(orders: &[(&str, &[&str])]) -> Self {
        let api = Self::default();
        {
            let mut map = api.orders.lock().unwrap();
            for (container, items) in orders {
                map.insert(container.to_string(), ids(items));
            }
        }
        api
    }

    fn answer(&self, outcome: Result<Ack>) {
        self.answers.lock().unwrap().push_back(outcome);
    }

    fn set_order(&self, container: &str, items: &[&str]) {
        self.orders
            .lock()
            .unwrap()
            .insert(container.to_string(), ids(items));
    }
}

#[async_trait]
impl OrderingApi for ScriptedApi {
    async fn send(&self, intent: &ReorderIntent) -> Result<Ack> {
        self.sent.lock().unwrap().push(intent.clone());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Ack::default()))
    }

    async fn fetch_order(&self, container_id: &str) -> Result<Vec<ItemId>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .unwrap()
            .get(container_id)
            .cloned()
            .ok_or_else(|| Error::Transient(format!("no route to {container_id}")))
    }
}

async fn session(api: ScriptedApi, containers: &[&str]) -> OptimisticSession<ScriptedApi> {
    let session = OptimisticSession::new(api);
    for container in containers {
        session.load(container).await.unwrap();
    }
    session
}

#[tokio::test]
async fn late_failure_of_an_older_move_only_reloads_its_current_containers() {
    let api = ScriptedApi::with_orders(&[("c1", &["a", "b"]), ("c2", &["z"]), ("c3", &[])]);
    let session = session(api, &["c1", "c2", "c3"]).await;

    let first = session
        .submit(ReorderIntent::move_item("a", "c1", "c2", TargetIndex::At(0)))
        .unwrap();
    let second = session
        .submit(ReorderIntent::move_item("a", "c2", "c3", TargetIndex::At(0)))
        .unwrap();

    // The second move is answered first and lands on the server.
    session.api().answer(Ok(Ack::default()));
    assert_eq!(session.complete(second).await, AckEffect::Confirmed);
    session.api().set_order("c1", &["b"]);
    session.api().set_order("c3", &["a"]);

    // The first one fails afterwards. c2 has moved on, c1 has not.
    session.api().answer(Err(Error::Transient("timeout".into())));
    match session.complete(first).await {
        AckEffect::Rollback { tickets, .. } => {
            let touched: Vec<&str> = tickets.iter().map(|t| t.container_id.as_str()).collect();
            assert_eq!(touched, vec!["c1"]);
        }
        other => panic!("expected rollback, got {other:?}"),
    }

    assert_eq!(session.order("c1").unwrap(), ids(&["b"]));
    assert_eq!(session.order("c2").unwrap(), ids(&["z"]));
    assert_eq!(session.order("c3").unwrap(), ids(&["a"]));
    assert!(!session.needs_reload("c1"));

    let notes = session.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].containers, ids(&["c1"]));
    assert_eq!(session.api().fetches.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn chained_moves_that_both_fail_bring_the_item_back() {
    let api = ScriptedApi::with_orders(&[("c1", &["a", "b"]), ("c2", &["z"]), ("c3", &[])]);
    let session = session(api, &["c1", "c2", "c3"]).await;

    let first = session
        .submit(ReorderIntent::move_item("a", "c1", "c2", TargetIndex::At(0)))
        .unwrap();
    let second = session
        .submit(ReorderIntent::move_item("a", "c2", "c3", TargetIndex::At(0)))
        .unwrap();

    session.api().answer(Err(Error::Forbidden {
        principal: "bob".into(),
        container: "c2".into(),
    }));
    session
        .api()
        .answer(Err(Error::Invalid("item a is not in container c2".into())));

    assert!(matches!(session.complete(first).await, AckEffect::Rollback { .. }));
    assert!(matches!(session.complete(second).await, AckEffect::Rollback { .. }));

    assert_eq!(session.order("c1").unwrap(), ids(&["a", "b"]));
    assert_eq!(session.order("c2").unwrap(), ids(&["z"]));
    assert_eq!(session.order("c3").unwrap(), Vec::<ItemId>::new());
    for container in ["c1", "c2", "c3"] {
        assert!(!session.needs_reload(container));
    }

    let kinds: Vec<ErrorKind> = session
        .take_notifications()
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(kinds, vec![ErrorKind::Forbidden, ErrorKind::Invalid]);
}

#[test]
fn chained_move_failures_flag_every_touched_container_without_refetch() {
    let mut cache = OrderCache::new();
    cache.replace("c1", ids(&["a", "b"]));
    cache.replace("c2", ids(&["z"]));
    cache.replace("c3", vec![]);

    let first = cache
        .apply(ReorderIntent::move_item("a", "c1", "c2", TargetIndex::At(0)))
        .unwrap();
    let second = cache
        .apply(ReorderIntent::move_item("a", "c2", "c3", TargetIndex::At(0)))
        .unwrap();

    cache.acknowledge(&first, &Err(Error::Transient("down".into())));
    cache.acknowledge(&second, &Err(Error::Transient("down".into())));

    assert_eq!(cache.order("c1").unwrap(), ids(&["a", "b"]).as_slice());
    assert_eq!(cache.order("c2").unwrap(), ids(&["z"]).as_slice());
    assert!(cache.order("c3").unwrap().is_empty());
    for container in ["c1", "c2", "c3"] {
        assert!(cache.needs_reload(container), "{container} not flagged");
    }
}

#[tokio::test]
async fn rejection_rolls_back_and_refetches() {
    let api = ScriptedApi::with_orders(&[("c1", &["a", "b", "c"])]);
    let session = session(api, &["c1"]).await;

    // Someone else reordered on the server meanwhile.
    session.api().set_order("c1", &["c", "b", "a"]);
    session.api().answer(Err(Error::Forbidden {
        principal: "bob".into(),
        container: "c1".into(),
    }));

    let effect = session
        .drag_end(ReorderIntent::reorder("c1", ids(&["b", "a", "c"])))
        .await
        .unwrap();

    assert!(matches!(effect, AckEffect::Rollback { .. }));
    assert_eq!(session.order("c1").unwrap(), ids(&["c", "b", "a"]));
    assert!(!session.needs_reload("c1"));

    let notes = session.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn failed_refetch_keeps_reload_flag() {
    let api = ScriptedApi::with_orders(&[("c1", &["a", "b"])]);
    let session = session(api, &["c1"]).await;

    session.api().orders.lock().unwrap().clear();
    session.api().answer(Err(Error::Transient("down".into())));

    session
        .drag_end(ReorderIntent::reorder("c1", ids(&["b", "a"])))
        .await
        .unwrap();

    assert_eq!(session.order("c1").unwrap(), ids(&["a", "b"]));
    assert!(session.needs_reload("c1"));
    let kinds: Vec<ErrorKind> = session
        .take_notifications()
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(kinds, vec![ErrorKind::Transient, ErrorKind::Transient]);
}

#[tokio::test]
async fn invalid_local_intent_is_never_sent() {
    let api = ScriptedApi::with_orders(&[("c1", &["a", "b"])]);
    let session = session(api, &["c1"]).await;

    let err = session
        .drag_end(ReorderIntent::reorder("c1", ids(&["a"])))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Invalid(_)));
    assert!(session.api().sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_restores_a_session() {
    let api = ScriptedApi::with_orders(&[("c1", &["a", "b"])]);
    let session = session(api, &["c1"]).await;
    session
        .drag_end(ReorderIntent::reorder("c1", ids(&["b", "a"])))
        .await
        .unwrap();

    let json = CacheSnapshot::from_cache(&session.cache_copy())
        .to_json()
        .unwrap();
    let restored = OptimisticSession::with_cache(
        ScriptedApi::default(),
        CacheSnapshot::from_json(&json).unwrap().into_cache(),
    );

    assert_eq!(restored.order("c1").unwrap(), ids(&["b", "a"]));
    assert!(!restored.needs_reload("c1"));
}

#[tokio::test]
async fn restored_unconfirmed_drag_is_reloaded_from_the_server() {
    let api = ScriptedApi::with_orders(&[("c1", &["a", "b"]), ("c2", &["z"])]);
    let session = session(api, &["c1", "c2"]).await;
    // Applied locally, but the process exits before the answer arrives.
    session
        .submit(ReorderIntent::move_item("a", "c1", "c2", TargetIndex::Append))
        .unwrap();

    let snapshot = CacheSnapshot::from_cache(&session.cache_copy());
    let restored = OptimisticSession::with_cache(
        ScriptedApi::with_orders(&[("c1", &["a", "b"]), ("c2", &["z"])]),
        snapshot.into_cache(),
    );
    assert!(restored.needs_reload("c1"));
    assert!(restored.needs_reload("c2"));

    assert_eq!(restored.reload_flagged().await, 2);
    assert_eq!(restored.order("c1").unwrap(), ids(&["a", "b"]));
    assert_eq!(restored.order("c2").unwrap(), ids(&["z"]));
    assert!(!restored.needs_reload("c1"));
    assert_eq!(restored.reload_flagged().await, 0);
}

// ============================================================================
// Against a real engine
// ============================================================================

/// Routes intents straight into an [`OrderingEngine`].
struct EngineApi {
    engine: OrderingEngine,
    principal: String,
}

#[async_trait]
impl OrderingApi for EngineApi {
    async fn send(&self, intent: &ReorderIntent) -> Result<Ack> {
        match intent {
            ReorderIntent::Reorder {
                container_id,
                ordered_ids,
            } => {
                self.engine
                    .reorder(&self.principal, container_id, ordered_ids)
                    .await
            }
            ReorderIntent::Move {
                item_id,
                source_id,
                target_id,
                index,
            } => {
                self.engine
                    .move_item(&self.principal, item_id, source_id, target_id, *index)
                    .await
            }
        }
    }

    async fn fetch_order(&self, container_id: &str) -> Result<Vec<ItemId>> {
        let items = self.engine.order_of(&self.principal, container_id).await?;
        Ok(items.into_iter().map(|item| item.id).collect())
    }
}

async fn seeded_engine(authz: Arc<dyn Authorizer>) -> (Arc<MemoryStore>, OrderingEngine) {
    let store = Arc::new(MemoryStore::with_unique_positions());
    for column in ["todo", "done"] {
        store.add_container(Container::column(column)).unwrap();
    }
    let clock = Arc::new(ManualClock::new(1_000));
    let seeder = OrderingEngine::builder(store.clone(), Arc::new(AllowAll))
        .clock(clock.clone())
        .build();
    for (card, column) in [("a", "todo"), ("b", "todo"), ("c", "done")] {
        seeder
            .assign_position("admin", NewItem::new(card, ItemKind::Card, column))
            .await
            .unwrap();
        clock.advance(1);
    }
    let engine = OrderingEngine::builder(store.clone(), authz)
        .clock(clock)
        .build();
    (store, engine)
}

#[tokio::test]
async fn cache_and_engine_agree_after_drags() {
    let (store, engine) = seeded_engine(Arc::new(AllowAll)).await;
    let session = OptimisticSession::new(EngineApi {
        engine,
        principal: "alice".into(),
    });
    session.load("todo").await.unwrap();
    session.load("done").await.unwrap();

    let moved = session
        .drag_end(ReorderIntent::move_item("b", "todo", "done", TargetIndex::At(0)))
        .await
        .unwrap();
    let reordered = session
        .drag_end(ReorderIntent::reorder("done", ids(&["c", "b"])))
        .await
        .unwrap();

    assert_eq!((moved, reordered), (AckEffect::Confirmed, AckEffect::Confirmed));
    for column in ["todo", "done"] {
        assert_eq!(session.order(column).unwrap(), store.order_of(column).unwrap());
    }
}

#[tokio::test]
async fn forbidden_target_rolls_the_cache_back() {
    let acl = StaticAcl::new().grant("alice", "todo");
    let (store, engine) = seeded_engine(Arc::new(acl)).await;
    let session = OptimisticSession::with_cache(
        EngineApi {
            engine,
            principal: "alice".into(),
        },
        {
            let mut cache = OrderCache::new();
            cache.replace("todo", store.order_of("todo").unwrap());
            cache.replace("done", store.order_of("done").unwrap());
            cache
        },
    );

    let effect = session
        .drag_end(ReorderIntent::move_item("a", "todo", "done", TargetIndex::Append))
        .await
        .unwrap();

    assert!(matches!(effect, AckEffect::Rollback { .. }));
    assert_eq!(session.order("todo").unwrap(), ids(&["a", "b"]));
    assert_eq!(session.order("done").unwrap(), ids(&["c"]));
    // "done" cannot be read by alice either, so it stays flagged.
    assert!(!session.needs_reload("todo"));
    assert!(session.needs_reload("done"));
    assert_eq!(store.writes(), 3);
}
