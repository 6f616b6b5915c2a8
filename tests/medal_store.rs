use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::{Value, json};
use tokio::sync::mpsc;

use medalboard::{
    backend::{
        BackendError, CollectionFeed, DocumentStore, ErrorCode, FeedEvent,
        memory::{Access, InMemoryBackend},
    },
    config::StoreConfig,
    core::collection::{ACCESS_DENIED_MESSAGE, CollectionState},
    country::{Country, CountryDraft, CountryInput, FieldUpdate, ValidationError},
    runtime::{
        events::StoreEvent,
        medals::{MedalStoreHandle, StoreError, spawn_medal_store},
    },
    types::{Field, RecordId},
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create { collection: String, doc: Value },
    Update { collection: String, id: String, field: Field, value: Value },
    Delete { collection: String, id: String },
}

/// Document store whose feed is driven by the test and whose writes are
/// only recorded.
#[derive(Default)]
struct ScriptedStore {
    calls: Mutex<Vec<Call>>,
    feed: Mutex<Option<mpsc::UnboundedSender<FeedEvent>>>,
    reject_writes: Mutex<Option<BackendError>>,
}

impl ScriptedStore {
    fn push(&self, event: FeedEvent) {
        let feed = self.feed.lock().expect("lock");
        feed.as_ref().expect("subscribed").send(event).expect("feed open");
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    fn feed_closed(&self) -> bool {
        self.feed
            .lock()
            .expect("lock")
            .as_ref()
            .is_none_or(|tx| tx.is_closed())
    }

    fn record(&self, call: Call) -> Result<(), BackendError> {
        if let Some(err) = self.reject_writes.lock().expect("lock").clone() {
            return Err(err);
        }
        self.calls.lock().expect("lock").push(call);
        Ok(())
    }
}

impl DocumentStore for ScriptedStore {
    fn subscribe_collection(&self, _collection: &str) -> CollectionFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock().expect("lock") = Some(tx);
        rx
    }

    async fn create_record(&self, collection: &str, draft: &CountryDraft) -> Result<RecordId, BackendError> {
        self.record(Call::Create {
            collection: collection.to_string(),
            doc: serde_json::to_value(draft).expect("json"),
        })?;
        Ok("new-doc-id".to_string())
    }

    async fn update_record_field(&self, collection: &str, id: &str, update: &FieldUpdate) -> Result<(), BackendError> {
        self.record(Call::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            field: update.field(),
            value: update.to_json(),
        })
    }

    async fn delete_record(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        self.record(Call::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }
}

fn country(id: &str, gold: u32, silver: u32, bronze: u32) -> Country {
    Country {
        id: id.to_string(),
        name: id.to_string(),
        flag: "🏳".to_string(),
        gold,
        silver,
        bronze,
    }
}

fn draft(name: &str, gold: u32, silver: u32, bronze: u32) -> CountryDraft {
    CountryDraft {
        name: name.to_string(),
        flag: "🏳".to_string(),
        gold,
        silver,
        bronze,
    }
}

async fn wait_until<S, F>(handle: &MedalStoreHandle<S>, predicate: F) -> CollectionState
where
    S: DocumentStore,
    F: FnMut(&CollectionState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), handle.wait_for(predicate))
        .await
        .expect("state timeout")
        .expect("store running")
}

#[tokio::test]
async fn loading_until_first_snapshot() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());
    assert!(handle.loading());
    assert!(handle.items().is_empty());

    store.push(FeedEvent::Snapshot(vec![country("a", 1, 0, 0)]));
    let state = wait_until(&handle, |s| !s.loading()).await;
    assert_eq!(state.len(), 1);
    assert_eq!(handle.error(), None);

    handle.shutdown().await;
}

#[tokio::test]
async fn error_window_keeps_snapshot_then_clears() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());
    let mut events = handle.subscribe();

    let snapshot_a = vec![country("a", 1, 0, 0), country("b", 2, 0, 0)];
    let snapshot_b = vec![country("c", 9, 9, 9)];

    store.push(FeedEvent::Snapshot(snapshot_a.clone()));
    wait_until(&handle, |s| s.len() == 2).await;

    store.push(FeedEvent::Failed(BackendError::permission_denied()));
    let during = wait_until(&handle, |s| s.error().is_some()).await;
    assert_eq!(during.error(), Some(ACCESS_DENIED_MESSAGE));
    assert_eq!(during.items(), snapshot_a.as_slice());
    assert!(!during.loading());

    store.push(FeedEvent::Snapshot(snapshot_b.clone()));
    let after = wait_until(&handle, |s| s.error().is_none()).await;
    assert_eq!(after.items(), snapshot_b.as_slice());

    let mut seen = Vec::new();
    for _ in 0..3 {
        let evt = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event")
            .expect("recv");
        seen.push(evt);
    }
    assert_eq!(
        seen,
        vec![
            StoreEvent::SnapshotApplied { len: 2 },
            StoreEvent::FeedFailed {
                message: ACCESS_DENIED_MESSAGE.to_string()
            },
            StoreEvent::SnapshotApplied { len: 1 },
        ]
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn other_feed_failures_pass_message_through() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());

    store.push(FeedEvent::Failed(BackendError::new(
        ErrorCode::Unavailable,
        "Failed to get document because the client is offline.",
    )));
    let state = wait_until(&handle, |s| !s.loading()).await;
    assert_eq!(
        state.error(),
        Some("Failed to get document because the client is offline.")
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn ranked_items_follow_medal_order() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());

    store.push(FeedEvent::Snapshot(vec![
        country("first", 3, 1, 0),
        country("second", 3, 2, 5),
    ]));
    wait_until(&handle, |s| s.len() == 2).await;

    let ranked: Vec<String> = handle.ranked_items().into_iter().map(|c| c.id).collect();
    assert_eq!(ranked, vec!["second", "first"]);
    let again: Vec<String> = handle.ranked_items().into_iter().map(|c| c.id).collect();
    assert_eq!(ranked, again);

    let arrival: Vec<String> = handle.items().into_iter().map(|c| c.id).collect();
    assert_eq!(arrival, vec!["first", "second"]);

    handle.shutdown().await;
}

#[tokio::test]
async fn update_field_sends_numeric_counter() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());

    handle.update_field("doc1", Field::Gold, "5").await.expect("update");
    handle.update_field("doc1", Field::Flag, "🇯🇵").await.expect("update");

    assert_eq!(
        store.calls(),
        vec![
            Call::Update {
                collection: "countries".to_string(),
                id: "doc1".to_string(),
                field: Field::Gold,
                value: json!(5),
            },
            Call::Update {
                collection: "countries".to_string(),
                id: "doc1".to_string(),
                field: Field::Flag,
                value: json!("🇯🇵"),
            },
        ]
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn add_item_sends_numeric_counters() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());

    let id = handle
        .add_item(&CountryInput {
            name: "X".to_string(),
            flag: "🏳".to_string(),
            gold: "1".to_string(),
            silver: "0".to_string(),
            bronze: "0".to_string(),
        })
        .await
        .expect("add");
    assert_eq!(id, "new-doc-id");

    assert_eq!(
        store.calls(),
        vec![Call::Create {
            collection: "countries".to_string(),
            doc: json!({"name": "X", "flag": "🏳", "gold": 1, "silver": 0, "bronze": 0}),
        }]
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn invalid_counter_never_reaches_backend() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());

    let err = handle
        .update_field("doc1", Field::Bronze, "two")
        .await
        .expect_err("invalid");
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::InvalidCount { field: Field::Bronze, .. })
    ));

    let err = handle
        .add_item(&CountryInput {
            name: "Y".to_string(),
            flag: "🏳".to_string(),
            gold: String::new(),
            silver: "0".to_string(),
            bronze: "0".to_string(),
        })
        .await
        .expect_err("invalid");
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.calls().is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn actions_do_not_touch_mirror() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());

    store.push(FeedEvent::Snapshot(vec![country("a", 1, 0, 0)]));
    wait_until(&handle, |s| s.len() == 1).await;

    handle.update_field("a", Field::Gold, "4").await.expect("update");
    handle.remove_item("a").await.expect("remove");
    handle.add(draft("B", 0, 0, 0)).await.expect("add");

    assert_eq!(handle.items(), vec![country("a", 1, 0, 0)]);
    assert_eq!(store.calls().len(), 3);

    handle.shutdown().await;
}

#[tokio::test]
async fn backend_rejection_surfaces_as_store_error() {
    let store = Arc::new(ScriptedStore::default());
    *store.reject_writes.lock().expect("lock") = Some(BackendError::permission_denied());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());

    let err = handle.remove_item("a").await.expect_err("rejected");
    match err {
        StoreError::Backend(err) => assert_eq!(err.code, ErrorCode::PermissionDenied),
        other => panic!("unexpected error: {other:?}"),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_drops_subscription() {
    let store = Arc::new(ScriptedStore::default());
    let handle = spawn_medal_store(Arc::clone(&store), StoreConfig::default());
    assert!(!store.feed_closed());

    handle.shutdown().await;
    handle.shutdown().await;

    tokio::time::timeout(Duration::from_secs(1), async {
        while !store.feed_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("feed released");
}

#[tokio::test]
async fn dropping_all_handles_drops_subscription() {
    let backend = Arc::new(InMemoryBackend::new());
    let handle = spawn_medal_store(Arc::clone(&backend), StoreConfig::default());
    let clone = handle.clone();
    wait_until(&clone, |s| !s.loading()).await;
    assert_eq!(backend.listener_count("countries"), 1);

    drop(handle);
    drop(clone);

    tokio::time::timeout(Duration::from_secs(1), async {
        while backend.listener_count("countries") > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("listener released");
}

#[tokio::test]
async fn in_memory_round_trip_through_feed() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed("countries", [draft("Italy", 2, 0, 1)]);
    let handle = spawn_medal_store(Arc::clone(&backend), StoreConfig::default());
    wait_until(&handle, |s| s.len() == 1).await;

    let id = handle.add(draft("Japan", 2, 3, 0)).await.expect("add");
    let state = wait_until(&handle, |s| s.len() == 2).await;
    assert_eq!(state.ranked()[0].name, "Japan");

    handle.update_field(&id, Field::Gold, "1").await.expect("update");
    let state = wait_until(&handle, |s| s.get(&id).is_some_and(|c| c.gold == 1)).await;
    assert_eq!(state.ranked()[0].name, "Italy");

    handle.remove_item(&id).await.expect("remove");
    let state = wait_until(&handle, |s| s.len() == 1).await;
    assert!(state.get(&id).is_none());

    let err = handle
        .update_field(&id, Field::Name, "gone")
        .await
        .expect_err("missing record");
    assert!(matches!(err, StoreError::Backend(BackendError { code: ErrorCode::NotFound, .. })));
    handle.remove_item(&id).await.expect("deleting a missing record is not an error");

    handle.shutdown().await;
}

#[tokio::test]
async fn in_memory_access_rules_drive_error_state() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed("countries", [draft("Peru", 0, 1, 0)]);
    let handle = spawn_medal_store(Arc::clone(&backend), StoreConfig::default());
    wait_until(&handle, |s| s.len() == 1).await;

    backend.set_access(Access::Deny);
    let state = wait_until(&handle, |s| s.error().is_some()).await;
    assert_eq!(state.error(), Some(ACCESS_DENIED_MESSAGE));
    assert_eq!(state.len(), 1);

    let err = handle.add(draft("Chad", 0, 0, 0)).await.expect_err("denied");
    assert!(matches!(err, StoreError::Backend(BackendError { code: ErrorCode::PermissionDenied, .. })));

    backend.set_access(Access::Allow);
    let state = wait_until(&handle, |s| s.error().is_none()).await;
    assert_eq!(state.items()[0].name, "Peru");

    backend.fail_next_write(BackendError::new(ErrorCode::Unavailable, "try again later"));
    let err = handle.remove_item(&state.items()[0].id).await.expect_err("injected");
    assert_eq!(err.to_string(), "try again later");
    assert_eq!(backend.snapshot("countries").len(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn custom_collection_name_is_used() {
    let backend = Arc::new(InMemoryBackend::new());
    let handle = spawn_medal_store(
        Arc::clone(&backend),
        StoreConfig {
            collection: "paralympics".to_string(),
            ..StoreConfig::default()
        },
    );
    assert_eq!(handle.collection(), "paralympics");

    handle.add(draft("Brazil", 1, 1, 1)).await.expect("add");
    wait_until(&handle, |s| s.len() == 1).await;
    assert!(backend.snapshot("countries").is_empty());
    assert_eq!(backend.snapshot("paralympics").len(), 1);

    handle.shutdown().await;
}
