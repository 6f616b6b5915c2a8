use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::{
    backend::{BackendError, CollectionFeed, DocumentStore, FeedEvent},
    config::StoreConfig,
    core::collection::CollectionState,
    country::{Country, CountryDraft, CountryInput, FieldUpdate, ValidationError},
    types::{Field, RecordId},
};

use super::events::StoreEvent;

/// Failure of a ranked collection store call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Input was rejected before reaching the backend.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The backend rejected the call.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The feed task has stopped.
    #[error("store feed task has stopped")]
    Closed,
}

/// Handle to a live-mirrored, ranked collection.
///
/// Reads come from the mirror maintained by the feed task; actions go
/// straight to the backend and never touch the mirror.
pub struct MedalStoreHandle<S: DocumentStore> {
    store: Arc<S>,
    collection: Arc<str>,
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<StoreEvent>,
    state_rx: watch::Receiver<CollectionState>,
}

impl<S: DocumentStore> Clone for MedalStoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: Arc::clone(&self.collection),
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
            state_rx: self.state_rx.clone(),
        }
    }
}

enum Command {
    Shutdown { resp: oneshot::Sender<()> },
}

/// Subscribes to `config.collection` and spawns the task that owns its mirror.
///
/// The subscription lives until [`MedalStoreHandle::shutdown`] or until every
/// handle clone is dropped. Must be called inside a tokio runtime.
pub fn spawn_medal_store<S: DocumentStore>(store: Arc<S>, config: StoreConfig) -> MedalStoreHandle<S> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(8);
    let (events_tx, _) = broadcast::channel::<StoreEvent>(config.events_capacity.max(1));
    let (state_tx, state_rx) = watch::channel(CollectionState::new());

    let collection: Arc<str> = Arc::from(config.collection.as_str());
    let feed = store.subscribe_collection(&collection);

    tokio::spawn(run_feed_loop(
        Arc::clone(&collection),
        feed,
        cmd_rx,
        state_tx,
        events_tx.clone(),
    ));

    MedalStoreHandle {
        store,
        collection,
        cmd_tx,
        events_tx,
        state_rx,
    }
}

async fn run_feed_loop(
    collection: Arc<str>,
    mut feed: CollectionFeed,
    mut cmd_rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<CollectionState>,
    events_tx: broadcast::Sender<StoreEvent>,
) {
    info!(%collection, "medal store started");
    let mut feed_open = true;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Shutdown { resp }) => {
                        let _ = resp.send(());
                        break;
                    }
                    None => break,
                }
            }
            event = feed.recv(), if feed_open => {
                match event {
                    Some(event) => apply_feed_event(&collection, event, &state_tx, &events_tx),
                    None => {
                        warn!(%collection, "change feed closed by backend");
                        feed_open = false;
                    }
                }
            }
        }
    }

    drop(feed);
    info!(%collection, "medal store stopped");
}

fn apply_feed_event(
    collection: &str,
    event: FeedEvent,
    state_tx: &watch::Sender<CollectionState>,
    events_tx: &broadcast::Sender<StoreEvent>,
) {
    match event {
        FeedEvent::Snapshot(records) => {
            let len = records.len();
            state_tx.send_modify(|state| state.apply_snapshot(records));
            debug!(%collection, len, "snapshot applied");
            let _ = events_tx.send(StoreEvent::SnapshotApplied { len });
        }
        FeedEvent::Failed(err) => {
            let mut message = String::new();
            state_tx.send_modify(|state| message = state.apply_failure(&err).to_string());
            error!(%collection, code = %err.code, message = %err.message, "change feed failed");
            let _ = events_tx.send(StoreEvent::FeedFailed { message });
        }
    }
}

impl<S: DocumentStore> MedalStoreHandle<S> {
    /// Name of the mirrored collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    /// Receiver that observes every mirror update.
    pub fn watch(&self) -> watch::Receiver<CollectionState> {
        self.state_rx.clone()
    }

    /// Copy of the current mirror.
    pub fn state(&self) -> CollectionState {
        self.state_rx.borrow().clone()
    }

    /// Records in the order the last snapshot delivered them.
    pub fn items(&self) -> Vec<Country> {
        self.state_rx.borrow().items().to_vec()
    }

    /// Records in medal-table order, recomputed on every call.
    pub fn ranked_items(&self) -> Vec<Country> {
        self.state_rx.borrow().ranked()
    }

    pub fn loading(&self) -> bool {
        self.state_rx.borrow().loading()
    }

    pub fn error(&self) -> Option<String> {
        self.state_rx.borrow().error().map(str::to_string)
    }

    pub fn get(&self, id: &str) -> Option<Country> {
        self.state_rx.borrow().get(id).cloned()
    }

    /// Waits until the mirror satisfies `predicate` and returns that state.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<CollectionState, StoreError>
    where
        F: FnMut(&CollectionState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| StoreError::Closed)?;
        Ok(state.clone())
    }

    /// Writes one field of a record from raw text. Counter text must parse as
    /// a non-negative integer; the mirror changes only when the feed
    /// delivers the committed write.
    pub async fn update_field(&self, id: &str, field: Field, value: &str) -> Result<(), StoreError> {
        let update = FieldUpdate::parse(field, value)?;
        self.update(id, update).await
    }

    /// Writes one already-typed field of a record.
    pub async fn update(&self, id: &str, update: FieldUpdate) -> Result<(), StoreError> {
        debug!(collection = %self.collection, %id, field = %update.field(), "update requested");
        self.store
            .update_record_field(&self.collection, id, &update)
            .await?;
        Ok(())
    }

    /// Creates a record from form text and returns the store-assigned id.
    pub async fn add_item(&self, input: &CountryInput) -> Result<RecordId, StoreError> {
        let draft = input.parse()?;
        self.add(draft).await
    }

    pub async fn add(&self, draft: CountryDraft) -> Result<RecordId, StoreError> {
        let id = self.store.create_record(&self.collection, &draft).await?;
        debug!(collection = %self.collection, %id, "create committed");
        Ok(id)
    }

    /// Deletes a record by id.
    pub async fn remove_item(&self, id: &str) -> Result<(), StoreError> {
        debug!(collection = %self.collection, %id, "delete requested");
        self.store.delete_record(&self.collection, id).await?;
        Ok(())
    }

    /// Stops the feed task and drops the subscription. Idempotent.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown { resp: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}
