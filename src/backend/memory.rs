//! In-process backend implementing both collaborator traits.
//!
//! Mirrors the hosted service closely enough to drive the stores without a
//! network: every committed write pushes a fresh total snapshot to open
//! listeners, access rules can be flipped to reject everything, and faults
//! can be injected for the next write or sign-in.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use hashbrown::HashMap;
use rand::{Rng, distr::Alphanumeric};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    config::{BackendConfig, ConfigError},
    country::{Country, CountryDraft, FieldUpdate},
    types::RecordId,
};

use super::{
    AuthError, BackendError, CollectionFeed, DocumentStore, FeedEvent, Identity, IdentityProvider,
    SessionFeed,
};

const RECORD_ID_LEN: usize = 20;
const UID_LEN: usize = 28;

/// Access rule applied to every collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Reads and writes are allowed.
    #[default]
    Allow,
    /// Everything is rejected with a permission error.
    Deny,
}

#[derive(Debug, Default)]
struct Collection {
    records: HashMap<RecordId, Country>,
    order: Vec<RecordId>,
    listeners: Vec<mpsc::UnboundedSender<FeedEvent>>,
}

impl Collection {
    fn snapshot(&self) -> Vec<Country> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    fn publish(&mut self, event: FeedEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn publish_snapshot(&mut self) {
        let event = FeedEvent::Snapshot(self.snapshot());
        self.publish(event);
    }
}

#[derive(Debug)]
struct Account {
    identity: Identity,
    password: String,
    disabled: bool,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, Collection>,
    accounts: HashMap<String, Account>,
    current: Option<Identity>,
    session_listeners: Vec<mpsc::UnboundedSender<Option<Identity>>>,
    access: Access,
    next_write_failure: Option<BackendError>,
    next_auth_failure: Option<AuthError>,
}

impl Inner {
    fn publish_session(&mut self) {
        let current = self.current.clone();
        self.session_listeners
            .retain(|tx| tx.send(current.clone()).is_ok());
    }

    fn check_write(&mut self) -> Result<(), BackendError> {
        if self.access == Access::Deny {
            return Err(BackendError::permission_denied());
        }
        match self.next_write_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Shared in-process backend. Wrap in an `Arc` and hand to both stores.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
    project_id: Option<String>,
}

impl InMemoryBackend {
    /// Empty backend with no accounts and no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend bound to the project named in `config`.
    pub fn from_config(config: &BackendConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            project_id: Some(config.project_id.clone()),
            ..Self::default()
        })
    }

    /// Project this backend was configured for.
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Delays every async call by `latency` before it touches state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Inserts records ahead of any subscription, returning their ids.
    pub fn seed(&self, collection: &str, drafts: impl IntoIterator<Item = CountryDraft>) -> Vec<RecordId> {
        let mut inner = self.lock();
        let coll = inner.collections.entry_ref(collection).or_default();
        let ids: Vec<RecordId> = drafts
            .into_iter()
            .map(|draft| insert_record(coll, draft))
            .collect();
        coll.publish_snapshot();
        ids
    }

    /// Current contents of `collection` in insertion order.
    pub fn snapshot(&self, collection: &str) -> Vec<Country> {
        self.lock()
            .collections
            .get(collection)
            .map(Collection::snapshot)
            .unwrap_or_default()
    }

    /// Number of live listeners on `collection`.
    pub fn listener_count(&self, collection: &str) -> usize {
        let mut inner = self.lock();
        let Some(coll) = inner.collections.get_mut(collection) else {
            return 0;
        };
        coll.listeners.retain(|tx| !tx.is_closed());
        coll.listeners.len()
    }

    /// Creates a password account.
    pub fn register_account(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            uid: random_token(UID_LEN),
            email: email.to_string(),
        };
        self.lock().accounts.insert(
            email.to_string(),
            Account {
                identity: identity.clone(),
                password: password.to_string(),
                disabled: false,
            },
        );
        identity
    }

    /// Disables an account; later sign-ins fail with [`AuthError::UserDisabled`].
    pub fn disable_account(&self, email: &str) {
        if let Some(account) = self.lock().accounts.get_mut(email) {
            account.disabled = true;
        }
    }

    /// Identity currently signed in.
    pub fn current_identity(&self) -> Option<Identity> {
        self.lock().current.clone()
    }

    /// Switches the access rule. Denying pushes a permission error to every
    /// listener; allowing again re-sends snapshots.
    pub fn set_access(&self, access: Access) {
        let mut inner = self.lock();
        if inner.access == access {
            return;
        }
        inner.access = access;
        for coll in inner.collections.values_mut() {
            match access {
                Access::Deny => coll.publish(FeedEvent::Failed(BackendError::permission_denied())),
                Access::Allow => coll.publish_snapshot(),
            }
        }
    }

    /// Pushes a listener failure to every listener on `collection`.
    pub fn fail_feed(&self, collection: &str, err: BackendError) {
        if let Some(coll) = self.lock().collections.get_mut(collection) {
            coll.publish(FeedEvent::Failed(err));
        }
    }

    /// Makes the next write fail with `err`.
    pub fn fail_next_write(&self, err: BackendError) {
        self.lock().next_write_failure = Some(err);
    }

    /// Makes the next sign-in or sign-out fail with `err`.
    pub fn fail_next_auth(&self, err: AuthError) {
        self.lock().next_auth_failure = Some(err);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl IdentityProvider for InMemoryBackend {
    async fn authenticate_with_password(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.delay().await;
        let mut inner = self.lock();
        if let Some(err) = inner.next_auth_failure.take() {
            return Err(err);
        }
        let identity = match inner.accounts.get(email) {
            Some(account) if account.password != password => return Err(AuthError::InvalidCredentials),
            Some(account) if account.disabled => return Err(AuthError::UserDisabled),
            Some(account) => account.identity.clone(),
            None => return Err(AuthError::InvalidCredentials),
        };
        debug!(uid = %identity.uid, "memory backend: signed in");
        inner.current = Some(identity);
        inner.publish_session();
        Ok(())
    }

    async fn end_session(&self) -> Result<(), AuthError> {
        self.delay().await;
        let mut inner = self.lock();
        if let Some(err) = inner.next_auth_failure.take() {
            return Err(err);
        }
        inner.current = None;
        inner.publish_session();
        Ok(())
    }

    fn subscribe_session(&self) -> SessionFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if tx.send(inner.current.clone()).is_ok() {
            inner.session_listeners.push(tx);
        }
        rx
    }
}

impl DocumentStore for InMemoryBackend {
    fn subscribe_collection(&self, collection: &str) -> CollectionFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let denied = inner.access == Access::Deny;
        let coll = inner.collections.entry_ref(collection).or_default();
        let first = if denied {
            FeedEvent::Failed(BackendError::permission_denied())
        } else {
            FeedEvent::Snapshot(coll.snapshot())
        };
        if tx.send(first).is_ok() {
            coll.listeners.push(tx);
        }
        rx
    }

    async fn create_record(&self, collection: &str, draft: &CountryDraft) -> Result<RecordId, BackendError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.check_write()?;
        let coll = inner.collections.entry_ref(collection).or_default();
        let id = insert_record(coll, draft.clone());
        debug!(%collection, %id, "memory backend: created");
        coll.publish_snapshot();
        Ok(id)
    }

    async fn update_record_field(&self, collection: &str, id: &str, update: &FieldUpdate) -> Result<(), BackendError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.check_write()?;
        let coll = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| BackendError::not_found(collection, id))?;
        let rec = coll
            .records
            .get_mut(id)
            .ok_or_else(|| BackendError::not_found(collection, id))?;
        update.apply_to(rec);
        debug!(%collection, %id, field = %update.field(), "memory backend: updated");
        coll.publish_snapshot();
        Ok(())
    }

    async fn delete_record(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.check_write()?;
        let Some(coll) = inner.collections.get_mut(collection) else {
            return Ok(());
        };
        if coll.records.remove(id).is_some() {
            coll.order.retain(|existing| existing != id);
            coll.publish_snapshot();
        }
        Ok(())
    }
}

fn insert_record(coll: &mut Collection, draft: CountryDraft) -> RecordId {
    let id = loop {
        let candidate = random_token(RECORD_ID_LEN);
        if !coll.records.contains_key(&candidate) {
            break candidate;
        }
    };
    coll.order.push(id.clone());
    coll.records.insert(id.clone(), Country::from_draft(id.clone(), draft));
    id
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
