use crate::{
    backend::{BackendError, ErrorCode},
    country::Country,
    core::{indices::PositionIndex, ranking},
};

/// Message published when the feed is rejected by access rules.
pub const ACCESS_DENIED_MESSAGE: &str = "Access Denied: Check Firestore Rules.";

/// Mirror of one remote collection.
///
/// Written only by the feed task; everything else reads clones of it.
#[derive(Debug, Clone)]
pub struct CollectionState {
    items: Vec<Country>,
    pos: PositionIndex,
    loading: bool,
    error: Option<String>,
}

impl Default for CollectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionState {
    /// Empty mirror waiting for its first feed event.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            pos: PositionIndex::new(),
            loading: true,
            error: None,
        }
    }

    /// Replaces the mirror with a total snapshot and clears any error.
    pub fn apply_snapshot(&mut self, records: Vec<Country>) {
        self.pos.clear();
        for (idx, rec) in records.iter().enumerate() {
            self.pos.insert(rec.id.clone(), idx);
        }
        self.items = records;
        self.error = None;
        self.loading = false;
    }

    /// Publishes a feed failure. Items are left as last delivered.
    pub fn apply_failure(&mut self, err: &BackendError) -> &str {
        self.loading = false;
        self.error.insert(describe_feed_error(err))
    }

    /// Records in snapshot arrival order.
    pub fn items(&self) -> &[Country] {
        &self.items
    }

    /// True until the first snapshot or failure arrives.
    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Human-readable cause of the last feed failure, if not yet cleared.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Country> {
        self.pos.get(id).and_then(|idx| self.items.get(*idx))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Fresh medal-table ordering of the current items.
    pub fn ranked(&self) -> Vec<Country> {
        ranking::rank(&self.items)
    }
}

/// Maps a feed failure to the text shown to users.
pub fn describe_feed_error(err: &BackendError) -> String {
    match err.code {
        ErrorCode::PermissionDenied => ACCESS_DENIED_MESSAGE.to_string(),
        _ => err.message.clone(),
    }
}
