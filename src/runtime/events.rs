//! Runtime event stream payloads.

use crate::types::Uid;

/// Events emitted by the ranked collection store's feed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A total snapshot replaced the mirror.
    SnapshotApplied {
        /// Records in the new snapshot.
        len: usize,
    },
    /// The change feed reported a failure.
    FeedFailed {
        /// Message published into the store's error state.
        message: String,
    },
}

/// Events emitted by the session store's feed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user became the current identity.
    SignedIn {
        /// New current user.
        uid: Uid,
    },
    /// The session ended.
    SignedOut,
}
