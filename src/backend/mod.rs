//! Collaborator traits for the external identity provider and document store.

pub mod memory;

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    country::{Country, CountryDraft, FieldUpdate},
    types::{RecordId, Uid},
};

/// Authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-unique user id.
    pub uid: Uid,
    /// Sign-in email.
    pub email: String,
}

/// Provider-defined authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The account exists but is disabled.
    #[error("user account is disabled")]
    UserDisabled,
    /// Provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    /// Any other provider error.
    #[error("{code}: {message}")]
    Other {
        /// Provider error code.
        code: String,
        /// Provider error description.
        message: String,
    },
}

/// Document-store failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Rejected by access rules.
    PermissionDenied,
    /// Target document does not exist.
    NotFound,
    /// Service temporarily unreachable.
    Unavailable,
    /// Request was malformed.
    InvalidArgument,
    /// Anything else.
    Internal,
}

impl ErrorCode {
    /// Wire name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "permission-denied",
            ErrorCode::NotFound => "not-found",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::InvalidArgument => "invalid-argument",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the document store, on the feed or on a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// Failure category.
    pub code: ErrorCode,
    /// Native description.
    pub message: String,
}

impl BackendError {
    /// Builds an error from a code and description.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Access-rule rejection.
    pub fn permission_denied() -> Self {
        Self::new(
            ErrorCode::PermissionDenied,
            "Missing or insufficient permissions.",
        )
    }

    /// Missing document.
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("No document to update: {collection}/{id}"),
        )
    }
}

/// One delivery on a collection change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Total listing of every live record.
    Snapshot(Vec<Country>),
    /// The listener failed.
    Failed(BackendError),
}

/// Session change feed; dropping it unsubscribes.
pub type SessionFeed = mpsc::UnboundedReceiver<Option<Identity>>;
/// Collection change feed; dropping it unsubscribes.
pub type CollectionFeed = mpsc::UnboundedReceiver<FeedEvent>;

/// External authentication service.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Signs in with email and password.
    fn authenticate_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Ends the current session.
    fn end_session(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Registers for session changes. The current value is delivered first.
    fn subscribe_session(&self) -> SessionFeed;
}

/// External real-time document database.
pub trait DocumentStore: Send + Sync + 'static {
    /// Registers for total snapshots of `collection`. The current snapshot
    /// (or a rejection) is delivered first.
    fn subscribe_collection(&self, collection: &str) -> CollectionFeed;

    /// Creates a record and returns the id the store assigned.
    fn create_record(
        &self,
        collection: &str,
        draft: &CountryDraft,
    ) -> impl Future<Output = Result<RecordId, BackendError>> + Send;

    /// Writes exactly one field of an existing record.
    fn update_record_field(
        &self,
        collection: &str,
        id: &str,
        update: &FieldUpdate,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Deletes a record. Deleting a missing record is not an error.
    fn delete_record(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}
