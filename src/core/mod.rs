//! In-memory collection mirror, ranking, and index helpers.

/// Mirror of the remote collection as last delivered by the feed.
pub mod collection;
/// Helper index aliases.
pub mod indices;
/// Medal-table ordering.
pub mod ranking;
