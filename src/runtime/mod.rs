//! Single-writer store runtimes and their event streams.

/// Event stream types emitted by the runtimes.
pub mod events;
/// Ranked collection store over a live change feed.
pub mod medals;
/// Authentication session store.
pub mod session;
