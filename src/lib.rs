//! Reactive session and ranked medal-table stores over an external
//! authentication service and real-time document database.
//!
//! Each store owns one piece of state written only by its backend change
//! feed. Actions ask the backend to change something and return once the
//! backend has answered; the state follows when the feed reports it.
//!
//! # Examples
//!
//! Ranking a snapshot directly:
//! ```
//! use medalboard::{core::ranking::rank, country::Country};
//!
//! let country = |id: &str, gold, silver, bronze| Country {
//!     id: id.to_string(),
//!     name: id.to_string(),
//!     flag: String::new(),
//!     gold,
//!     silver,
//!     bronze,
//! };
//! let ranked = rank(&[country("a", 3, 1, 0), country("b", 3, 2, 5)]);
//! assert_eq!(ranked[0].id, "b");
//! ```
//!
//! Driving both stores against the in-process backend:
//! ```
//! use std::sync::Arc;
//!
//! use medalboard::{
//!     backend::memory::InMemoryBackend,
//!     config::{SessionConfig, StoreConfig},
//!     country::CountryInput,
//!     runtime::{medals::spawn_medal_store, session::spawn_session_store},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = Arc::new(InMemoryBackend::new());
//! backend.register_account("admin@example.com", "hunter22");
//!
//! let session = spawn_session_store(Arc::clone(&backend), &SessionConfig::default());
//! let medals = spawn_medal_store(Arc::clone(&backend), StoreConfig::default());
//!
//! session.login("admin@example.com", "hunter22").await.expect("login");
//! session.wait_for(|s| s.is_authenticated()).await.expect("session");
//!
//! medals
//!     .add_item(&CountryInput {
//!         name: "Norway".to_string(),
//!         flag: "🇳🇴".to_string(),
//!         gold: "16".to_string(),
//!         silver: "8".to_string(),
//!         bronze: "13".to_string(),
//!     })
//!     .await
//!     .expect("add");
//! let state = medals.wait_for(|s| s.len() == 1).await.expect("snapshot");
//! assert_eq!(state.items()[0].gold, 16);
//!
//! medals.shutdown().await;
//! session.shutdown().await;
//! # }
//! ```
#![warn(missing_docs)]

/// Collaborator traits and the in-process reference backend.
pub mod backend;
/// Backend identity and store configuration.
pub mod config;
/// Collection mirror and ranking.
pub mod core;
/// Country records, drafts, input parsing, and field updates.
pub mod country;
/// Single-writer store runtimes and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
