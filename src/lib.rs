//! Tagged bookmark store with name, URL and tag indices and JSON snapshots.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::EntryStore`]:
//! ```
//! use tagmarks::{core::store::{EntryStore, StoreError}, entry::Entry};
//!
//! let mut store = EntryStore::new();
//! store
//!     .add(Entry::new("blog", "https://x.io", vec!["tech".into(), "personal".into()]))
//!     .expect("add");
//! assert_eq!(store.len(), 1);
//!
//! let dup = store.add(Entry::new("blog", "https://y.io", vec!["other".into()]));
//! assert_eq!(dup, Err(StoreError::DuplicateName("blog".into())));
//!
//! let hits = store.find_by_tags(&["tech"]);
//! assert_eq!(hits[0].views, 1);
//! ```
//!
//! Runtime usage with a JSON snapshot sink:
//! ```no_run
//! use tagmarks::{
//!     entry::EntryDraft,
//!     persist::{json::JsonFileSink, load_or_empty},
//!     runtime::handle::{spawn_store, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = JsonFileSink::new("db.dump");
//! let store = load_or_empty(&sink);
//! let handle = spawn_store(store, Some(Box::new(sink)), RuntimeConfig::default());
//! let draft = EntryDraft::from_parts("blog", "https://x.io", "tech,personal").expect("draft");
//! handle.add(draft).await.expect("add");
//! handle.save().await.expect("save");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// HTTP client for a running server.
pub mod client;
/// Server configuration.
pub mod config;
/// Core in-memory store and index helpers.
pub mod core;
/// Entry record and creation payload.
pub mod entry;
/// Snapshot persistence and the admission gate.
pub mod persist;
/// Single-writer runtime handle, scheduler and events.
pub mod runtime;
/// HTTP routes and server lifecycle.
pub mod server;
/// Shared primitive types.
pub mod types;
