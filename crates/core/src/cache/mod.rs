//! SQLite-backed store for generation-scoped response snapshots.
//!
//! This module provides the Cache Store consumed by the offline layer:
//!
//! - Named generations that are created lazily and deleted as a whole
//! - Content-addressed entry keys derived from the request identity
//! - Last-write-wins upserts, atomic batch writes for manifest installs
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod entry;
pub mod generation;
pub mod hash;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entry::{CachedResponse, RequestIdentity};
pub use generation::{Generation, GenerationRole, active_generation_names};
pub use store::{CacheStore, SharedStore};
