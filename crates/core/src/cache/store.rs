//! The Cache Store abstraction consumed by the interception layer.

use std::sync::Arc;

use super::entry::{CachedResponse, RequestIdentity};
use crate::Error;

/// Shared handle to a store, cloned into background write tasks.
pub type SharedStore = Arc<dyn CacheStore>;

/// Key-value persistence of request identity to response snapshot, grouped
/// into named generations.
///
/// Implementations must tolerate concurrent reads, writes and deletes without
/// callers taking a lock; every operation is atomic on its own.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Create a generation if it does not exist yet.
    async fn create_generation(&self, generation: &str) -> Result<(), Error>;

    /// Look up an identity inside one generation.
    async fn get(&self, generation: &str, identity: &RequestIdentity) -> Result<Option<CachedResponse>, Error>;

    /// Store a snapshot, creating the generation lazily. Last write wins.
    async fn put(&self, generation: &str, identity: &RequestIdentity, response: &CachedResponse) -> Result<(), Error>;

    /// Store a snapshot only if the generation still exists. Returns whether
    /// it was written.
    async fn put_existing(
        &self, generation: &str, identity: &RequestIdentity, response: &CachedResponse,
    ) -> Result<bool, Error>;

    /// Store a batch of snapshots all-or-nothing.
    async fn put_all(&self, generation: &str, entries: &[(RequestIdentity, CachedResponse)]) -> Result<(), Error>;

    /// Look up an identity across every generation, oldest generation first.
    async fn match_any(&self, identity: &RequestIdentity) -> Result<Option<CachedResponse>, Error>;

    /// Names of all generations in creation order.
    async fn generation_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation and its entries. Returns whether it existed.
    async fn delete(&self, generation: &str) -> Result<bool, Error>;
}
