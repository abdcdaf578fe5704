//! Generation naming and the per-generation handle.

use std::fmt;

use super::entry::{CachedResponse, RequestIdentity};
use super::store::SharedStore;
use crate::Error;

/// The two generation roles that exist for each version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationRole {
    /// Pre-populated from the manifest at install.
    Static,
    /// Populated opportunistically from live responses.
    Dynamic,
}

impl GenerationRole {
    pub fn prefix(self) -> &'static str {
        match self {
            GenerationRole::Static => "static",
            GenerationRole::Dynamic => "dynamic",
        }
    }

    /// Generation name for this role under `version`, e.g. `static-v3`.
    pub fn name(self, version: &str) -> String {
        format!("{}-{version}", self.prefix())
    }
}

/// The active generation set for `version`: `[static-<version>, dynamic-<version>]`.
pub fn active_generation_names(version: &str) -> [String; 2] {
    [GenerationRole::Static.name(version), GenerationRole::Dynamic.name(version)]
}

/// Handle to one named generation in a store.
#[derive(Clone)]
pub struct Generation {
    store: SharedStore,
    name: String,
}

impl Generation {
    /// Open a generation, creating it in the store if needed.
    pub async fn open(store: SharedStore, name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        store.create_generation(&name).await?;
        Ok(Self { store, name })
    }

    /// Handle to a generation that may not exist yet. `put_all` creates it;
    /// `put_existing` never does.
    pub fn lazy(store: SharedStore, name: impl Into<String>) -> Self {
        Self { store, name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a snapshot unless the generation has been deleted. Returns
    /// whether it was written.
    pub async fn put_existing(&self, identity: &RequestIdentity, response: &CachedResponse) -> Result<bool, Error> {
        self.store.put_existing(&self.name, identity, response).await
    }

    pub async fn put_all(&self, entries: &[(RequestIdentity, CachedResponse)]) -> Result<(), Error> {
        self.store.put_all(&self.name, entries).await
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation").field("name", &self.name).finish_non_exhaustive()
    }
}
