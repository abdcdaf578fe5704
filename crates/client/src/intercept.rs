//! Execution of the network-first and cache-first strategies.
//!
//! Both strategies always produce a response: a live one, a cached one, or a
//! synthesized 503. Successful live responses are copied into the version's
//! dynamic generation by a detached task, so the caller never waits on the
//! cache write and never sees it fail. The dynamic generation is created at
//! activation; once it has been swept, late writes from the superseded
//! version are dropped instead of recreating it.

use std::sync::Arc;

use tokio::task::JoinHandle;

use havn_core::{CachedResponse, Error, Generation, GenerationRole, RequestIdentity, SharedStore};

use crate::fetch::SharedTransport;
use crate::request::{InterceptedRequest, InterceptedResponse, ResponseSource};

/// Runs caching strategies for one version of the layer.
pub struct Interceptor {
    store: SharedStore,
    transport: SharedTransport,
    dynamic: Generation,
    fallback: RequestIdentity,
}

impl Interceptor {
    /// `fallback` is the identity served when a cache-first request can
    /// neither be fetched nor found in the cache.
    pub fn new(store: SharedStore, transport: SharedTransport, version: &str, fallback: RequestIdentity) -> Self {
        let dynamic = Generation::lazy(store.clone(), GenerationRole::Dynamic.name(version));
        Self { store, transport, dynamic, fallback }
    }

    /// Live fetch first; on network failure serve any cached copy, else the
    /// JSON offline payload.
    pub async fn network_first(&self, request: InterceptedRequest) -> InterceptedResponse {
        let identity = request.identity();

        let err = match self.fetch_and_populate(request).await {
            Ok(response) => return response,
            Err(err) => err,
        };

        tracing::debug!(%identity, error = %err, "network-first fetch failed, falling back to cache");

        match self.store.match_any(&identity).await {
            Ok(Some(cached)) => InterceptedResponse::from_cached(cached, ResponseSource::Cache),
            Ok(None) => InterceptedResponse::offline_json(),
            Err(e) => {
                tracing::warn!(%identity, error = %e, "cache lookup failed while offline");
                InterceptedResponse::offline_json()
            }
        }
    }

    /// Cached copy first, with no freshness check; on a miss fetch live, and
    /// when that fails serve the cached fallback document or a plain 503.
    pub async fn cache_first(&self, request: InterceptedRequest) -> InterceptedResponse {
        let identity = request.identity();

        match self.store.match_any(&identity).await {
            Ok(Some(cached)) => {
                tracing::debug!(%identity, "cache hit");
                return InterceptedResponse::from_cached(cached, ResponseSource::Cache);
            }
            Ok(None) => tracing::debug!(%identity, "cache miss"),
            Err(e) => tracing::warn!(%identity, error = %e, "cache lookup failed, treating as miss"),
        }

        let err = match self.fetch_and_populate(request).await {
            Ok(response) => return response,
            Err(err) => err,
        };

        tracing::debug!(%identity, error = %err, "cache-first fetch failed, trying fallback document");

        match self.store.match_any(&self.fallback).await {
            Ok(Some(cached)) => InterceptedResponse::from_cached(cached, ResponseSource::Fallback),
            Ok(None) => InterceptedResponse::offline_text(),
            Err(e) => {
                tracing::warn!(fallback = %self.fallback, error = %e, "fallback lookup failed");
                InterceptedResponse::offline_text()
            }
        }
    }

    /// Fetch in a spawned task so the fetch and its cache write finish even
    /// if the caller stops waiting.
    async fn fetch_and_populate(&self, request: InterceptedRequest) -> Result<InterceptedResponse, Error> {
        let transport = Arc::clone(&self.transport);
        let dynamic = self.dynamic.clone();

        let task = tokio::spawn(async move {
            let identity = request.identity();
            let response = transport.send(&request).await?;
            if response.status.is_success() {
                spawn_cache_write(dynamic, identity, response.to_cached());
            }
            Ok::<_, Error>(response)
        });

        let response = task
            .await
            .map_err(|e| Error::Network(format!("fetch task failed: {e}")))??;

        Ok(InterceptedResponse::from_network(response, ResponseSource::Network))
    }
}

/// Write a snapshot in the background. Writes into a generation that no
/// longer exists are skipped; failures are logged and discarded.
pub fn spawn_cache_write(generation: Generation, identity: RequestIdentity, response: CachedResponse) -> JoinHandle<()> {
    tokio::spawn(async move {
        match generation.put_existing(&identity, &response).await {
            Ok(true) => tracing::trace!(generation = generation.name(), %identity, "cached response"),
            Ok(false) => tracing::debug!(generation = generation.name(), %identity, "generation swept, dropping late write"),
            Err(e) => tracing::warn!(generation = generation.name(), %identity, error = %e, "discarding failed cache write"),
        }
    })
}
