//! Test doubles shared by the interceptor and lifecycle tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};

use havn_core::{CacheDb, CacheStore, CachedResponse, Error, RequestIdentity};

use crate::fetch::{FetchResponse, Transport};
use crate::request::InterceptedRequest;

pub const ORIGIN: &str = "http://localhost:3000";

pub fn url(path: &str) -> url::Url {
    url::Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Transport that serves canned routes, counts calls and can go offline.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, (u16, &'static str)>>,
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, path: &str, status: u16, body: &'static str) -> Self {
        self.routes.lock().unwrap().insert(url(path).to_string(), (status, body));
        self
    }

    pub fn set_route(&self, path: &str, status: u16, body: &'static str) {
        self.routes.lock().unwrap().insert(url(path).to_string(), (status, body));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.seen.lock().unwrap().iter().filter(|u| **u == target).count()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &InterceptedRequest) -> Result<FetchResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.url.to_string());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .copied()
            .unwrap_or((404, "not found"));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Ok(FetchResponse {
            url: request.url.clone(),
            final_url: request.url.clone(),
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            bytes: Bytes::from_static(body.as_bytes()),
            fetch_ms: 0,
        })
    }
}

/// Store whose writes always fail, as when storage quota is exhausted.
pub struct QuotaExceededStore {
    pub inner: CacheDb,
}

#[async_trait::async_trait]
impl CacheStore for QuotaExceededStore {
    async fn create_generation(&self, generation: &str) -> Result<(), Error> {
        self.inner.create_generation(generation).await
    }

    async fn get(&self, generation: &str, identity: &RequestIdentity) -> Result<Option<CachedResponse>, Error> {
        self.inner.get(generation, identity).await
    }

    async fn put(&self, _: &str, _: &RequestIdentity, _: &CachedResponse) -> Result<(), Error> {
        Err(Error::Serialization("quota exceeded".into()))
    }

    async fn put_existing(&self, _: &str, _: &RequestIdentity, _: &CachedResponse) -> Result<bool, Error> {
        Err(Error::Serialization("quota exceeded".into()))
    }

    async fn put_all(&self, _: &str, _: &[(RequestIdentity, CachedResponse)]) -> Result<(), Error> {
        Err(Error::Serialization("quota exceeded".into()))
    }

    async fn match_any(&self, identity: &RequestIdentity) -> Result<Option<CachedResponse>, Error> {
        self.inner.match_any(identity).await
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.inner.generation_names().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.inner.delete(generation).await
    }
}

/// Poll `check` until it returns true or roughly a second passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
