//! Network transport for intercepted requests.
//!
//! ### Transport contract
//! - Every status code is returned as a response; only failures to obtain a
//!   response (DNS, connect, TLS, timeout, oversized body) are errors.
//! - Timeouts come from the transport configuration; strategies never
//!   override them per request.
//!
//! ### URI Normalization
//! - Trim whitespace, resolve against the configured origin
//! - Lowercase host, remove fragments
//! - Preserve query string

pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, parse_request_uri};

use havn_core::{AppConfig, CachedResponse, Error};

use crate::request::{InterceptedRequest, headers_to_pairs};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "havn/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "havn/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Snapshot this response for the cache store.
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse::new(self.status.as_u16(), headers_to_pairs(&self.headers), self.bytes.to_vec())
    }
}

/// The real network, as seen by the interception layer.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request and return whatever response the origin sends.
    async fn send(&self, request: &InterceptedRequest) -> Result<FetchResponse, Error>;
}

/// Shared transport handle, cloned into spawned fetch tasks.
pub type SharedTransport = Arc<dyn Transport>;

/// reqwest-backed HTTP transport.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl Transport for FetchClient {
    async fn send(&self, request: &InterceptedRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = request.url.clone();

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::UnsupportedScheme(url.scheme().to_string()));
        }

        let response = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Network(format!("timed out after {}ms", self.config.timeout.as_millis()))
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            method = %request.method,
            %url,
            status = status.as_u16(),
            fetch_ms,
            bytes = bytes.len(),
            "fetched"
        );

        Ok(FetchResponse { url, final_url, status, headers, bytes, fetch_ms })
    }
}
