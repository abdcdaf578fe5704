//! Intercepted requests and the responses the layer hands back.

use std::borrow::Cow;

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use url::Url;

use havn_core::{CachedResponse, Error, RequestIdentity};

use crate::fetch::{FetchResponse, parse_request_uri};

/// An outbound request issued by the application.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new() }
    }

    /// A plain resource fetch.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a request from raw parts, resolving `uri` against `origin`.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a malformed method or header, and
    /// `INVALID_URL` when the URI cannot be normalized.
    pub fn parse(method: &str, uri: &str, headers: &[(&str, &str)], origin: &Url) -> Result<Self, Error> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {method}")))?;
        let url = parse_request_uri(uri, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut map = HeaderMap::new();
        for &(name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidInput(format!("invalid header name: {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::InvalidInput(format!("invalid value for header {}", name.as_str())))?;
            map.append(name, value);
        }

        Ok(Self { method, url, headers: map })
    }

    /// The cache lookup key for this request.
    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(self.method.as_str(), self.url.as_str())
    }
}

/// Where a response handed back to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Live response from the origin.
    Network,
    /// Stored entry for the same identity.
    Cache,
    /// Cached fallback document served in place of the request.
    Fallback,
    /// Synthesized 503.
    Offline,
    /// Request bypassed the layer entirely.
    Passthrough,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
            ResponseSource::Offline => "offline",
            ResponseSource::Passthrough => "passthrough",
        }
    }
}

/// Response produced by the layer for one intercepted request.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl InterceptedResponse {
    pub fn from_network(response: FetchResponse, source: ResponseSource) -> Self {
        Self { status: response.status, headers: response.headers, body: response.bytes, source }
    }

    /// Rebuild a response from a stored snapshot.
    ///
    /// Headers that are no longer valid are dropped; an out-of-range status
    /// becomes 500.
    pub fn from_cached(cached: CachedResponse, source: ResponseSource) -> Self {
        let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self { status, headers: pairs_to_headers(&cached.headers), body: Bytes::from(cached.body), source }
    }

    /// 503 with the JSON offline payload, for network-first requests.
    pub fn offline_json() -> Self {
        let body = serde_json::json!({ "error": "Offline", "message": "No network connection" }).to_string();
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self { status: StatusCode::SERVICE_UNAVAILABLE, headers, body: Bytes::from(body), source: ResponseSource::Offline }
    }

    /// Minimal plain-text 503, for cache-first requests.
    pub fn offline_text() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            headers,
            body: Bytes::from_static(b"Offline"),
            source: ResponseSource::Offline,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Flatten a header map into owned pairs, lossily decoding non-UTF-8 values.
pub fn headers_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect()
}

/// Rebuild a header map, skipping pairs that are not valid HTTP headers.
pub fn pairs_to_headers(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "dropping invalid cached header"),
        }
    }
    headers
}
