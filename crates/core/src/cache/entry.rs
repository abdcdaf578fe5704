//! Request identities and the response snapshots stored against them.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::hash::compute_identity_key;

/// Lookup key for a cached response: upper-cased method plus normalized URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    method: String,
    uri: String,
}

impl RequestIdentity {
    /// Build an identity. The URI is expected to be normalized already.
    pub fn new(method: impl AsRef<str>, uri: impl Into<String>) -> Self {
        Self { method: method.as_ref().to_ascii_uppercase(), uri: uri.into() }
    }

    /// Identity of a plain GET for `uri`.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Hex SHA-256 row key.
    pub fn key(&self) -> String {
        compute_identity_key(&self.method, &self.uri)
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

/// A stored response: status, headers and body bytes.
///
/// Entries are immutable once written; a later write for the same identity
/// replaces the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// RFC 3339 timestamp of when the snapshot was taken.
    pub stored_at: String,
}

impl CachedResponse {
    /// Snapshot a response now.
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers, body: body.into(), stored_at: Utc::now().to_rfc3339() }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}
