//! Content-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute the row key for a request identity.
pub fn compute_identity_key(method: &str, uri: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(uri.as_bytes());
    hex::encode(hasher.finalize())
}
