//! Session tokens and the per-request session context.
//!
//! ARCHITECTURE
//! ============
//! A [`Session`] is resolved once per request by the route layer and then
//! handed to services as `Option<&Session>`. There is no ambient "current
//! user"; a service that needs one calls [`require`].
//!
//! Tokens are random 32-byte hex strings. Only their SHA-256 digest is
//! stored, so a leaked sessions table cannot be replayed.

use std::fmt::Write;

use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::ServiceError;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Digest under which a token is persisted.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Authenticated identity for one request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Session {
    /// Unique user identifier.
    pub user_id: Uuid,
    /// Normalized e-mail address.
    pub email: String,
    /// Name shown next to comments.
    pub display_name: String,
}

/// Unwrap an optional session or fail with [`ServiceError::Unauthenticated`].
///
/// # Errors
///
/// Returns [`ServiceError::Unauthenticated`] when `session` is `None`.
pub fn require(session: Option<&Session>) -> Result<&Session, ServiceError> {
    session.ok_or(ServiceError::Unauthenticated)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
