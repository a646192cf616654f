//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own validation and the vote state machine. They never
//! look up "the current user" on their own: callers pass the request's
//! [`session::Session`] explicitly, and every persistence call goes through
//! the store traits so the same code runs against Postgres or memory.
//!
//! ERROR HANDLING
//! ==============
//! Errors propagate unchanged to the route layer, which picks the status
//! code. Nothing in here retries.

pub mod auth;
pub mod category;
pub mod comment;
pub mod report;
pub mod session;
pub mod vote;

use crate::blob::BlobError;
use crate::store::StoreError;

/// Grepable error code and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    TransientStoreFailure(String),
}

impl ErrorCode for ServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "E_UNAUTHENTICATED",
            Self::Validation(_) => "E_VALIDATION",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Conflict(_) => "E_CONFLICT",
            Self::TransientStoreFailure(_) => "E_STORE_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::TransientStoreFailure(_))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => Self::Conflict(what),
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Backend(msg) => Self::TransientStoreFailure(msg),
        }
    }
}

impl From<BlobError> for ServiceError {
    fn from(err: BlobError) -> Self {
        Self::TransientStoreFailure(err.to_string())
    }
}

/// Trim `value` and check it against `max_chars`, naming `field` in errors.
pub(crate) fn required_text(field: &str, value: &str, max_chars: usize) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ServiceError::Validation(format!("{field} must be at most {max_chars} characters")));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
