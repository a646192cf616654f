//! E-mail + password authentication and session lifecycle.
//!
//! Passwords are hashed with Argon2id. Sessions are opaque random tokens
//! whose SHA-256 digest is stored with an expiry; see [`super::session`].

use std::sync::LazyLock;

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::Rng;
use time::OffsetDateTime;
use tracing::info;

use super::ErrorCode;
use super::session::{self, Session};
use crate::store::{AuthStore, StoreError};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email already registered")]
    AlreadyRegistered,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("auth service error: {0}")]
    Service(String),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::AlreadyRegistered => "E_ALREADY_REGISTERED",
            Self::Validation(_) => "E_VALIDATION",
            Self::Service(_) => "E_STORE_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Service(err.to_string())
    }
}

/// A freshly issued session and the token the client must present.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: Session,
    pub token: String,
}

// =============================================================================
// INPUT NORMALIZATION
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if local.is_empty() || domain.is_empty() || normalized.chars().any(char::is_whitespace) {
        return None;
    }
    Some(normalized)
}

fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

fn check_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

/// Argon2id with library defaults, or a minimal cost under test.
fn hasher() -> Argon2<'static> {
    let params = if cfg!(test) { Params::new(1024, 1, 1, None).unwrap_or_default() } else { Params::default() };
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

pub(crate) fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Service(e.to_string()))?;
    hasher()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Service(e.to_string()))
}

/// Hash checked when the e-mail is unknown, so both sign-in failures cost one
/// Argon2 verification.
pub(crate) fn dummy_hash() -> &'static str {
    static DUMMY: LazyLock<String> = LazyLock::new(|| hash_password("civicwatch-no-such-user").unwrap_or_default());
    &DUMMY
}

pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        hasher()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

// =============================================================================
// OPERATIONS
// =============================================================================

async fn issue_session<S: AuthStore + ?Sized>(
    store: &S,
    session: Session,
    ttl: time::Duration,
) -> Result<SignedIn, AuthError> {
    let token = session::generate_token();
    let expires_at = OffsetDateTime::now_utc() + ttl;
    store
        .insert_session(&session::hash_token(&token), session.user_id, expires_at)
        .await?;
    Ok(SignedIn { session, token })
}

/// Register a new account and sign it in.
///
/// # Errors
///
/// [`AuthError::Validation`] for a malformed e-mail or short password,
/// [`AuthError::AlreadyRegistered`] if the e-mail is taken.
pub async fn sign_up<S: AuthStore + ?Sized>(
    store: &S,
    email: &str,
    password: &str,
    ttl: time::Duration,
) -> Result<SignedIn, AuthError> {
    let email = normalize_email(email).ok_or_else(|| AuthError::Validation("invalid email".into()))?;
    check_password(password)?;

    let password_hash = hash_password(password)?;
    let user = match store.insert_user(&email, &name_from_email(&email), &password_hash).await {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => return Err(AuthError::AlreadyRegistered),
        Err(e) => return Err(e.into()),
    };
    info!(user_id = %user.id, "user registered");

    let session = Session { user_id: user.id, email: user.email, display_name: user.display_name };
    issue_session(store, session, ttl).await
}

/// Check credentials and open a new session.
///
/// # Errors
///
/// [`AuthError::InvalidCredentials`] for an unknown e-mail or wrong password.
pub async fn sign_in<S: AuthStore + ?Sized>(
    store: &S,
    email: &str,
    password: &str,
    ttl: time::Duration,
) -> Result<SignedIn, AuthError> {
    let Some(email) = normalize_email(email) else {
        return Err(AuthError::InvalidCredentials);
    };
    let Some(user) = store.find_user_by_email(&email).await? else {
        verify_password(password, dummy_hash());
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }
    info!(user_id = %user.id, "user signed in");

    let session = Session { user_id: user.id, email: user.email, display_name: user.display_name };
    issue_session(store, session, ttl).await
}

/// End the session identified by `token`. Unknown tokens are ignored.
///
/// # Errors
///
/// [`AuthError::Service`] if the store call fails.
pub async fn sign_out<S: AuthStore + ?Sized>(store: &S, token: &str) -> Result<(), AuthError> {
    store.delete_session(&session::hash_token(token)).await?;
    Ok(())
}

/// Resolve a token to its live session.
///
/// # Errors
///
/// [`AuthError::Service`] if the store call fails.
pub async fn current_session<S: AuthStore + ?Sized>(store: &S, token: &str) -> Result<Option<Session>, AuthError> {
    if token.is_empty() {
        return Ok(None);
    }
    let row = store.find_session(&session::hash_token(token)).await?;
    Ok(row.map(|r| Session { user_id: r.user_id, email: r.email, display_name: r.display_name }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
