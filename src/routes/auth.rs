//! Auth routes: sign-up, sign-in, sign-out, and the session extractors.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use super::error::ApiError;
use crate::config::AppConfig;
use crate::services::ServiceError;
use crate::services::auth::{self as auth_svc, SignedIn};
use crate::services::session::Session;
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(config.session_ttl)
        .build()
}

fn cleared_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(Duration::ZERO)
        .build()
}

/// Token from `Authorization: Bearer`, else from the session cookie.
fn request_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(COOKIE_NAME)
        .map(Cookie::value)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie or bearer token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub session: Session,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match MaybeAuthUser::from_request_parts(parts, state).await? {
            MaybeAuthUser(Some(user)) => Ok(user),
            MaybeAuthUser(None) => Err(ServiceError::Unauthenticated.into()),
        }
    }
}

/// Optional identity. Missing, unknown, or expired tokens resolve to `None`
/// so services can decide whether a session is required.
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.0.as_ref().map(|user| &user.session)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = request_token(parts) else {
            return Ok(Self(None));
        };

        let app_state = AppState::from_ref(state);
        let session = auth_svc::current_session(app_state.store.as_ref(), &token).await?;
        Ok(Self(session.map(|session| AuthUser { session, token })))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct CredentialsBody {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: Session,
    pub token: String,
}

fn signed_in_response(
    status: StatusCode,
    signed_in: SignedIn,
    config: &AppConfig,
) -> (StatusCode, CookieJar, Json<AuthResponse>) {
    let jar = CookieJar::new().add(session_cookie(signed_in.token.clone(), config));
    (status, jar, Json(AuthResponse { user: signed_in.session, token: signed_in.token }))
}

/// `POST /api/auth/signup`: register, open a session, set cookie.
pub async fn sign_up(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<CredentialsBody>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in =
        auth_svc::sign_up(state.store.as_ref(), &body.email, &body.password, state.config.session_ttl).await?;
    Ok(signed_in_response(StatusCode::CREATED, signed_in, &state.config))
}

/// `POST /api/auth/signin`: check credentials, open a session, set cookie.
pub async fn sign_in(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<CredentialsBody>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in =
        auth_svc::sign_in(state.store.as_ref(), &body.email, &body.password, state.config.session_ttl).await?;
    Ok(signed_in_response(StatusCode::OK, signed_in, &state.config))
}

/// `POST /api/auth/signout`: delete session, clear cookie.
pub async fn sign_out(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse, ApiError> {
    auth_svc::sign_out(state.store.as_ref(), &auth.token).await?;
    let jar = CookieJar::new().add(cleared_cookie(&state.config));
    Ok((jar, StatusCode::NO_CONTENT))
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user": auth.session }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
