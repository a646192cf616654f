//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the JSON API under `/api`, a health check, and,
//! for the local blob backend, the uploaded images under `/uploads`.

pub mod auth;
pub mod comments;
pub mod error;
pub mod reports;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::BlobConfig;
use crate::state::AppState;

/// Room for the text fields and multipart framing around the image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.max_image_bytes.saturating_add(FORM_OVERHEAD_BYTES);

    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/categories", get(reports::categories))
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/auth/me", get(auth::me))
        .route("/api/reports", get(reports::list_reports).post(reports::create_report))
        .route("/api/reports/{id}", get(reports::get_report))
        .route("/api/reports/{id}/vote", post(reports::vote_report))
        .route(
            "/api/reports/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        );

    if let BlobConfig::Local { upload_dir, .. } = &state.config.blob {
        router = router.nest_service("/uploads", ServeDir::new(upload_dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
