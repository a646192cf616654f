//! Comment routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::MaybeAuthUser;
use super::error::ApiError;
use crate::services::comment::{self, Comment};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CommentBody {
    pub content: String,
}

/// `GET /api/reports/:id/comments`: oldest-first thread.
pub async fn list_comments(
    State(state): State<AppState>,
    WithRejection(Path(report_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(comment::list(state.store.as_ref(), report_id).await?))
}

/// `POST /api/reports/:id/comments`: add a comment.
pub async fn create_comment(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    WithRejection(Path(report_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(body), _): WithRejection<Json<CommentBody>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let created = comment::create(state.store.as_ref(), auth.session(), report_id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
