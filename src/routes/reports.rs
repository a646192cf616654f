//! Report, category, and vote routes.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::MaybeAuthUser;
use super::error::ApiError;
use crate::services::category::Category;
use crate::services::report::{self, ImageUpload, ReportDraft, ReportView};
use crate::services::vote::{self, Polarity, VoteOutcome};
use crate::state::AppState;

/// `GET /api/categories`: the category labels in display order.
pub async fn categories() -> Json<Vec<&'static str>> {
    Json(Category::ALL.iter().map(|c| c.as_str()).collect())
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

/// `GET /api/reports`: newest-first listing, optionally filtered.
pub async fn list_reports(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ApiError>,
) -> Result<Json<Vec<ReportView>>, ApiError> {
    let category = Category::parse_filter(query.category.as_deref())?;
    let reports = report::list(state.store.as_ref(), auth.session(), category).await?;
    Ok(Json(reports))
}

/// `GET /api/reports/:id`: one report with tally.
pub async fn get_report(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    WithRejection(Path(report_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<ReportView>, ApiError> {
    let view = report::get(state.store.as_ref(), auth.session(), report_id).await?;
    Ok(Json(view))
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError { status: err.status(), code: "E_VALIDATION", message: err.body_text(), retryable: false }
}

async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

/// Read the submission form. Unknown parts are skipped; an empty image part
/// counts as no image.
async fn read_submission(mut multipart: Multipart) -> Result<(ReportDraft, Option<ImageUpload>), ApiError> {
    let mut draft = ReportDraft::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "title" => draft.title = field_text(field).await?,
            "description" => draft.description = field_text(field).await?,
            "category" => draft.category = field_text(field).await?,
            "location" => draft.location = field_text(field).await?,
            "image" => {
                let filename = field.file_name().map(str::to_owned);
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_owned();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if !bytes.is_empty() {
                    image = Some(ImageUpload { filename, content_type, bytes: bytes.to_vec() });
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    Ok((draft, image))
}

/// `POST /api/reports`: multipart submission with optional image.
pub async fn create_report(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let (draft, image) = read_submission(multipart).await?;
    let view = report::create(
        state.store.as_ref(),
        state.blobs.as_ref(),
        auth.session(),
        draft,
        image,
        state.config.max_image_bytes,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Deserialize)]
pub struct VoteBody {
    pub vote_type: String,
}

/// `POST /api/reports/:id/vote`: cast, switch, or retract a vote.
pub async fn vote_report(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    WithRejection(Path(report_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(body), _): WithRejection<Json<VoteBody>, ApiError>,
) -> Result<Json<VoteOutcome>, ApiError> {
    let Some(polarity) = Polarity::parse(&body.vote_type) else {
        return Err(ApiError::bad_request(format!("vote_type must be \"up\" or \"down\", got {:?}", body.vote_type)));
    };
    let outcome = vote::apply(state.store.as_ref(), auth.session(), report_id, polarity).await?;
    Ok(Json(outcome))
}
