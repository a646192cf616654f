//! Report repository: listing, detail, and submission.
//!
//! DESIGN
//! ======
//! Listings are always re-read from the store, newest first, with the vote
//! tally joined in. When the caller has a session, their own vote on each
//! report is attached as well.
//!
//! ERROR HANDLING
//! ==============
//! On submission the image is stored before the report row. If the row
//! insert then fails, the uploaded blob is left behind and only logged;
//! there is no compensating delete.

use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::category::Category;
use super::session::{self, Session};
use super::vote::{Polarity, Tally};
use super::{ServiceError, required_text};
use crate::blob::BlobStore;
use crate::store::{NewReport, ReportRow, ReportStore, VoteStore};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_LOCATION_CHARS: usize = 300;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

const BLOB_NAME_LEN: usize = 13;
const BLOB_NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

// =============================================================================
// TYPES
// =============================================================================

/// Report as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub votes: Tally,
    pub user_vote: Option<Polarity>,
}

impl ReportView {
    fn from_row(row: ReportRow, user_vote: Option<Polarity>) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            category: row.category,
            location: row.location,
            image_url: row.image_url,
            created_at: row.created_at,
            votes: row.votes,
            user_vote,
        }
    }
}

/// Unvalidated submission fields.
#[derive(Debug, Clone, Default)]
pub struct ReportDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
}

/// Image attached to a submission.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// =============================================================================
// IMAGE HELPERS
// =============================================================================

/// Raster types accepted for upload and the extension each is stored under.
/// Anything else (notably `image/svg+xml` and `text/html`) could run script
/// when served back from `/uploads`.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

fn content_type_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    IMAGE_TYPES.iter().find(|(mime, _)| *mime == essence).map(|(_, ext)| *ext)
}

/// Allow-listed extension from the uploaded filename, else the one implied
/// by the content type. `None` if the content type is not accepted.
pub(crate) fn image_extension(image: &ImageUpload) -> Option<&'static str> {
    let from_type = content_type_extension(&image.content_type)?;
    let from_name = image
        .filename
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| IMAGE_EXTENSIONS.iter().find(|allowed| **allowed == ext).copied());
    Some(from_name.unwrap_or(from_type))
}

/// Check the image and return the extension it will be stored under.
fn validate_image(image: &ImageUpload, max_bytes: usize) -> Result<&'static str, ServiceError> {
    let Some(ext) = image_extension(image) else {
        return Err(ServiceError::Validation(format!(
            "image must be PNG, JPEG, GIF, or WebP, got {:?}",
            image.content_type
        )));
    };
    if image.bytes.is_empty() {
        return Err(ServiceError::Validation("image is empty".into()));
    }
    if image.bytes.len() > max_bytes {
        return Err(ServiceError::Validation(format!("image exceeds {max_bytes} bytes")));
    }
    Ok(ext)
}

pub(crate) fn random_blob_name() -> String {
    let mut rng = rand::rng();
    (0..BLOB_NAME_LEN)
        .map(|_| BLOB_NAME_ALPHABET[rng.random_range(0..BLOB_NAME_ALPHABET.len())] as char)
        .collect()
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Reports newest-first, optionally filtered to one category.
///
/// # Errors
///
/// [`ServiceError::TransientStoreFailure`] if a store call fails.
pub async fn list<S>(
    store: &S,
    session: Option<&Session>,
    category: Option<Category>,
) -> Result<Vec<ReportView>, ServiceError>
where
    S: ReportStore + VoteStore + ?Sized,
{
    let rows = store.list_reports(category).await?;

    let mut user_votes = std::collections::HashMap::new();
    if let Some(user) = session {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        user_votes = store.user_votes(user.user_id, &ids).await?;
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let vote = user_votes.get(&row.id).copied();
            ReportView::from_row(row, vote)
        })
        .collect())
}

/// One report with tally and, with a session, the caller's vote.
///
/// # Errors
///
/// [`ServiceError::NotFound`] if the report does not exist.
pub async fn get<S>(store: &S, session: Option<&Session>, report_id: Uuid) -> Result<ReportView, ServiceError>
where
    S: ReportStore + VoteStore + ?Sized,
{
    let row = store
        .get_report(report_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("report {report_id}")))?;
    let user_vote = match session {
        Some(user) => store.user_vote(report_id, user.user_id).await?,
        None => None,
    };
    Ok(ReportView::from_row(row, user_vote))
}

/// Validate and persist a new report, uploading its image first.
///
/// # Errors
///
/// - [`ServiceError::Unauthenticated`] without a session (nothing stored).
/// - [`ServiceError::Validation`] for blank/oversized fields, an unknown
///   category, or an unacceptable image (nothing stored).
/// - [`ServiceError::TransientStoreFailure`] if the blob or row write fails.
pub async fn create<S>(
    store: &S,
    blobs: &dyn BlobStore,
    session: Option<&Session>,
    draft: ReportDraft,
    image: Option<ImageUpload>,
    max_image_bytes: usize,
) -> Result<ReportView, ServiceError>
where
    S: ReportStore + ?Sized,
{
    let user = session::require(session)?;

    let title = required_text("title", &draft.title, MAX_TITLE_CHARS)?;
    let description = required_text("description", &draft.description, MAX_DESCRIPTION_CHARS)?;
    let location = required_text("location", &draft.location, MAX_LOCATION_CHARS)?;
    let category = Category::parse(&draft.category)?;
    let image = match image {
        Some(image) => {
            let ext = validate_image(&image, max_image_bytes)?;
            Some((image, ext))
        }
        None => None,
    };

    let image_url = match image {
        Some((image, ext)) => {
            let path = format!("public/{}.{ext}", random_blob_name());
            let url = blobs.upload(&path, image.bytes, &image.content_type).await?;
            Some(url)
        }
        None => None,
    };

    let uploaded = image_url.clone();
    let new_report = NewReport { user_id: user.user_id, title, description, category, location, image_url };
    let row = match store.insert_report(new_report).await {
        Ok(row) => row,
        Err(e) => {
            if let Some(url) = uploaded {
                warn!(error = %e, %url, "report insert failed after image upload; blob left orphaned");
            }
            return Err(e.into());
        }
    };

    info!(report_id = %row.id, user_id = %user.user_id, category = %row.category, "report created");
    Ok(ReportView::from_row(row, None))
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
