//! Comment repository: discussion threads under a report.

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::session::{self, Session};
use super::{ServiceError, required_text};
use crate::store::{CommentRow, CommentStore, ReportStore};

pub const MAX_COMMENT_CHARS: usize = 2000;

/// Comment as returned to clients, with the author's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub report_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            report_id: row.report_id,
            user_id: row.user_id,
            username: row.username,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

async fn ensure_report<S>(store: &S, report_id: Uuid) -> Result<(), ServiceError>
where
    S: ReportStore + ?Sized,
{
    match store.get_report(report_id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::NotFound(format!("report {report_id}"))),
    }
}

/// Comments on a report, oldest first.
///
/// # Errors
///
/// [`ServiceError::NotFound`] if the report does not exist.
pub async fn list<S>(store: &S, report_id: Uuid) -> Result<Vec<Comment>, ServiceError>
where
    S: ReportStore + CommentStore + ?Sized,
{
    ensure_report(store, report_id).await?;
    let rows = store.list_comments(report_id).await?;
    Ok(rows.into_iter().map(Comment::from).collect())
}

/// Add a comment from the session user.
///
/// # Errors
///
/// - [`ServiceError::Unauthenticated`] without a session.
/// - [`ServiceError::Validation`] if the trimmed content is empty or longer
///   than [`MAX_COMMENT_CHARS`].
/// - [`ServiceError::NotFound`] if the report does not exist.
pub async fn create<S>(
    store: &S,
    session: Option<&Session>,
    report_id: Uuid,
    content: &str,
) -> Result<Comment, ServiceError>
where
    S: ReportStore + CommentStore + ?Sized,
{
    let user = session::require(session)?;
    let content = required_text("content", content, MAX_COMMENT_CHARS)?;
    ensure_report(store, report_id).await?;

    let row = store.insert_comment(report_id, user.user_id, &content).await?;
    info!(comment_id = %row.id, %report_id, user_id = %user.user_id, "comment created");
    Ok(row.into())
}

#[cfg(test)]
#[path = "comment_test.rs"]
mod tests;
