//! Persistence seams.
//!
//! DESIGN
//! ======
//! Services talk to storage through the async traits below. [`PgStore`]
//! is the production backend; [`MemoryStore`] backs tests and local runs
//! without `DATABASE_URL`. Both enforce the same constraints: one vote row
//! per `(user, report)` and conditional vote updates/deletes.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::category::Category;
use crate::services::vote::{Polarity, Tally};

pub use memory::MemoryStore;
pub use postgres::PgStore;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint or compare-and-swap guard rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.constraint().unwrap_or("unique constraint").to_owned())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Self::NotFound(db.constraint().unwrap_or("referenced row").to_owned())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

// =============================================================================
// ROWS
// =============================================================================

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
}

/// Live session joined with its user.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
}

/// Report row with its aggregated tally.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub votes: Tally,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct VoteRow {
    pub id: Uuid,
    pub polarity: Polarity,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: Uuid,
    pub report_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// TRAITS
// =============================================================================

#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    /// Reports newest-first, optionally restricted to one category.
    async fn list_reports(&self, category: Option<Category>) -> Result<Vec<ReportRow>, StoreError>;

    async fn get_report(&self, report_id: Uuid) -> Result<Option<ReportRow>, StoreError>;

    async fn insert_report(&self, report: NewReport) -> Result<ReportRow, StoreError>;
}

#[async_trait::async_trait]
pub trait VoteStore: Send + Sync {
    async fn find_vote(&self, report_id: Uuid, user_id: Uuid) -> Result<Option<VoteRow>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the pair already has a vote.
    async fn insert_vote(&self, report_id: Uuid, user_id: Uuid, polarity: Polarity) -> Result<(), StoreError>;

    /// Fails with [`StoreError::Conflict`] unless the row still has `expected`.
    async fn update_vote(&self, vote_id: Uuid, expected: Polarity, next: Polarity) -> Result<(), StoreError>;

    /// Fails with [`StoreError::Conflict`] unless the row still has `expected`.
    async fn delete_vote(&self, vote_id: Uuid, expected: Polarity) -> Result<(), StoreError>;

    async fn tally(&self, report_id: Uuid) -> Result<Tally, StoreError>;

    async fn user_vote(&self, report_id: Uuid, user_id: Uuid) -> Result<Option<Polarity>, StoreError>;

    /// The user's votes across `report_ids`, keyed by report.
    async fn user_votes(&self, user_id: Uuid, report_ids: &[Uuid]) -> Result<HashMap<Uuid, Polarity>, StoreError>;
}

#[async_trait::async_trait]
pub trait CommentStore: Send + Sync {
    /// Comments oldest-first.
    async fn list_comments(&self, report_id: Uuid) -> Result<Vec<CommentRow>, StoreError>;

    async fn insert_comment(&self, report_id: Uuid, user_id: Uuid, content: &str) -> Result<CommentRow, StoreError>;
}

#[async_trait::async_trait]
pub trait AuthStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the e-mail is taken.
    async fn insert_user(&self, email: &str, display_name: &str, password_hash: &str) -> Result<UserRow, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError>;

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Unexpired session for `token_hash`, if any.
    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRow>, StoreError>;

    async fn delete_session(&self, token_hash: &str) -> Result<(), StoreError>;
}

/// Everything the application state needs from one backend.
pub trait Store: ReportStore + VoteStore + CommentStore + AuthStore {}

impl<T: ReportStore + VoteStore + CommentStore + AuthStore> Store for T {}
