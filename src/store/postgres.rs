//! Postgres-backed store.
//!
//! Queries are plain SQLx statements against the schema in
//! `src/db/migrations`. Vote tallies and the caller's vote go through the
//! `get_report_votes` / `get_user_vote` SQL functions so ad-hoc SQL clients
//! see the same aggregation the API does.

use std::collections::HashMap;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AuthStore, CommentRow, CommentStore, NewReport, ReportRow, ReportStore, SessionRow, StoreError, UserRow,
    VoteRow, VoteStore,
};
use crate::services::category::Category;
use crate::services::vote::{Polarity, Tally};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_category(raw: &str) -> Result<Category, StoreError> {
    Category::from_label(raw).ok_or_else(|| StoreError::Backend(format!("unknown category in row: {raw:?}")))
}

fn parse_polarity(raw: &str) -> Result<Polarity, StoreError> {
    Polarity::parse(raw).ok_or_else(|| StoreError::Backend(format!("unknown vote_type in row: {raw:?}")))
}

fn report_from_row(row: &PgRow) -> Result<ReportRow, StoreError> {
    let category: String = row.try_get("category")?;
    Ok(ReportRow {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: parse_category(&category)?,
        location: row.try_get("location")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get("created_at")?,
        votes: Tally { up: row.try_get("up")?, down: row.try_get("down")? },
    })
}

fn comment_from_row(row: &PgRow) -> Result<CommentRow, StoreError> {
    Ok(CommentRow {
        id: row.try_get("id")?,
        report_id: row.try_get("report_id")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("display_name")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<UserRow, StoreError> {
    Ok(UserRow {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        password_hash: row.try_get("password_hash")?,
    })
}

const REPORT_COLUMNS: &str = "r.id, r.user_id, r.title, r.description, r.category, r.location, r.image_url, \
                              r.created_at, v.up, v.down";

// =============================================================================
// REPORTS
// =============================================================================

#[async_trait::async_trait]
impl ReportStore for PgStore {
    async fn list_reports(&self, category: Option<Category>) -> Result<Vec<ReportRow>, StoreError> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS}
             FROM reports r
             CROSS JOIN LATERAL get_report_votes(r.id) v
             WHERE ($1::text IS NULL OR r.category = $1)
             ORDER BY r.created_at DESC, r.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(category.map(Category::as_str))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(report_from_row).collect()
    }

    async fn get_report(&self, report_id: Uuid) -> Result<Option<ReportRow>, StoreError> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS}
             FROM reports r
             CROSS JOIN LATERAL get_report_votes(r.id) v
             WHERE r.id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(report_from_row).transpose()
    }

    async fn insert_report(&self, report: NewReport) -> Result<ReportRow, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO reports (user_id, title, description, category, location, image_url)
              VALUES ($1, $2, $3, $4, $5, $6)
              RETURNING id, created_at",
        )
        .bind(report.user_id)
        .bind(&report.title)
        .bind(&report.description)
        .bind(report.category.as_str())
        .bind(&report.location)
        .bind(&report.image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReportRow {
            id: row.try_get("id")?,
            user_id: report.user_id,
            title: report.title,
            description: report.description,
            category: report.category,
            location: report.location,
            image_url: report.image_url,
            created_at: row.try_get("created_at")?,
            votes: Tally::default(),
        })
    }
}

// =============================================================================
// VOTES
// =============================================================================

#[async_trait::async_trait]
impl VoteStore for PgStore {
    async fn find_vote(&self, report_id: Uuid, user_id: Uuid) -> Result<Option<VoteRow>, StoreError> {
        let row = sqlx::query("SELECT id, vote_type FROM votes WHERE report_id = $1 AND user_id = $2")
            .bind(report_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let vote_type: String = row.try_get("vote_type")?;
        Ok(Some(VoteRow { id: row.try_get("id")?, polarity: parse_polarity(&vote_type)? }))
    }

    async fn insert_vote(&self, report_id: Uuid, user_id: Uuid, polarity: Polarity) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO votes (report_id, user_id, vote_type) VALUES ($1, $2, $3)")
            .bind(report_id)
            .bind(user_id)
            .bind(polarity.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_vote(&self, vote_id: Uuid, expected: Polarity, next: Polarity) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE votes SET vote_type = $3, updated_at = now() WHERE id = $1 AND vote_type = $2")
            .bind(vote_id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("vote {vote_id} changed concurrently")));
        }
        Ok(())
    }

    async fn delete_vote(&self, vote_id: Uuid, expected: Polarity) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM votes WHERE id = $1 AND vote_type = $2")
            .bind(vote_id)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("vote {vote_id} changed concurrently")));
        }
        Ok(())
    }

    async fn tally(&self, report_id: Uuid) -> Result<Tally, StoreError> {
        let row = sqlx::query("SELECT up, down FROM get_report_votes($1)")
            .bind(report_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Tally { up: row.try_get("up")?, down: row.try_get("down")? })
    }

    async fn user_vote(&self, report_id: Uuid, user_id: Uuid) -> Result<Option<Polarity>, StoreError> {
        let vote_type: Option<String> = sqlx::query_scalar("SELECT get_user_vote($1, $2)")
            .bind(report_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        vote_type.as_deref().map(parse_polarity).transpose()
    }

    async fn user_votes(&self, user_id: Uuid, report_ids: &[Uuid]) -> Result<HashMap<Uuid, Polarity>, StoreError> {
        if report_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT report_id, vote_type FROM votes WHERE user_id = $1 AND report_id = ANY($2)",
        )
        .bind(user_id)
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(report_id, vote_type)| Ok((report_id, parse_polarity(&vote_type)?)))
            .collect()
    }
}

// =============================================================================
// COMMENTS
// =============================================================================

#[async_trait::async_trait]
impl CommentStore for PgStore {
    async fn list_comments(&self, report_id: Uuid) -> Result<Vec<CommentRow>, StoreError> {
        let rows = sqlx::query(
            r"SELECT c.id, c.report_id, c.user_id, c.content, c.created_at, u.display_name
              FROM comments c
              JOIN users u ON u.id = c.user_id
              WHERE c.report_id = $1
              ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn insert_comment(&self, report_id: Uuid, user_id: Uuid, content: &str) -> Result<CommentRow, StoreError> {
        let row = sqlx::query(
            r"WITH inserted AS (
                  INSERT INTO comments (report_id, user_id, content)
                  VALUES ($1, $2, $3)
                  RETURNING id, report_id, user_id, content, created_at
              )
              SELECT i.id, i.report_id, i.user_id, i.content, i.created_at, u.display_name
              FROM inserted i
              JOIN users u ON u.id = i.user_id",
        )
        .bind(report_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        comment_from_row(&row)
    }
}

// =============================================================================
// USERS / SESSIONS
// =============================================================================

#[async_trait::async_trait]
impl AuthStore for PgStore {
    async fn insert_user(&self, email: &str, display_name: &str, password_hash: &str) -> Result<UserRow, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO users (email, display_name, password_hash)
              VALUES ($1, $2, $3)
              RETURNING id, email, display_name, password_hash",
        )
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        user_from_row(&row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        let row = sqlx::query("SELECT id, email, display_name, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRow>, StoreError> {
        let row = sqlx::query(
            r"SELECT u.id, u.email, u.display_name
              FROM sessions s
              JOIN users u ON u.id = s.user_id
              WHERE s.token_hash = $1 AND s.expires_at > now()",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(SessionRow {
            user_id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
        }))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
