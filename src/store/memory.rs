//! In-memory store.
//!
//! Mirrors the Postgres schema constraints (foreign keys, the
//! `(user_id, report_id)` vote uniqueness, conditional vote writes) so the
//! services behave identically against either backend. Used by tests and by
//! local runs without `DATABASE_URL`; nothing survives a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AuthStore, CommentRow, CommentStore, NewReport, ReportRow, ReportStore, SessionRow, StoreError, UserRow,
    VoteRow, VoteStore,
};
use crate::services::category::Category;
use crate::services::vote::{Polarity, Tally};

#[derive(Debug, Clone)]
struct StoredReport {
    seq: u64,
    report: NewReport,
    id: Uuid,
    created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy)]
struct StoredVote {
    id: Uuid,
    report_id: Uuid,
    user_id: Uuid,
    polarity: Polarity,
}

#[derive(Debug, Clone)]
struct StoredComment {
    seq: u64,
    id: Uuid,
    report_id: Uuid,
    user_id: Uuid,
    content: String,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    seq: u64,
    users: HashMap<Uuid, UserRow>,
    sessions: HashMap<String, (Uuid, OffsetDateTime)>,
    reports: Vec<StoredReport>,
    votes: HashMap<Uuid, StoredVote>,
    comments: Vec<StoredComment>,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn tally(&self, report_id: Uuid) -> Tally {
        let mut tally = Tally::default();
        for vote in self.votes.values().filter(|v| v.report_id == report_id) {
            tally.add(vote.polarity);
        }
        tally
    }

    fn report_row(&self, stored: &StoredReport) -> ReportRow {
        ReportRow {
            id: stored.id,
            user_id: stored.report.user_id,
            title: stored.report.title.clone(),
            description: stored.report.description.clone(),
            category: stored.report.category,
            location: stored.report.location.clone(),
            image_url: stored.report.image_url.clone(),
            created_at: stored.created_at,
            votes: self.tally(stored.id),
        }
    }

    fn report_exists(&self, report_id: Uuid) -> bool {
        self.reports.iter().any(|r| r.id == report_id)
    }

    fn comment_row(&self, stored: &StoredComment) -> CommentRow {
        let username = self
            .users
            .get(&stored.user_id)
            .map(|u| u.display_name.clone())
            .unwrap_or_default();
        CommentRow {
            id: stored.id,
            report_id: stored.report_id,
            user_id: stored.user_id,
            username,
            content: stored.content.clone(),
            created_at: stored.created_at,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Report, vote, and comment write calls issued so far.
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store unavailable".into()));
        }
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock()
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryStore {
    async fn list_reports(&self, category: Option<Category>) -> Result<Vec<ReportRow>, StoreError> {
        let inner = self.lock()?;
        let mut matching: Vec<&StoredReport> = inner
            .reports
            .iter()
            .filter(|r| category.is_none_or(|c| r.report.category == c))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        Ok(matching.into_iter().map(|r| inner.report_row(r)).collect())
    }

    async fn get_report(&self, report_id: Uuid) -> Result<Option<ReportRow>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .reports
            .iter()
            .find(|r| r.id == report_id)
            .map(|r| inner.report_row(r)))
    }

    async fn insert_report(&self, report: NewReport) -> Result<ReportRow, StoreError> {
        let mut inner = self.lock_for_write()?;
        if !inner.users.contains_key(&report.user_id) {
            return Err(StoreError::NotFound(format!("user {}", report.user_id)));
        }
        let stored = StoredReport {
            seq: inner.next_seq(),
            report,
            id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
        };
        let row = inner.report_row(&stored);
        inner.reports.push(stored);
        Ok(row)
    }
}

#[async_trait::async_trait]
impl VoteStore for MemoryStore {
    async fn find_vote(&self, report_id: Uuid, user_id: Uuid) -> Result<Option<VoteRow>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .votes
            .values()
            .find(|v| v.report_id == report_id && v.user_id == user_id)
            .map(|v| VoteRow { id: v.id, polarity: v.polarity }))
    }

    async fn insert_vote(&self, report_id: Uuid, user_id: Uuid, polarity: Polarity) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write()?;
        if !inner.report_exists(report_id) {
            return Err(StoreError::NotFound(format!("report {report_id}")));
        }
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        if inner
            .votes
            .values()
            .any(|v| v.report_id == report_id && v.user_id == user_id)
        {
            return Err(StoreError::Conflict("votes_user_report_key".into()));
        }
        let id = Uuid::new_v4();
        inner.votes.insert(id, StoredVote { id, report_id, user_id, polarity });
        Ok(())
    }

    async fn update_vote(&self, vote_id: Uuid, expected: Polarity, next: Polarity) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write()?;
        match inner.votes.get_mut(&vote_id) {
            Some(vote) if vote.polarity == expected => {
                vote.polarity = next;
                Ok(())
            }
            _ => Err(StoreError::Conflict(format!("vote {vote_id} changed concurrently"))),
        }
    }

    async fn delete_vote(&self, vote_id: Uuid, expected: Polarity) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write()?;
        match inner.votes.get(&vote_id) {
            Some(vote) if vote.polarity == expected => {
                inner.votes.remove(&vote_id);
                Ok(())
            }
            _ => Err(StoreError::Conflict(format!("vote {vote_id} changed concurrently"))),
        }
    }

    async fn tally(&self, report_id: Uuid) -> Result<Tally, StoreError> {
        Ok(self.lock()?.tally(report_id))
    }

    async fn user_vote(&self, report_id: Uuid, user_id: Uuid) -> Result<Option<Polarity>, StoreError> {
        Ok(self.find_vote(report_id, user_id).await?.map(|v| v.polarity))
    }

    async fn user_votes(&self, user_id: Uuid, report_ids: &[Uuid]) -> Result<HashMap<Uuid, Polarity>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .votes
            .values()
            .filter(|v| v.user_id == user_id && report_ids.contains(&v.report_id))
            .map(|v| (v.report_id, v.polarity))
            .collect())
    }
}

#[async_trait::async_trait]
impl CommentStore for MemoryStore {
    async fn list_comments(&self, report_id: Uuid) -> Result<Vec<CommentRow>, StoreError> {
        let inner = self.lock()?;
        let mut matching: Vec<&StoredComment> = inner
            .comments
            .iter()
            .filter(|c| c.report_id == report_id)
            .collect();
        matching.sort_by_key(|c| (c.created_at, c.seq));
        Ok(matching.into_iter().map(|c| inner.comment_row(c)).collect())
    }

    async fn insert_comment(&self, report_id: Uuid, user_id: Uuid, content: &str) -> Result<CommentRow, StoreError> {
        let mut inner = self.lock_for_write()?;
        if !inner.report_exists(report_id) {
            return Err(StoreError::NotFound(format!("report {report_id}")));
        }
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        let stored = StoredComment {
            seq: inner.next_seq(),
            id: Uuid::new_v4(),
            report_id,
            user_id,
            content: content.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        };
        let row = inner.comment_row(&stored);
        inner.comments.push(stored);
        Ok(row)
    }
}

#[async_trait::async_trait]
impl AuthStore for MemoryStore {
    async fn insert_user(&self, email: &str, display_name: &str, password_hash: &str) -> Result<UserRow, StoreError> {
        let mut inner = self.lock()?;
        if inner.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        let row = UserRow {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            display_name: display_name.to_owned(),
            password_hash: password_hash.to_owned(),
        };
        inner.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        let now = OffsetDateTime::now_utc();
        inner.sessions.retain(|_, &mut (_, expires)| expires > now);
        inner.sessions.insert(token_hash.to_owned(), (user_id, expires_at));
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRow>, StoreError> {
        let mut inner = self.lock()?;
        let Some(&(user_id, expires_at)) = inner.sessions.get(token_hash) else {
            return Ok(None);
        };
        if expires_at <= OffsetDateTime::now_utc() {
            inner.sessions.remove(token_hash);
            return Ok(None);
        }
        Ok(inner.users.get(&user_id).map(|user| SessionRow {
            user_id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
        }))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        self.lock()?.sessions.remove(token_hash);
        Ok(())
    }
}

// =============================================================================
// TEST HOOKS
// =============================================================================

#[cfg(test)]
impl MemoryStore {
    /// Number of write calls (reports, votes, comments) issued so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with [`StoreError::Backend`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Session entries currently held, expired or not.
    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).sessions.len()
    }

    /// Vote rows stored for one `(user, report)` pair.
    pub fn vote_rows_for(&self, report_id: Uuid, user_id: Uuid) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .votes
            .values()
            .filter(|v| v.report_id == report_id && v.user_id == user_id)
            .count()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
