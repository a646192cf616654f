//! Vote coordinator: the confirm/dispute toggle on reports.
//!
//! DESIGN
//! ======
//! Each `(user, report)` pair is in one of three states: no vote, `up`, or
//! `down`. [`transition`] is the pure state machine; [`apply`] reads the
//! current row, performs exactly one write, then re-reads the tally.
//!
//! | current | requested | next   | write  |
//! |---------|-----------|--------|--------|
//! | none    | P         | P      | insert |
//! | P       | P         | none   | delete |
//! | P       | Q         | Q      | update |
//!
//! TRADE-OFFS
//! ==========
//! The read-then-write is optimistic. Concurrent requests for the same pair
//! are resolved by the store: inserts hit the `(user_id, report_id)` unique
//! constraint and updates/deletes are conditional on the polarity that was
//! read. Losing either race surfaces [`ServiceError::Conflict`]; the caller
//! may retry with a fresh `apply`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::ServiceError;
use super::session::{self, Session};
use crate::store::{ReportStore, VoteStore};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Up,
    Down,
}

impl Polarity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Aggregate vote counts for one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub up: i64,
    pub down: i64,
}

impl Tally {
    /// Count one more vote of `polarity`.
    pub fn add(&mut self, polarity: Polarity) {
        match polarity {
            Polarity::Up => self.up += 1,
            Polarity::Down => self.down += 1,
        }
    }
}

/// The single store write a transition requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Insert(Polarity),
    Update(Polarity),
    Delete,
}

/// Result of [`apply`]: fresh tally plus the caller's resulting vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    pub votes: Tally,
    pub user_vote: Option<Polarity>,
}

// =============================================================================
// STATE MACHINE
// =============================================================================

#[must_use]
pub fn transition(current: Option<Polarity>, requested: Polarity) -> (Option<Polarity>, VoteAction) {
    match current {
        None => (Some(requested), VoteAction::Insert(requested)),
        Some(existing) if existing == requested => (None, VoteAction::Delete),
        Some(_) => (Some(requested), VoteAction::Update(requested)),
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Cast, switch, or retract the session user's vote on `report_id`.
///
/// # Errors
///
/// - [`ServiceError::Unauthenticated`] without a session (no store access).
/// - [`ServiceError::NotFound`] if the report does not exist (no write).
/// - [`ServiceError::Conflict`] if a concurrent write won the race.
/// - [`ServiceError::TransientStoreFailure`] if any store call failed.
pub async fn apply<S>(
    store: &S,
    session: Option<&Session>,
    report_id: Uuid,
    requested: Polarity,
) -> Result<VoteOutcome, ServiceError>
where
    S: ReportStore + VoteStore + ?Sized,
{
    let user = session::require(session)?;

    if store.get_report(report_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("report {report_id}")));
    }

    let existing = store.find_vote(report_id, user.user_id).await?;
    let (next, action) = transition(existing.map(|v| v.polarity), requested);
    debug!(%report_id, user_id = %user.user_id, ?action, "applying vote transition");

    match (action, existing) {
        (VoteAction::Update(polarity), Some(row)) => {
            store.update_vote(row.id, row.polarity, polarity).await?;
        }
        (VoteAction::Delete, Some(row)) => {
            store.delete_vote(row.id, row.polarity).await?;
        }
        (VoteAction::Insert(_), _) | (_, None) => {
            store.insert_vote(report_id, user.user_id, requested).await?;
        }
    }

    let votes = store.tally(report_id).await?;
    let user_vote = store.user_vote(report_id, user.user_id).await?;
    info!(%report_id, user_id = %user.user_id, up = votes.up, down = votes.down, ?next, "vote recorded");

    Ok(VoteOutcome { votes, user_vote })
}

#[cfg(test)]
#[path = "vote_test.rs"]
mod tests;
