//! Persistence interfaces and backends for skydash-core.
//!
//! This module defines the persistence abstraction and the PostgreSQL
//! backend. The relational store is the single source of truth for users,
//! run tokens, runs, best scores, and the point ledger.

pub mod postgres;

pub use self::postgres::PostgresPersistence;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::validator::FlagReason;

/// User record from the persistence layer.
///
/// Authentication is owned by the identity provider; this row owns the
/// gameplay attributes (display name, point balance, guest flag).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    /// Unique identifier for the user.
    pub id: Uuid,
    /// Display name, unique case-insensitively.
    pub display_name: String,
    /// Current point balance. Never negative.
    pub points: i64,
    /// Whether this is a guest account.
    pub is_guest: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

/// Run token record from the persistence layer.
///
/// A capability granting exactly one run submission. Redeemable only while
/// `used` is false, the expiry is in the future, and the submitting caller
/// matches `user_id`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunTokenRecord {
    /// Opaque token value.
    pub token: String,
    /// User the token was issued to.
    pub user_id: Uuid,
    /// When the token stops being redeemable.
    pub expires_at: DateTime<Utc>,
    /// Whether the token has been consumed.
    pub used: bool,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
}

/// Leaderboard join row: the display attributes for a set of user ids.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DisplayRow {
    /// User id.
    pub user_id: Uuid,
    /// Display name.
    pub display_name: String,
    /// Whether this is a guest account.
    pub is_guest: bool,
}

/// Reason recorded on a point ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointReason {
    /// Points earned by an accepted run.
    Run,
    /// Points spent in the cosmetic shop.
    Purchase,
}

impl PointReason {
    /// Stable string form, as stored in the `point_transactions.reason` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Purchase => "purchase",
        }
    }
}

/// An accepted run ready to be committed.
#[derive(Debug, Clone)]
pub struct AcceptedRun {
    /// Submitting user.
    pub user_id: Uuid,
    /// Token being consumed.
    pub token: String,
    /// Validated score.
    pub score: i32,
    /// Claimed run duration in milliseconds.
    pub duration_ms: i64,
    /// Hash of the submitter's network origin.
    pub ip_hash: String,
    /// Whether the validator flagged the run for review.
    pub flagged: bool,
    /// Why the run was flagged, when it was.
    pub flag_reason: Option<FlagReason>,
}

/// A rejected run that is still consumed and logged.
#[derive(Debug, Clone)]
pub struct RejectedRun {
    /// Submitting user.
    pub user_id: Uuid,
    /// Token being consumed.
    pub token: String,
    /// Claimed score, as submitted.
    pub score: i32,
    /// Claimed run duration in milliseconds.
    pub duration_ms: i64,
    /// Hash of the submitter's network origin.
    pub ip_hash: String,
    /// Why the validator rejected the run.
    pub flag_reason: FlagReason,
}

/// Result of committing an accepted run.
#[derive(Debug, Clone, Copy)]
pub struct CommitOutcome {
    /// Id of the inserted run row.
    pub run_id: i64,
    /// Whether this run set a new personal best.
    pub is_new_best: bool,
    /// The user's best score after the commit.
    pub best_score: i32,
    /// The user's point balance after the commit.
    pub points_balance: i64,
}

/// Persistence interface used by the submission coordinator and the
/// leaderboard query service.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Persist a freshly issued run token.
    async fn create_run_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Look up a run token by value. Read-only; redemption happens inside
    /// [`commit_accepted_run`](Self::commit_accepted_run) or
    /// [`record_rejected_run`](Self::record_rejected_run).
    async fn get_run_token(&self, token: &str) -> Result<Option<RunTokenRecord>, CoreError>;

    /// Atomically commit an accepted run.
    ///
    /// In one transaction: consume the token (guarded, so exactly one
    /// concurrent submission can win), insert the run row, credit the score
    /// to the user's point balance, append the ledger entry, and replace the
    /// best-score record when the new score is strictly greater.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenAlreadyUsed`] when another submission
    /// consumed the token first; no other write of the transaction survives.
    async fn commit_accepted_run(&self, run: &AcceptedRun) -> Result<CommitOutcome, CoreError>;

    /// Atomically consume the token and log a rejected run.
    ///
    /// No points are credited and the best-score record is untouched.
    /// Consuming the token on rejection prevents retry-on-reject farming.
    async fn record_rejected_run(&self, run: &RejectedRun) -> Result<i64, CoreError>;

    /// Fetch a user by id.
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, CoreError>;

    /// Batch-fetch display attributes for the given user ids.
    ///
    /// Order of the result is unspecified; callers re-associate by id.
    async fn display_rows(&self, user_ids: &[Uuid]) -> Result<Vec<DisplayRow>, CoreError>;

    /// Case-insensitive substring search over display names, capped at
    /// `limit` candidates.
    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<DisplayRow>, CoreError>;

    /// Cheap connectivity probe for health checks.
    async fn health_check(&self) -> Result<bool, CoreError>;
}
