// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run submission coordination.
//!
//! The coordinator owns the write path of the pipeline: rate limiting, token
//! redemption, plausibility validation, the atomic relational commit, and
//! the best-effort mirror into the rank index. PostgreSQL stays authoritative
//! throughout; the rank index is allowed to trail briefly and self-heals on
//! the next accepted run.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use skydash_core::persistence::{AcceptedRun, Persistence, RejectedRun};
use skydash_core::validator;

use crate::error::ApiError;
use crate::rank::RankStore;
use crate::services::leaderboard::{LeaderboardEntry, render_entries};

/// Submissions allowed per user per rolling hour.
pub const USER_HOURLY_CEILING: i64 = 100;

/// Submissions allowed per network origin per rolling hour.
pub const IP_HOURLY_CEILING: i64 = 500;

/// Rolling window for both submission counters.
const RATE_WINDOW: Duration = Duration::from_secs(3600);

/// Entries included in the response's top-list snapshot.
const TOP_SNAPSHOT_LEN: u64 = 10;

/// The caller's standing after an accepted submission.
#[derive(Debug, Clone)]
pub struct Standing {
    /// 1-based rank, `None` when the rank index has no entry yet.
    pub rank: Option<u64>,
    /// Best score after the commit.
    pub best_score: i32,
    /// Whether this run set a new personal best.
    pub is_new_best: bool,
}

/// Everything the client needs after an accepted submission.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    /// Current top of the leaderboard, possibly momentarily stale.
    pub top: Vec<LeaderboardEntry>,
    /// The caller's own standing.
    pub you: Standing,
    /// Points credited for this run.
    pub points_earned: i64,
    /// Point balance after the credit.
    pub points_balance: i64,
}

/// Hash a network origin for storage; raw addresses are never persisted.
pub fn hash_origin(ip: &str) -> String {
    hex::encode(Sha256::digest(ip.as_bytes()))
}

/// Run submission coordinator.
#[derive(Clone)]
pub struct SubmissionCoordinator {
    persistence: Arc<dyn Persistence>,
    rank: Arc<dyn RankStore>,
}

impl SubmissionCoordinator {
    /// Create the coordinator.
    pub fn new(persistence: Arc<dyn Persistence>, rank: Arc<dyn RankStore>) -> Self {
        Self { persistence, rank }
    }

    /// Process one run submission.
    #[instrument(skip(self, request_ip, token), fields(%user_id, score))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        request_ip: &str,
        token: &str,
        score: i32,
        duration_ms: i64,
    ) -> Result<SubmissionReceipt, ApiError> {
        // 1. Rate limits first, before any token or validator work, so abuse
        //    costs two cache increments and nothing else.
        let ip_hash = hash_origin(request_ip);

        let user_count = self
            .rank
            .incr_window(&format!("rate:submit:user:{}", user_id), RATE_WINDOW)
            .await?;
        if user_count > USER_HOURLY_CEILING {
            return Err(ApiError::RateLimited("hourly submission limit".into()));
        }

        let ip_count = self
            .rank
            .incr_window(&format!("rate:submit:ip:{}", ip_hash), RATE_WINDOW)
            .await?;
        if ip_count > IP_HOURLY_CEILING {
            return Err(ApiError::RateLimited("hourly submission limit".into()));
        }

        // 2. Token redemption checks, read-only at this point. Consumption
        //    happens inside the commit, guarded against concurrent winners.
        let record = self
            .persistence
            .get_run_token(token)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        if record.user_id != user_id {
            return Err(ApiError::Forbidden);
        }
        if record.used {
            return Err(ApiError::TokenUsed);
        }
        if record.expires_at <= Utc::now() {
            return Err(ApiError::TokenExpired);
        }

        // 3. Plausibility check. A rejected run still consumes the token and
        //    is logged, so rejection cannot be farmed for retries.
        let verdict = validator::validate(score, duration_ms);
        if let Some(reason) = verdict.rejection() {
            self.persistence
                .record_rejected_run(&RejectedRun {
                    user_id,
                    token: token.to_string(),
                    score,
                    duration_ms,
                    ip_hash,
                    flag_reason: reason,
                })
                .await?;

            info!(reason = reason.as_str(), "Rejected run submission");
            return Err(ApiError::InvalidRun(reason.as_str().to_string()));
        }

        // 4. Atomic commit: token, run row, points, ledger, best score.
        let outcome = self
            .persistence
            .commit_accepted_run(&AcceptedRun {
                user_id,
                token: token.to_string(),
                score,
                duration_ms,
                ip_hash,
                flagged: verdict.flagged,
                flag_reason: verdict.flag_reason,
            })
            .await?;

        if verdict.flagged {
            info!(run_id = outcome.run_id, "Accepted run flagged for review");
        }

        // 5. Mirror the committed best into the rank index. Best-effort: the
        //    relational commit already happened and stays authoritative.
        if let Err(e) = self.rank.upsert_score(user_id, outcome.best_score).await {
            warn!(error = %e, run_id = outcome.run_id, "Rank index update failed; will heal on next run");
        }

        // 6. Assemble the response snapshot. Rank reads may trail a racing
        //    writer; that staleness is within contract.
        let rank = self.rank.rank_of(user_id).await?;
        let scored = self.rank.range_by_rank(0, TOP_SNAPSHOT_LEN - 1).await?;
        let top = render_entries(self.persistence.as_ref(), &scored, 1).await?;

        Ok(SubmissionReceipt {
            top,
            you: Standing {
                rank: rank.map(|r| r + 1),
                best_score: outcome.best_score,
                is_new_best: outcome.is_new_best,
            },
            points_earned: score as i64,
            points_balance: outcome.points_balance,
        })
    }
}
