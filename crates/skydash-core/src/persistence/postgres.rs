// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL persistence for skydash-core.
//!
//! All durable storage access for users, run tokens, runs, best scores, and
//! the point ledger. The commit paths run inside a single transaction so a
//! concurrent submission can never observe a half-updated balance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AcceptedRun, CommitOutcome, DisplayRow, Persistence, PointReason, RejectedRun,
    RunTokenRecord, UserRecord,
};
use crate::error::CoreError;

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escape `%`, `_`, and `\` so a search query matches literally inside an
/// ILIKE pattern.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Persistence for PostgresPersistence {
    // ========================================================================
    // Run Tokens
    // ========================================================================

    async fn create_run_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO run_tokens (token, user_id, expires_at, used, created_at)
            VALUES ($1, $2, $3, FALSE, NOW())
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_run_token(&self, token: &str) -> Result<Option<RunTokenRecord>, CoreError> {
        let record = sqlx::query_as::<_, RunTokenRecord>(
            r#"
            SELECT token, user_id, expires_at, used, created_at
            FROM run_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    // ========================================================================
    // Run Commit
    // ========================================================================

    async fn commit_accepted_run(&self, run: &AcceptedRun) -> Result<CommitOutcome, CoreError> {
        let mut tx = self.pool.begin().await?;

        // Guarded consume: exactly one concurrent submission can flip
        // used = false -> true. The loser sees zero rows and the whole
        // transaction rolls back.
        let consumed = sqlx::query(
            r#"
            UPDATE run_tokens
            SET used = TRUE
            WHERE token = $1 AND used = FALSE
            "#,
        )
        .bind(&run.token)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            return Err(CoreError::TokenAlreadyUsed {
                token: run.token.clone(),
            });
        }

        let (run_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO runs (user_id, score, duration_ms, token, ip_hash, flagged, flag_reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id
            "#,
        )
        .bind(run.user_id)
        .bind(run.score)
        .bind(run.duration_ms)
        .bind(&run.token)
        .bind(&run.ip_hash)
        .bind(run.flagged)
        .bind(run.flag_reason.map(|r| r.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        let points_balance: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET points = points + $2
            WHERE id = $1
            RETURNING points
            "#,
        )
        .bind(run.user_id)
        .bind(run.score as i64)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((points_balance,)) = points_balance else {
            return Err(CoreError::UserNotFound {
                user_id: run.user_id.to_string(),
            });
        };

        sqlx::query(
            r#"
            INSERT INTO point_transactions (user_id, delta, reason, reference, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(run.user_id)
        .bind(run.score as i64)
        .bind(PointReason::Run.as_str())
        .bind(run_id.to_string())
        .execute(&mut *tx)
        .await?;

        // Read-or-create the best score. The conditional upsert only returns
        // a row when the stored best was strictly beaten.
        let new_best: Option<(i32,)> = sqlx::query_as(
            r#"
            INSERT INTO user_best_scores (user_id, best_score, achieved_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET best_score = EXCLUDED.best_score, achieved_at = EXCLUDED.achieved_at
            WHERE user_best_scores.best_score < EXCLUDED.best_score
            RETURNING best_score
            "#,
        )
        .bind(run.user_id)
        .bind(run.score)
        .fetch_optional(&mut *tx)
        .await?;

        let (is_new_best, best_score) = match new_best {
            Some((best,)) => (true, best),
            None => {
                let (best,): (i32,) = sqlx::query_as(
                    r#"
                    SELECT best_score FROM user_best_scores WHERE user_id = $1
                    "#,
                )
                .bind(run.user_id)
                .fetch_one(&mut *tx)
                .await?;
                (false, best)
            }
        };

        tx.commit().await?;

        Ok(CommitOutcome {
            run_id,
            is_new_best,
            best_score,
            points_balance,
        })
    }

    async fn record_rejected_run(&self, run: &RejectedRun) -> Result<i64, CoreError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            r#"
            UPDATE run_tokens
            SET used = TRUE
            WHERE token = $1 AND used = FALSE
            "#,
        )
        .bind(&run.token)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            return Err(CoreError::TokenAlreadyUsed {
                token: run.token.clone(),
            });
        }

        let (run_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO runs (user_id, score, duration_ms, token, ip_hash, flagged, flag_reason, created_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, NOW())
            RETURNING id
            "#,
        )
        .bind(run.user_id)
        .bind(run.score)
        .bind(run.duration_ms)
        .bind(&run.token)
        .bind(&run.ip_hash)
        .bind(run.flag_reason.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(run_id)
    }

    // ========================================================================
    // Users
    // ========================================================================

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, CoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, display_name, points, is_guest, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn display_rows(&self, user_ids: &[Uuid]) -> Result<Vec<DisplayRow>, CoreError> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query_as::<_, DisplayRow>(
            r#"
            SELECT id AS user_id, display_name, is_guest
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<DisplayRow>, CoreError> {
        let pattern = format!("%{}%", escape_like(query));

        let rows = sqlx::query_as::<_, DisplayRow>(
            r#"
            SELECT id AS user_id, display_name, is_guest
            FROM users
            WHERE display_name ILIKE $1
            ORDER BY display_name
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_passes_plain_text() {
        assert_eq!(escape_like("alice"), "alice");
    }

    #[test]
    fn test_escape_like_escapes_wildcards() {
        assert_eq!(escape_like("a%b"), "a\\%b");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("100%_\\"), "100\\%\\_\\\\");
    }
}
