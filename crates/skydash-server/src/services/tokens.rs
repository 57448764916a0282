// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run token issuance.
//!
//! A run token is a single-use capability authorizing one submission. Tokens
//! are issued at most once per cooldown window per user, enforced by a TTL'd
//! marker in the cache store so the limit holds across server instances.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use tracing::{info, instrument};
use uuid::Uuid;

use skydash_core::persistence::Persistence;

use crate::error::ApiError;
use crate::rank::RankStore;

/// How long an issued token stays redeemable, in minutes.
pub const TOKEN_VALIDITY_MINUTES: i64 = 10;

/// Minimum gap between two issuances for the same user.
pub const ISSUE_COOLDOWN: Duration = Duration::from_secs(3);

/// A freshly issued run token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Opaque token value the client echoes back on submission.
    pub token: String,
    /// When the token stops being redeemable.
    pub expires_at: DateTime<Utc>,
}

/// Run token issuer.
#[derive(Clone)]
pub struct TokenIssuer {
    persistence: Arc<dyn Persistence>,
    rank: Arc<dyn RankStore>,
}

impl TokenIssuer {
    /// Create the issuer.
    pub fn new(persistence: Arc<dyn Persistence>, rank: Arc<dyn RankStore>) -> Self {
        Self { persistence, rank }
    }

    /// Issue a run token for the caller.
    ///
    /// The cooldown marker is armed first and is not rolled back on a later
    /// store failure: a stray marker only costs the caller one extra wait.
    #[instrument(skip(self))]
    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedToken, ApiError> {
        let marker = format!("run_token_cooldown:{}", user_id);
        if !self.rank.try_acquire_marker(&marker, ISSUE_COOLDOWN).await? {
            return Err(ApiError::RateLimited(
                "a run token was issued moments ago".into(),
            ));
        }

        // The session token authenticated the caller, but the gameplay row
        // is provisioned separately at sign-in.
        if self.persistence.get_user(user_id).await?.is_none() {
            return Err(ApiError::Unauthorized("unknown user".into()));
        }

        let token = generate_token();
        let expires_at = Utc::now() + TimeDelta::minutes(TOKEN_VALIDITY_MINUTES);

        self.persistence
            .create_run_token(user_id, &token, expires_at)
            .await?;

        info!(%user_id, %expires_at, "Issued run token");

        Ok(IssuedToken { token, expires_at })
    }
}

/// 32 bytes of OS-seeded randomness, hex encoded.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::seeded_state;

    #[test]
    fn test_generated_tokens_are_unique_and_opaque() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_issue_persists_token_with_validity_window() {
        let store = seeded_state(&[("Alice", 40)]);
        let user = store.user_id("Alice");

        let issued = store.tokens.issue(user).await.unwrap();

        let record = store
            .persistence
            .token_record(&issued.token)
            .expect("token row persisted");
        assert_eq!(record.user_id, user);
        assert!(!record.used);
        assert_eq!(record.expires_at, issued.expires_at);
        assert!(issued.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_second_issue_inside_cooldown_is_rate_limited() {
        let store = seeded_state(&[("Alice", 40)]);
        let user = store.user_id("Alice");

        store.tokens.issue(user).await.unwrap();
        let err = store.tokens.issue(user).await.unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_cooldown_is_per_user() {
        let store = seeded_state(&[("Alice", 40), ("Bob", 90)]);

        store.tokens.issue(store.user_id("Alice")).await.unwrap();
        // Bob's marker is independent of Alice's.
        store.tokens.issue(store.user_id("Bob")).await.unwrap();
    }

    #[tokio::test]
    async fn test_issue_for_unprovisioned_user_is_unauthorized() {
        let store = seeded_state(&[]);
        let err = store.tokens.issue(uuid::Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_issue_after_cooldown_expires() {
        let store = seeded_state(&[("Alice", 40)]);
        let user = store.user_id("Alice");

        store.tokens.issue(user).await.unwrap();
        store.rank.expire_markers();
        store.tokens.issue(user).await.unwrap();
    }
}
