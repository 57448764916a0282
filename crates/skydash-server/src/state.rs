// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared application state.

use std::sync::Arc;

use jsonwebtoken::DecodingKey;

use skydash_core::persistence::Persistence;

use crate::rank::RankStore;
use crate::services::leaderboard::LeaderboardService;
use crate::services::submission::SubmissionCoordinator;
use crate::services::tokens::TokenIssuer;

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relational store, the source of truth.
    pub persistence: Arc<dyn Persistence>,
    /// Derived rank index and caches.
    pub rank: Arc<dyn RankStore>,
    /// Run token issuer.
    pub tokens: TokenIssuer,
    /// Run submission coordinator.
    pub submissions: SubmissionCoordinator,
    /// Leaderboard query service.
    pub leaderboard: LeaderboardService,
    /// Key for verifying identity-provider session tokens.
    pub jwt_decoding_key: Arc<DecodingKey>,
}

impl AppState {
    /// Assemble the state and its services.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        rank: Arc<dyn RankStore>,
        jwt_secret: &str,
    ) -> Self {
        Self {
            tokens: TokenIssuer::new(persistence.clone(), rank.clone()),
            submissions: SubmissionCoordinator::new(persistence.clone(), rank.clone()),
            leaderboard: LeaderboardService::new(persistence.clone(), rank.clone()),
            jwt_decoding_key: Arc::new(DecodingKey::from_secret(jwt_secret.as_bytes())),
            persistence,
            rank,
        }
    }
}
