// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Leaderboard endpoints: ranked pages, name search, and the per-user
//! neighborhood view.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::auth::AuthUser;
use crate::dto::{
    LeaderboardQuery, LeaderboardResponse, NearbyPlayer, NeighborhoodQuery, NeighborhoodResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::services::leaderboard::SEARCH_CANDIDATE_CAP;
use crate::state::AppState;

/// Page size when the client doesn't ask for one.
const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page a client may request.
const MAX_PAGE_LIMIT: i64 = 100;

/// Shortest and longest accepted search query, in characters.
const SEARCH_LEN: std::ops::RangeInclusive<usize> = 2..=50;

/// Top pages and name search
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> ApiResult<Json<LeaderboardResponse>> {
    if let Some(search) = params.search {
        if !SEARCH_LEN.contains(&search.chars().count()) {
            return Err(ApiError::Validation(
                "search query must be 2 to 50 characters".into(),
            ));
        }

        let entries = state.leaderboard.search(&search).await?;
        return Ok(Json(LeaderboardResponse {
            total: entries.len() as u64,
            leaderboard: entries,
            offset: 0,
            limit: SEARCH_CANDIDATE_CAP as u64,
        }));
    }

    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::Validation("offset must be non-negative".into()));
    }

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }

    let page = state
        .leaderboard
        .top_page(offset as u64, limit as u64)
        .await?;

    Ok(Json(LeaderboardResponse {
        leaderboard: page.entries,
        total: page.total,
        offset: offset as u64,
        limit: limit as u64,
    }))
}

/// Window around the caller (or an explicitly requested rank)
pub async fn neighborhood(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<NeighborhoodQuery>,
) -> ApiResult<Json<NeighborhoodResponse>> {
    let center_rank = match params.rank {
        Some(rank) if rank < 1 => {
            return Err(ApiError::Validation("rank must be at least 1".into()));
        }
        Some(rank) => Some(rank as u64),
        None => None,
    };

    let hood = state
        .leaderboard
        .neighborhood(user.user_id, center_rank)
        .await?;

    let mut nearby_players =
        Vec::with_capacity(hood.above.len() + hood.below.len() + usize::from(hood.focus.is_some()));
    for entry in hood
        .above
        .into_iter()
        .chain(hood.focus)
        .chain(hood.below)
    {
        nearby_players.push(NearbyPlayer::from_entry(entry, user.user_id));
    }

    Ok(Json(NeighborhoodResponse {
        rank: hood.rank,
        best_score: hood.best_score,
        nearby_players,
        total_players: hood.total,
    }))
}
