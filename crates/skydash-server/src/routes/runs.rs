// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run pipeline endpoints: token issuance and run submission.

use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::HeaderMap,
};

use crate::auth::AuthUser;
use crate::dto::{IssueTokenResponse, SubmitRunRequest, SubmitRunResponse, YouResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Issue a single-use run token for the caller
pub async fn issue_token(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<IssueTokenResponse>> {
    let issued = state.tokens.issue(user.user_id).await?;

    Ok(Json(IssueTokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// Submit a completed run
pub async fn submit_run(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Json(req): Json<SubmitRunRequest>,
) -> ApiResult<Json<SubmitRunResponse>> {
    let ip = client_ip(&headers, addr);

    let receipt = state
        .submissions
        .submit(user.user_id, &ip, &req.run_token, req.score, req.duration_ms)
        .await?;

    Ok(Json(SubmitRunResponse {
        top10: receipt.top,
        you: YouResponse {
            rank: receipt.you.rank,
            best_score: receipt.you.best_score,
            is_new_best: receipt.you.is_new_best,
        },
        points_earned: receipt.points_earned,
        points_balance: receipt.points_balance,
    }))
}

/// Resolve the client address, preferring the first hop recorded by the
/// reverse proxy over the socket peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}
