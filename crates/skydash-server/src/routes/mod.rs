//! API route handlers

pub mod health;
pub mod leaderboard;
pub mod runs;

use axum::{Router, routing::get, routing::post};

use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(health::health_check))
        // Run pipeline endpoints
        .route("/api/runs/token", post(runs::issue_token))
        .route("/api/runs", post(runs::submit_run))
        // Leaderboard endpoints
        .route("/api/leaderboard", get(leaderboard::leaderboard))
        .route("/api/leaderboard/me", get(leaderboard::neighborhood))
        // State
        .with_state(state)
}
