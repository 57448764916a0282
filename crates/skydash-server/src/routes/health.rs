//! Health check endpoint

use axum::{Json, extract::State};

use crate::dto::HealthResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// Health check endpoint (verifies database and rank store connectivity)
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database = state.persistence.health_check().await.unwrap_or(false);
    let redis = state.rank.ping().await.unwrap_or(false);

    let status = if database && redis {
        "healthy"
    } else {
        "degraded"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        redis,
    }))
}
