// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! API error types.
//!
//! Every error surfaced to a client carries a stable machine-readable code so
//! the client can distinguish "retry later" (rate limits, transient server
//! trouble) from "this run is gone, re-issue a token" (consumed tokens,
//! rejected runs).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use skydash_core::error::CoreError;

use crate::rank::RankError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Run token not found")]
    InvalidToken,

    #[error("Run token belongs to another user")]
    Forbidden,

    #[error("Run token already used")]
    TokenUsed,

    #[error("Run token expired")]
    TokenExpired,

    #[error("Run rejected: {0}")]
    InvalidRun(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    /// Stable error code surfaced in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::RateLimited(_) => "RATE_LIMITED",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::TokenUsed => "TOKEN_USED",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::InvalidRun(_) => "INVALID_RUN",
            ApiError::Internal(_) => "SERVER_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidToken => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::TokenUsed => StatusCode::CONFLICT,
            ApiError::TokenExpired => StatusCode::GONE,
            ApiError::InvalidRun(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TokenNotFound { .. } => ApiError::InvalidToken,
            CoreError::TokenAlreadyUsed { .. } => ApiError::TokenUsed,
            CoreError::ValidationError { field, message } => {
                ApiError::Validation(format!("{}: {}", field, message))
            }
            CoreError::UserNotFound { .. } | CoreError::DatabaseError { .. } => {
                ApiError::Internal(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RankError> for ApiError {
    fn from(err: RankError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ApiError::Unauthorized("x".into()).code(), "UNAUTHORIZED");
        assert_eq!(ApiError::RateLimited("x".into()).code(), "RATE_LIMITED");
        assert_eq!(ApiError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(ApiError::InvalidToken.code(), "INVALID_TOKEN");
        assert_eq!(ApiError::Forbidden.code(), "FORBIDDEN");
        assert_eq!(ApiError::TokenUsed.code(), "TOKEN_USED");
        assert_eq!(ApiError::TokenExpired.code(), "TOKEN_EXPIRED");
        assert_eq!(ApiError::InvalidRun("x".into()).code(), "INVALID_RUN");
        assert_eq!(ApiError::Internal("x".into()).code(), "SERVER_ERROR");
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = CoreError::TokenAlreadyUsed {
            token: "t".into(),
        }
        .into();
        assert_eq!(err.code(), "TOKEN_USED");

        let err: ApiError = CoreError::DatabaseError {
            operation: "q".into(),
            details: "down".into(),
        }
        .into();
        assert_eq!(err.code(), "SERVER_ERROR");
    }

    #[test]
    fn test_statuses_distinguish_retryable() {
        // Rate limits and transient server errors are retryable; consumed
        // tokens are terminal.
        assert_eq!(
            ApiError::RateLimited("x".into()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::TokenUsed.status(), StatusCode::CONFLICT);
    }
}
