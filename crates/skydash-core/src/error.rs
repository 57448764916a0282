// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for skydash-core.
//!
//! Provides a unified error type that maps to stable error codes surfaced in
//! API responses.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while processing run submissions and queries.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// Run token was not found in the database.
    TokenNotFound {
        /// The token value that was not found.
        token: String,
    },

    /// Run token was already consumed by an earlier submission.
    ///
    /// Also returned to the loser of a concurrent redemption race: the
    /// guarded update inside the commit transaction observed `used = true`.
    TokenAlreadyUsed {
        /// The token value that was already used.
        token: String,
    },

    /// User row required by the operation does not exist.
    UserNotFound {
        /// The user ID that was not found.
        user_id: String,
    },

    /// Input validation failed.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TokenNotFound { .. } => "TOKEN_NOT_FOUND",
            Self::TokenAlreadyUsed { .. } => "TOKEN_USED",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenNotFound { token } => {
                write!(f, "Run token '{}' not found", token)
            }
            Self::TokenAlreadyUsed { token } => {
                write!(f, "Run token '{}' already used", token)
            }
            Self::UserNotFound { user_id } => {
                write!(f, "User '{}' not found", user_id)
            }
            Self::ValidationError { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let test_cases = vec![
            (
                CoreError::TokenNotFound {
                    token: "abc".to_string(),
                },
                "TOKEN_NOT_FOUND",
            ),
            (
                CoreError::TokenAlreadyUsed {
                    token: "abc".to_string(),
                },
                "TOKEN_USED",
            ),
            (
                CoreError::UserNotFound {
                    user_id: "u-1".to_string(),
                },
                "USER_NOT_FOUND",
            ),
            (
                CoreError::ValidationError {
                    field: "score".to_string(),
                    message: "out of range".to_string(),
                },
                "VALIDATION_ERROR",
            ),
            (
                CoreError::DatabaseError {
                    operation: "insert".to_string(),
                    details: "connection refused".to_string(),
                },
                "DATABASE_ERROR",
            ),
        ];

        for (error, expected_code) in test_cases {
            assert_eq!(
                error.error_code(),
                expected_code,
                "Error {:?} should have code {}",
                error,
                expected_code
            );
            assert!(!error.to_string().is_empty(), "Message should not be empty");
        }
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::TokenNotFound {
            token: "deadbeef".to_string(),
        };
        assert_eq!(err.to_string(), "Run token 'deadbeef' not found");

        let err = CoreError::TokenAlreadyUsed {
            token: "deadbeef".to_string(),
        };
        assert_eq!(err.to_string(), "Run token 'deadbeef' already used");

        let err = CoreError::ValidationError {
            field: "duration_ms".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Validation error for 'duration_ms': must be positive"
        );

        let err = CoreError::DatabaseError {
            operation: "commit_run".to_string(),
            details: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Database error during 'commit_run': connection refused"
        );
    }
}
