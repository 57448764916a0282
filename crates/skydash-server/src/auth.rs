// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bearer-token authentication.
//!
//! Session tokens are minted by the external identity provider; this server
//! only verifies the HS256 signature and extracts the stable user id from
//! the `sub` claim.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// Stable user id from the session token's `sub` claim.
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Verify a bearer header value and extract the caller's user id.
pub(crate) fn verify_bearer(
    header: Option<&str>,
    decoding_key: &DecodingKey,
) -> Result<Uuid, ApiError> {
    let header = header.ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".into()))?;

    let data =
        jsonwebtoken::decode::<Claims>(token, decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|_| ApiError::Unauthorized("invalid session token".into()))?;

    Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ApiError::Unauthorized("invalid subject claim".into()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let user_id = verify_bearer(header, &state.jwt_decoding_key)?;
        Ok(AuthUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    fn make_token(secret: &str, sub: &str) -> String {
        let claims = TestClaims {
            sub: sub.to_string(),
            exp: 4_000_000_000, // far future
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_bearer_token() {
        let key = DecodingKey::from_secret(b"secret");
        let user_id = Uuid::new_v4();
        let token = make_token("secret", &user_id.to_string());
        let header = format!("Bearer {}", token);

        let extracted = verify_bearer(Some(&header), &key).unwrap();
        assert_eq!(extracted, user_id);
    }

    #[test]
    fn test_missing_header_rejected() {
        let key = DecodingKey::from_secret(b"secret");
        let err = verify_bearer(None, &key).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_non_bearer_header_rejected() {
        let key = DecodingKey::from_secret(b"secret");
        let err = verify_bearer(Some("Basic dXNlcjpwYXNz"), &key).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let key = DecodingKey::from_secret(b"secret");
        let token = make_token("other-secret", &Uuid::new_v4().to_string());
        let header = format!("Bearer {}", token);

        let err = verify_bearer(Some(&header), &key).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let key = DecodingKey::from_secret(b"secret");
        let token = make_token("secret", "not-a-uuid");
        let header = format!("Bearer {}", token);

        let err = verify_bearer(Some(&header), &key).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }
}
