// SPDX-License-Identifier: MIT

//! Access-token issuance and verification.
//!
//! Access tokens are short-lived HS256 JWTs carrying the identity claims;
//! a compromised token has a small blast radius and there is no server-side
//! lookup on the hot path.

use crate::error::AppError;
use crate::models::User;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Access-token lifetime. Short on purpose; the refresh token covers the gap.
pub const ACCESS_TOKEN_TTL_MINUTES: u64 = 15;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (local user id)
    pub sub: String,
    /// Upstream provider's account id
    pub upstream_id: i64,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub upstream_id: i64,
    pub username: String,
}

/// Middleware that requires a valid Bearer access token.
///
/// Any failure (missing header, bad signature, expired token) maps to 401;
/// the client is never told which.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        _ => return Err(AppError::Unauthenticated),
    };

    let claims = verify_access_token(token, &state.config.jwt_signing_key)?;

    let user_id: i64 = claims.sub.parse().map_err(|_| AppError::Unauthenticated)?;

    let auth_user = AuthUser {
        user_id,
        upstream_id: claims.upstream_id,
        username: claims.username,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Create a signed access token for a user.
pub fn create_access_token(user: &User, signing_key: &[u8]) -> anyhow::Result<String> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user.user_id.to_string(),
        upstream_id: user.upstream_id,
        username: user.username.clone(),
        email: user.email.clone(),
        avatar_url: user.avatar_url.clone(),
        iat: now,
        exp: now + (ACCESS_TOKEN_TTL_MINUTES * 60) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Verify a signed access token. Bad signature and expiry both map to
/// `Unauthenticated`.
pub fn verify_access_token(token: &str, signing_key: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user() -> User {
        User {
            user_id: 7,
            upstream_id: 42,
            username: "ada".to_string(),
            email: "ada@x.com".to_string(),
            avatar_url: "https://avatars.example/7".to_string(),
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            is_pro_plan: false,
            pro_plan_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

    #[test]
    fn test_access_token_roundtrip() {
        let token = create_access_token(&test_user(), KEY).unwrap();
        let claims = verify_access_token(&token, KEY).unwrap();

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.upstream_id, 42);
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.email, "ada@x.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = create_access_token(&test_user(), KEY).unwrap();
        let result = verify_access_token(&token, b"another_key_entirely_32_bytes!!!");
        assert!(matches!(result, Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let result = verify_access_token("not.a.jwt", KEY);
        assert!(matches!(result, Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_ttl_is_minutes_not_days() {
        let token = create_access_token(&test_user(), KEY).unwrap();
        let claims = verify_access_token(&token, KEY).unwrap();
        assert_eq!(claims.exp - claims.iat, (ACCESS_TOKEN_TTL_MINUTES * 60) as usize);
    }
}
