// SPDX-License-Identifier: MIT

//! Session lifecycle: login, refresh, logout, unlink, account deletion.
//!
//! The manager itself is stateless; all durable state is the single
//! refresh-token slot on the user row. Rotation happens only at login.
//! Local mutations always run before any upstream call, and upstream
//! revocation failures are logged and swallowed so the user can always
//! sign out.

use crate::config::Config;
use crate::db::Db;
use crate::error::{AppError, Result};
use crate::middleware::auth::create_access_token;
use crate::models::User;
use crate::services::github::GithubClient;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Fixed refresh-token validity window, measured from issuance.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Orchestrates the session state machine against the store and the
/// upstream provider.
#[derive(Clone)]
pub struct SessionService {
    db: Db,
    github: GithubClient,
    jwt_signing_key: Vec<u8>,
}

/// Everything a successful login produces. The raw refresh secret and the
/// upstream token exist only here and in the cookies built from it.
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_secret: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub upstream_token: String,
}

impl SessionService {
    pub fn new(db: Db, github: GithubClient, config: &Config) -> Self {
        Self {
            db,
            github,
            jwt_signing_key: config.jwt_signing_key.clone(),
        }
    }

    /// Log in with a single-use authorization code.
    ///
    /// Find-or-create keyed by the upstream id; the profile snapshot is
    /// refreshed on existing rows. The refresh slot is overwritten
    /// unconditionally: a concurrent login for the same user resolves
    /// last-write-wins and the earlier secret becomes unusable.
    pub async fn login(&self, code: &str) -> Result<LoginOutcome> {
        let upstream_token = self.github.exchange_code(code).await?;
        let identity = self.github.fetch_identity(&upstream_token).await?;

        let user = match self
            .db
            .find_user_by_upstream_id(identity.upstream_id)
            .await?
        {
            Some(mut existing) => {
                self.db
                    .update_profile(
                        existing.user_id,
                        &identity.username,
                        &identity.email,
                        &identity.avatar_url,
                    )
                    .await?;
                existing.username = identity.username;
                existing.email = identity.email;
                existing.avatar_url = identity.avatar_url;
                existing
            }
            None => {
                self.db
                    .create_user(
                        identity.upstream_id,
                        &identity.username,
                        &identity.email,
                        &identity.avatar_url,
                    )
                    .await?
            }
        };

        // Rotation point: overwrite whatever secret was stored before.
        let refresh_secret = generate_refresh_secret();
        let refresh_expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS);
        self.db
            .set_refresh_slot(
                user.user_id,
                &hash_refresh_secret(&refresh_secret),
                refresh_expires_at,
            )
            .await?;

        let access_token = create_access_token(&user, &self.jwt_signing_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

        tracing::info!(
            user_id = user.user_id,
            upstream_id = user.upstream_id,
            username = %user.username,
            "Login successful"
        );

        Ok(LoginOutcome {
            user,
            access_token,
            refresh_secret,
            refresh_expires_at,
            upstream_token,
        })
    }

    /// Mint a new access token against a presented refresh secret.
    ///
    /// A hash with no matching row and a hash past its expiry answer
    /// identically; the client is never told which case occurred. The
    /// refresh secret is not rotated here, only at login.
    pub async fn refresh(&self, refresh_secret: &str) -> Result<String> {
        let hash = hash_refresh_secret(refresh_secret);
        let user = self
            .db
            .find_user_by_refresh_hash(&hash)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !user.refresh_token_valid_at(Utc::now()) {
            tracing::debug!(user_id = user.user_id, "Refresh token expired");
            return Err(AppError::Unauthenticated);
        }

        create_access_token(&user, &self.jwt_signing_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
    }

    /// Terminate the local session and revoke the single upstream token.
    ///
    /// Idempotent: already-cleared cookies clear zero rows and still
    /// succeed. The upstream call is fire-and-forget.
    pub async fn logout(
        &self,
        refresh_secret: Option<&str>,
        upstream_token: Option<&str>,
    ) -> Result<()> {
        self.clear_local_session(refresh_secret).await?;

        if let Some(token) = upstream_token {
            if let Err(e) = self.github.revoke_token(token).await {
                tracing::warn!(error = %e, "Upstream token revocation failed during logout");
            }
        }
        Ok(())
    }

    /// Like logout, but revokes the whole upstream grant: every token ever
    /// issued under the authorization becomes invalid. The local account
    /// and its data (chat history, tracked repositories) survive.
    pub async fn unlink(
        &self,
        refresh_secret: Option<&str>,
        upstream_token: Option<&str>,
    ) -> Result<()> {
        self.clear_local_session(refresh_secret).await?;

        if let Some(token) = upstream_token {
            if let Err(e) = self.github.revoke_grant(token).await {
                tracing::warn!(error = %e, "Upstream grant revocation failed during unlink");
            }
        }
        Ok(())
    }

    /// Delete the identity record for an already-authenticated caller.
    ///
    /// The refresh slot is cleared by user id first: redundant when the
    /// delete succeeds, but a delete that fails partway must not leave a
    /// row with a live refresh token behind.
    pub async fn delete_account(&self, user_id: i64, upstream_id: i64) -> Result<()> {
        self.db.clear_refresh_slot(user_id).await?;
        self.db.delete_user_by_upstream_id(upstream_id).await?;

        tracing::info!(user_id, upstream_id, "Account deleted");
        Ok(())
    }

    async fn clear_local_session(&self, refresh_secret: Option<&str>) -> Result<()> {
        if let Some(secret) = refresh_secret {
            let cleared = self
                .db
                .clear_refresh_slot_by_hash(&hash_refresh_secret(secret))
                .await?;
            // Zero rows means the slot was already rotated away or cleared
            // elsewhere; that is not an error.
            tracing::debug!(rows = cleared, "Cleared refresh slot");
        }
        Ok(())
    }
}

/// One-way hash of a refresh secret for at-rest storage.
pub fn hash_refresh_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a refresh secret with 256 bits of entropy.
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
