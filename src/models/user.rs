// SPDX-License-Identifier: MIT

//! User identity record.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row per end user. Created on first successful OAuth callback,
/// updated on every login, deleted on account deletion. No soft delete.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Locally assigned stable surrogate key
    pub user_id: i64,
    /// GitHub's stable account id; unique; find-or-create key on login
    pub upstream_id: i64,
    /// Profile snapshot, refreshed on each successful login
    pub username: String,
    /// May be empty if GitHub exposes no usable address
    pub email: String,
    pub avatar_url: String,
    /// Hash of the current refresh-token secret; never the raw secret.
    /// A single nullable slot: issuing a new token overwrites the old.
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    /// Absolute expiry of the current refresh token
    #[serde(skip_serializing)]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    /// Billing flags, written by the billing collaborator
    pub is_pro_plan: bool,
    pub pro_plan_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the stored refresh slot is usable at `now`.
    ///
    /// Expiry is exclusive: a token presented at exactly its expiry
    /// instant is already expired.
    pub fn refresh_token_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token_hash, self.refresh_token_expires_at) {
            (Some(_), Some(expires_at)) => now < expires_at,
            _ => false,
        }
    }
}
