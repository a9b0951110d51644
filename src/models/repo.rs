// SPDX-License-Identifier: MIT

//! Tracked repositories and their stored issue summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A repository a user follows.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TrackedRepo {
    pub id: i64,
    pub user_id: i64,
    pub owner: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An issue summary written by the external analysis pipeline.
/// This API only reads these rows.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RepoIssue {
    pub id: i64,
    pub repo_id: i64,
    pub issue_number: i64,
    pub title: String,
    pub summary: Option<String>,
    pub state: String,
    pub updated_at: DateTime<Utc>,
}
