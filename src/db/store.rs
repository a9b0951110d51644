// SPDX-License-Identifier: MIT

//! SQLite store with typed single-row operations.
//!
//! Provides high-level operations for:
//! - Users (identity records and the refresh-token slot)
//! - Tracked repositories and their stored issue summaries
//! - Chat messages
//!
//! Every session-store operation is a single independent statement; there is
//! no multi-statement transaction around login. Concurrent writes to the same
//! user row resolve last-write-wins.

use crate::error::AppError;
use crate::models::{ChatMessage, RepoIssue, TrackedRepo, User};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    upstream_id INTEGER NOT NULL UNIQUE,
    username TEXT NOT NULL,
    email TEXT NOT NULL DEFAULT '',
    avatar_url TEXT NOT NULL DEFAULT '',
    refresh_token_hash TEXT,
    refresh_token_expires_at TEXT,
    is_pro_plan INTEGER NOT NULL DEFAULT 0,
    pro_plan_expires_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_refresh_hash ON users(refresh_token_hash);

CREATE TABLE IF NOT EXISTS tracked_repos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    owner TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(user_id, owner, name)
);

CREATE TABLE IF NOT EXISTS repo_issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id INTEGER NOT NULL REFERENCES tracked_repos(id) ON DELETE CASCADE,
    issue_number INTEGER NOT NULL,
    title TEXT NOT NULL,
    summary TEXT,
    state TEXT NOT NULL DEFAULT 'open',
    updated_at TEXT NOT NULL,
    UNIQUE(repo_id, issue_number)
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// SQLite database client.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Connect to the database at `url`.
    ///
    /// For tests, `sqlite::memory:` works; the pool is capped at a single
    /// connection in that case so every caller sees the same database.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::Database(format!("Invalid database URL: {}", e)))?
            .foreign_keys(true);

        // An in-memory database lives and dies with its connection, so the
        // pool must hold exactly one and never recycle it.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self { pool })
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Find a user by the upstream provider's account id.
    pub async fn find_user_by_upstream_id(
        &self,
        upstream_id: i64,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE upstream_id = ?")
            .bind(upstream_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Find a user by the hash of a presented refresh secret.
    pub async fn find_user_by_refresh_hash(&self, hash: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE refresh_token_hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Create a user row from a fresh upstream identity.
    pub async fn create_user(
        &self,
        upstream_id: i64,
        username: &str,
        email: &str,
        avatar_url: &str,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (upstream_id, username, email, avatar_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(upstream_id)
        .bind(username)
        .bind(email)
        .bind(avatar_url)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// Refresh the profile snapshot on an existing row.
    pub async fn update_profile(
        &self,
        user_id: i64,
        username: &str,
        email: &str,
        avatar_url: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET username = ?, email = ?, avatar_url = ?, updated_at = ? \
             WHERE user_id = ?",
        )
        .bind(username)
        .bind(email)
        .bind(avatar_url)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite the refresh-token slot. This is the rotation point: any
    /// previously stored hash becomes unusable.
    pub async fn set_refresh_slot(
        &self,
        user_id: i64,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = ?, refresh_token_expires_at = ?, \
             updated_at = ? WHERE user_id = ?",
        )
        .bind(hash)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear the refresh slot for the row holding `hash`, if any.
    /// Returns the number of rows touched; zero is not an error.
    pub async fn clear_refresh_slot_by_hash(&self, hash: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL, refresh_token_expires_at = NULL, \
             updated_at = ? WHERE refresh_token_hash = ?",
        )
        .bind(Utc::now())
        .bind(hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Clear the refresh slot by user id (used when the caller is already
    /// authenticated, e.g. account deletion).
    pub async fn clear_refresh_slot(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL, refresh_token_expires_at = NULL, \
             updated_at = ? WHERE user_id = ?",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete the identity record. Dependent rows cascade.
    pub async fn delete_user_by_upstream_id(&self, upstream_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE upstream_id = ?")
            .bind(upstream_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Update billing flags (written by the billing collaborator).
    pub async fn set_billing_plan(
        &self,
        user_id: i64,
        is_pro_plan: bool,
        pro_plan_expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET is_pro_plan = ?, pro_plan_expires_at = ?, updated_at = ? \
             WHERE user_id = ?",
        )
        .bind(is_pro_plan)
        .bind(pro_plan_expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a user id to the persisted username (notification boundary).
    pub async fn username_for_user(&self, user_id: i64) -> Result<Option<String>, AppError> {
        let username: Option<(String,)> =
            sqlx::query_as("SELECT username FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(username.map(|(u,)| u))
    }

    // ─── Tracked Repositories ────────────────────────────────────

    /// List the repositories a user follows.
    pub async fn list_repos(&self, user_id: i64) -> Result<Vec<TrackedRepo>, AppError> {
        let repos = sqlx::query_as::<_, TrackedRepo>(
            "SELECT * FROM tracked_repos WHERE user_id = ? ORDER BY owner, name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(repos)
    }

    /// Get one tracked repository, scoped to its owner user.
    pub async fn get_repo(
        &self,
        user_id: i64,
        repo_id: i64,
    ) -> Result<Option<TrackedRepo>, AppError> {
        let repo = sqlx::query_as::<_, TrackedRepo>(
            "SELECT * FROM tracked_repos WHERE id = ? AND user_id = ?",
        )
        .bind(repo_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(repo)
    }

    /// Start tracking a repository.
    pub async fn add_repo(
        &self,
        user_id: i64,
        owner: &str,
        name: &str,
    ) -> Result<TrackedRepo, AppError> {
        let repo = sqlx::query_as::<_, TrackedRepo>(
            "INSERT INTO tracked_repos (user_id, owner, name, created_at) \
             VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(owner)
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::BadRequest(format!("{}/{} is already tracked", owner, name))
            }
            _ => AppError::from(e),
        })?;
        Ok(repo)
    }

    /// Stop tracking a repository. Returns false if no matching row.
    pub async fn remove_repo(&self, user_id: i64, repo_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tracked_repos WHERE id = ? AND user_id = ?")
            .bind(repo_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Issue Summaries ─────────────────────────────────────────

    /// List stored issue summaries for a repository.
    pub async fn list_issues(&self, repo_id: i64) -> Result<Vec<RepoIssue>, AppError> {
        let issues = sqlx::query_as::<_, RepoIssue>(
            "SELECT * FROM repo_issues WHERE repo_id = ? ORDER BY issue_number",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(issues)
    }

    /// Insert or replace an issue summary. This is the analysis pipeline's
    /// write path; the API itself only reads.
    pub async fn upsert_issue(
        &self,
        repo_id: i64,
        issue_number: i64,
        title: &str,
        summary: Option<&str>,
        state: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO repo_issues (repo_id, issue_number, title, summary, state, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(repo_id, issue_number)
            DO UPDATE SET title = excluded.title, summary = excluded.summary,
                          state = excluded.state, updated_at = excluded.updated_at
            "#,
        )
        .bind(repo_id)
        .bind(issue_number)
        .bind(title)
        .bind(summary)
        .bind(state)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ─── Chat Messages ───────────────────────────────────────────

    /// List a user's chat history, oldest first.
    pub async fn list_chat_messages(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM (SELECT * FROM chat_messages WHERE user_id = ? \
             ORDER BY id DESC LIMIT ?) ORDER BY id ASC",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Store one chat message.
    pub async fn add_chat_message(
        &self,
        user_id: i64,
        role: &str,
        content: &str,
    ) -> Result<ChatMessage, AppError> {
        let message = sqlx::query_as::<_, ChatMessage>(
            "INSERT INTO chat_messages (user_id, role, content, created_at) \
             VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(role)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }
}
