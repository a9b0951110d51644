// SPDX-License-Identifier: MIT

//! API routes for authenticated users.
//!
//! Everything here is plain request/response or store/retrieve against
//! single rows; the auth middleware applied in routes/mod.rs is the only
//! gate.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ChatMessage, RepoIssue, TrackedRepo};
use crate::routes::auth::clear_session_cookies;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/repos", get(list_repos).post(track_repo))
        .route("/api/repos/{repo_id}", delete(untrack_repo))
        .route("/api/repos/{repo_id}/issues", get(list_issues))
        .route("/api/chat", get(chat_history).post(post_chat_message))
        .route("/api/billing", put(update_billing))
        .route("/api/notifications", get(notifications_stream))
        .route("/api/account", delete(delete_account))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
    pub is_pro_plan: bool,
    pub pro_plan_expires_at: Option<DateTime<Utc>>,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = state
        .db
        .find_user_by_upstream_id(user.upstream_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(MeResponse {
        user_id: profile.user_id,
        username: profile.username,
        email: profile.email,
        avatar_url: profile.avatar_url,
        is_pro_plan: profile.is_pro_plan,
        pro_plan_expires_at: profile.pro_plan_expires_at,
    }))
}

// ─── Tracked Repositories ────────────────────────────────────

#[derive(Deserialize)]
pub struct TrackRepoRequest {
    pub owner: String,
    pub name: String,
}

async fn list_repos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<TrackedRepo>>> {
    Ok(Json(state.db.list_repos(user.user_id).await?))
}

async fn track_repo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<TrackRepoRequest>,
) -> Result<Json<TrackedRepo>> {
    validate_repo_segment(&body.owner, "owner")?;
    validate_repo_segment(&body.name, "name")?;

    let repo = state
        .db
        .add_repo(user.user_id, &body.owner, &body.name)
        .await?;

    tracing::info!(
        user_id = user.user_id,
        repo = format!("{}/{}", repo.owner, repo.name),
        "Repository tracked"
    );

    Ok(Json(repo))
}

async fn untrack_repo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(repo_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    let removed = state.db.remove_repo(user.user_id, repo_id).await?;
    if !removed {
        return Err(AppError::NotFound(format!("Repository {}", repo_id)));
    }
    Ok(Json(SuccessResponse { success: true }))
}

fn validate_repo_segment(value: &str, field: &str) -> Result<()> {
    if value.is_empty() || value.len() > 100 {
        return Err(AppError::BadRequest(format!(
            "{} must be 1-100 characters",
            field
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(AppError::BadRequest(format!(
            "{} contains invalid characters",
            field
        )));
    }
    Ok(())
}

// ─── Issue Summaries ─────────────────────────────────────────

/// List stored issue summaries for one tracked repository. The summaries
/// themselves are written by the external analysis pipeline.
async fn list_issues(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(repo_id): Path<i64>,
) -> Result<Json<Vec<RepoIssue>>> {
    // Ownership check first; issue listing itself is unscoped.
    state
        .db
        .get_repo(user.user_id, repo_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Repository {}", repo_id)))?;

    Ok(Json(state.db.list_issues(repo_id).await?))
}

// ─── Chat History ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatHistoryParams {
    #[serde(default = "default_chat_limit")]
    limit: u32,
}

fn default_chat_limit() -> u32 {
    50
}

#[derive(Deserialize)]
pub struct ChatMessageRequest {
    pub content: String,
}

async fn chat_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ChatHistoryParams>,
) -> Result<Json<Vec<ChatMessage>>> {
    let limit = params.limit.min(200);
    Ok(Json(state.db.list_chat_messages(user.user_id, limit).await?))
}

async fn post_chat_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ChatMessageRequest>,
) -> Result<Json<ChatMessage>> {
    if body.content.trim().is_empty() {
        return Err(AppError::BadRequest("content must not be empty".to_string()));
    }

    let message = state
        .db
        .add_chat_message(user.user_id, "user", &body.content)
        .await?;
    Ok(Json(message))
}

// ─── Billing ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct BillingUpdateRequest {
    pub is_pro_plan: bool,
    pub pro_plan_expires_at: Option<DateTime<Utc>>,
}

/// Entry point for the billing collaborator. The session core only ever
/// reads these flags back into issued claims.
async fn update_billing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<BillingUpdateRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .db
        .set_billing_plan(user.user_id, body.is_pro_plan, body.pro_plan_expires_at)
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ─── Notifications ───────────────────────────────────────────

/// Server-push notification stream (SSE).
///
/// Registers this connection under the caller's username; the entry is
/// dropped when the stream closes or a send fails.
async fn notifications_stream(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Sse<impl tokio_stream::Stream<Item = std::result::Result<Event, Infallible>>> {
    let receiver = state.notifications.register(&user.username);

    let stream = ReceiverStream::new(receiver)
        .map(|n| Ok(Event::default().event(n.kind).data(n.message)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ─── Account Deletion ────────────────────────────────────────

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}

/// Delete the caller's account and all associated data.
///
/// Requires a verified access token; identity comes from the token, not
/// from cookies. The refresh slot is cleared before the row is deleted.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<DeleteAccountResponse>)> {
    tracing::info!(user_id = user.user_id, "User-initiated account deletion");

    state
        .sessions
        .delete_account(user.user_id, user.upstream_id)
        .await?;

    // Drop any live connection registered under this username
    state.notifications.unregister(&user.username);

    Ok((
        clear_session_cookies(jar, &state.config.frontend_url),
        Json(DeleteAccountResponse {
            success: true,
            message: "Account deleted".to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_repo_segment_accepts_typical_names() {
        assert!(validate_repo_segment("rust-lang", "owner").is_ok());
        assert!(validate_repo_segment("rust.vim", "name").is_ok());
        assert!(validate_repo_segment("serde_json", "name").is_ok());
    }

    #[test]
    fn test_validate_repo_segment_rejects_bad_input() {
        assert!(validate_repo_segment("", "owner").is_err());
        assert!(validate_repo_segment("a/b", "name").is_err());
        assert!(validate_repo_segment(&"x".repeat(101), "name").is_err());
    }
}
