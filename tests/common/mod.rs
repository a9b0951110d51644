// SPDX-License-Identifier: MIT

use reposcope::config::Config;
use reposcope::db::Db;
use reposcope::middleware::auth::create_access_token;
use reposcope::models::User;
use reposcope::routes::create_router;
use reposcope::services::{
    session::{generate_refresh_secret, hash_refresh_secret, REFRESH_TOKEN_TTL_DAYS},
    GithubClient, NotificationRegistry, SessionService,
};
use reposcope::AppState;
use std::sync::Arc;

/// Create a test app backed by an in-memory database.
///
/// `github_base` points the upstream client at a mock server; tests that
/// never reach upstream can pass an unroutable URL.
#[allow(dead_code)]
pub async fn create_test_app_full(
    frontend_url: &str,
    github_base: &str,
) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.frontend_url = frontend_url.to_string();

    let db = Db::connect("sqlite::memory:").await.expect("test db");
    db.migrate().await.expect("migrate");

    let github = GithubClient::with_base_urls(
        config.github_client_id.clone(),
        config.github_client_secret.clone(),
        github_base.to_string(),
        github_base.to_string(),
    );

    let sessions = SessionService::new(db.clone(), github, &config);

    let state = Arc::new(AppState {
        config,
        db,
        sessions,
        notifications: NotificationRegistry::new(),
    });

    (create_router(state.clone()), state)
}

/// Test app with the default localhost frontend and no reachable upstream.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_full("http://localhost:5173", "http://127.0.0.1:1").await
}

/// Test app with a custom frontend URL (cookie attribute tests).
#[allow(dead_code)]
pub async fn create_test_app_with_frontend_url(
    frontend_url: &str,
) -> (axum::Router, Arc<AppState>) {
    create_test_app_full(frontend_url, "http://127.0.0.1:1").await
}

/// Test app whose upstream client points at a wiremock server.
#[allow(dead_code)]
pub async fn create_test_app_with_github(github_base: &str) -> (axum::Router, Arc<AppState>) {
    create_test_app_full("http://localhost:5173", github_base).await
}

/// Insert a user row directly.
#[allow(dead_code)]
pub async fn seed_user(state: &Arc<AppState>, upstream_id: i64, username: &str) -> User {
    state
        .db
        .create_user(upstream_id, username, "", "")
        .await
        .expect("seed user")
}

/// Give a seeded user an active refresh slot; returns the raw secret.
#[allow(dead_code)]
pub async fn seed_refresh_secret(state: &Arc<AppState>, user_id: i64) -> String {
    let secret = generate_refresh_secret();
    let expires = chrono::Utc::now() + chrono::Duration::days(REFRESH_TOKEN_TTL_DAYS);
    state
        .db
        .set_refresh_slot(user_id, &hash_refresh_secret(&secret), expires)
        .await
        .expect("seed refresh slot");
    secret
}

/// Bearer token for a seeded user.
#[allow(dead_code)]
pub fn bearer_for(state: &Arc<AppState>, user: &User) -> String {
    let token = create_access_token(user, &state.config.jwt_signing_key).expect("token");
    format!("Bearer {}", token)
}

/// Collect all Set-Cookie header values from a response.
#[allow(dead_code)]
pub fn set_cookie_headers(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Find the Set-Cookie header for a named cookie.
#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// Extract just the `name=value` pair from a Set-Cookie header, for
/// replaying in a Cookie request header.
#[allow(dead_code)]
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

/// Read a JSON response body.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
