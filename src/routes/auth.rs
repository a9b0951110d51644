// SPDX-License-Identifier: MIT

//! GitHub OAuth authentication and session routes.
//!
//! The SPA drives the flow: `/auth/github` redirects the browser to
//! GitHub, GitHub redirects back to the frontend with a code, and the
//! frontend posts the code to `/auth/github/callback`. The callback
//! response carries the access token in the body; the refresh secret and
//! the upstream token travel only as HttpOnly cookies.

use axum::{
    extract::State,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::models::User;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// HttpOnly cookie holding the raw refresh secret.
pub const REFRESH_COOKIE: &str = "reposcope_refresh";
/// HttpOnly cookie holding the upstream access token, kept only so that
/// logout/unlink can revoke it.
pub const UPSTREAM_COOKIE: &str = "reposcope_upstream";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/github", get(auth_start))
        .route("/auth/github/callback", post(auth_callback))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

/// Routes that additionally require a valid access token.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/unlink", post(unlink))
}

// ─── Login ───────────────────────────────────────────────────

/// Start OAuth flow - redirect to GitHub authorization.
async fn auth_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = sign_state(&state.config.frontend_url, &state.config.oauth_state_key)?;

    let redirect_uri = format!("{}/callback", state.config.frontend_url);
    let auth_url = format!(
        "https://github.com/login/oauth/authorize?\
         client_id={}&\
         redirect_uri={}&\
         scope=read:user%20user:email&\
         state={}",
        state.config.github_client_id,
        urlencoding::encode(&redirect_uri),
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.github_client_id,
        "Starting OAuth flow, redirecting to GitHub"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackRequest {
    code: String,
    #[serde(default)]
    state: Option<String>,
}

/// Profile fields returned to the browser after login.
#[derive(Serialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
    pub is_pro_plan: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
            is_pro_plan: user.is_pro_plan,
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

/// Exchange an authorization code for a session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<CallbackRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    // The echoed state is advisory: the code exchange itself is the
    // authoritative check, so a bad state is logged, not fatal.
    if let Some(ref echoed) = body.state {
        if verify_state(echoed, &state.config.oauth_state_key).is_none() {
            tracing::warn!("Invalid or tampered OAuth state parameter");
        }
    }

    let outcome = state.sessions.login(&body.code).await?;

    let secure = secure_cookies(&state.config.frontend_url);
    let refresh_max_age = time::Duration::seconds(
        (outcome.refresh_expires_at - chrono::Utc::now())
            .num_seconds()
            .max(0),
    );

    // The refresh cookie's lifetime matches the stored expiry, so the
    // browser cannot present a cookie the server has no hash for.
    let jar = jar
        .add(session_cookie(
            REFRESH_COOKIE,
            outcome.refresh_secret.clone(),
            refresh_max_age,
            secure,
        ))
        .add(session_cookie(
            UPSTREAM_COOKIE,
            outcome.upstream_token.clone(),
            refresh_max_age,
            secure,
        ));

    Ok((
        jar,
        Json(LoginResponse {
            access_token: outcome.access_token,
            user: UserResponse::from(&outcome.user),
        }),
    ))
}

// ─── Refresh ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Mint a new access token from the refresh cookie. The refresh secret
/// itself is not rotated here.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<RefreshResponse>> {
    let secret = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthenticated)?;

    let access_token = state.sessions.refresh(&secret).await?;

    Ok(Json(RefreshResponse { access_token }))
}

// ─── Logout / Unlink ─────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionEndResponse {
    pub success: bool,
}

/// Logout: clear cookies, clear the refresh slot, revoke the single
/// upstream token. Requires only the cookies, and succeeds even when
/// they are already gone.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionEndResponse>)> {
    let refresh_secret = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let upstream_token = jar.get(UPSTREAM_COOKIE).map(|c| c.value().to_string());

    state
        .sessions
        .logout(refresh_secret.as_deref(), upstream_token.as_deref())
        .await?;

    Ok((
        clear_session_cookies(jar, &state.config.frontend_url),
        Json(SessionEndResponse { success: true }),
    ))
}

/// Unlink: like logout, but revokes the whole upstream grant. The local
/// account and its data survive.
async fn unlink(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionEndResponse>)> {
    let refresh_secret = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let upstream_token = jar.get(UPSTREAM_COOKIE).map(|c| c.value().to_string());

    state
        .sessions
        .unlink(refresh_secret.as_deref(), upstream_token.as_deref())
        .await?;

    Ok((
        clear_session_cookies(jar, &state.config.frontend_url),
        Json(SessionEndResponse { success: true }),
    ))
}

// ─── Cookie helpers ──────────────────────────────────────────

pub(crate) fn secure_cookies(frontend_url: &str) -> bool {
    frontend_url.starts_with("https")
}

fn session_cookie(
    name: &'static str,
    value: String,
    max_age: time::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Expire both session cookies. Removal attributes must match the
/// creation attributes or browsers keep the original cookie.
pub(crate) fn clear_session_cookies(jar: CookieJar, frontend_url: &str) -> CookieJar {
    let secure = secure_cookies(frontend_url);
    jar.add(session_cookie(
        REFRESH_COOKIE,
        String::new(),
        time::Duration::ZERO,
        secure,
    ))
    .add(session_cookie(
        UPSTREAM_COOKIE,
        String::new(),
        time::Duration::ZERO,
        secure,
    ))
}

// ─── Signed OAuth state ──────────────────────────────────────

/// Sign the frontend URL and a timestamp into an opaque state parameter.
fn sign_state(frontend_url: &str, secret: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify the HMAC signature and decode the frontend URL from the OAuth
/// state parameter.
fn verify_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload = format!("{}|{}", parts[0], parts[1]);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if parts[2] != expected {
        tracing::error!("OAuth state signature mismatch");
        return None;
    }

    Some(parts[0].to_string())
}
