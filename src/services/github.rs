// SPDX-License-Identifier: MIT

//! GitHub OAuth/API client.
//!
//! Handles:
//! - Authorization-code exchange
//! - Identity fetch with the email fallback policy
//! - Token and grant revocation (distinct upstream operations)

use crate::error::AppError;
use serde::Deserialize;

/// GitHub OAuth client.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    /// Base for the OAuth endpoints (normally `https://github.com`)
    oauth_base: String,
    /// Base for the REST API (normally `https://api.github.com`)
    api_base: String,
    client_id: String,
    client_secret: String,
}

/// The identity fields this application keeps from an upstream profile.
#[derive(Debug, Clone)]
pub struct GithubIdentity {
    pub upstream_id: i64,
    pub username: String,
    /// Empty string when GitHub exposes no usable address
    pub email: String,
    pub avatar_url: String,
}

impl GithubClient {
    /// Create a new client with OAuth application credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self::with_base_urls(
            client_id,
            client_secret,
            "https://github.com".to_string(),
            "https://api.github.com".to_string(),
        )
    }

    /// Create a client pointing at alternate endpoints (for tests).
    pub fn with_base_urls(
        client_id: String,
        client_secret: String,
        oauth_base: String,
        api_base: String,
    ) -> Self {
        Self {
            // GitHub rejects requests without a User-Agent
            http: reqwest::Client::builder()
                .user_agent("reposcope")
                .build()
                .unwrap_or_default(),
            oauth_base,
            api_base,
            client_id,
            client_secret,
        }
    }

    /// Exchange a single-use authorization code for an upstream access token.
    ///
    /// A rejected code (expired, already used, wrong credentials) is an
    /// `UpstreamAuth` error; retrying is never safe.
    pub async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let url = format!("{}/login/oauth/access_token", self.oauth_base);

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamAuth(format!("Code exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamAuth(format!("HTTP {}: {}", status, body)));
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamAuth(format!("JSON parse error: {}", e)))?;

        // GitHub reports exchange failures with 200 and an error body
        match token.access_token {
            Some(access_token) => Ok(access_token),
            None => Err(AppError::UpstreamAuth(
                token.error.unwrap_or_else(|| "no access token in response".to_string()),
            )),
        }
    }

    /// Fetch the authenticated user's profile, resolving the email address.
    ///
    /// When the profile carries no email, the account's email list is
    /// fetched separately and the first primary-and-verified entry wins,
    /// falling back to the first listed address, falling back to `""`.
    pub async fn fetch_identity(&self, access_token: &str) -> Result<GithubIdentity, AppError> {
        let profile: GithubProfile = self
            .get_json(&format!("{}/user", self.api_base), access_token)
            .await?;

        let email = match profile.email {
            Some(ref email) if !email.is_empty() => email.clone(),
            _ => {
                // The email-list call is best-effort: an account may hide
                // all addresses, and downstream code tolerates "".
                match self.fetch_emails(access_token).await {
                    Ok(emails) => select_email(&emails),
                    Err(e) => {
                        tracing::warn!(error = %e, "Email list fetch failed, proceeding without email");
                        String::new()
                    }
                }
            }
        };

        Ok(GithubIdentity {
            upstream_id: profile.id,
            username: profile.login,
            email,
            avatar_url: profile.avatar_url.unwrap_or_default(),
        })
    }

    /// Revoke a single upstream access token (used by logout).
    pub async fn revoke_token(&self, access_token: &str) -> Result<(), AppError> {
        self.revoke(
            &format!("{}/applications/{}/token", self.api_base, self.client_id),
            access_token,
        )
        .await
    }

    /// Revoke the whole OAuth grant (used by unlink). This invalidates
    /// every token ever issued under the authorization.
    pub async fn revoke_grant(&self, access_token: &str) -> Result<(), AppError> {
        self.revoke(
            &format!("{}/applications/{}/grant", self.api_base, self.client_id),
            access_token,
        )
        .await
    }

    async fn revoke(&self, url: &str, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(&serde_json::json!({ "access_token": access_token }))
            .send()
            .await
            .map_err(|e| AppError::UpstreamRevocation(format!("Revoke request failed: {}", e)))?;

        // 404 means the token/grant is already gone, which is the outcome
        // the caller wanted.
        if response.status().is_success() || response.status().as_u16() == 404 {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::UpstreamRevocation(format!(
            "HTTP {}: {}",
            status, body
        )))
    }

    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<GithubEmail>, AppError> {
        self.get_json(&format!("{}/user/emails", self.api_base), access_token)
            .await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::UpstreamAuth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamAuth(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::UpstreamAuth(format!("JSON parse error: {}", e)))
    }
}

/// Email selection policy: first primary-and-verified, else first listed,
/// else empty string.
fn select_email(emails: &[GithubEmail]) -> String {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.first())
        .map(|e| e.email.clone())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubProfile {
    id: i64,
    login: String,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}
