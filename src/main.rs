// SPDX-License-Identifier: MIT

//! Reposcope API Server
//!
//! GitHub OAuth login, session lifecycle, and tracked-repository API.

use reposcope::{
    config::Config,
    db::Db,
    services::{GithubClient, NotificationRegistry, SessionService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Reposcope API");

    // Connect to the database and apply the schema
    let db = Db::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db.migrate().await.expect("Failed to apply database schema");
    tracing::info!(url = %config.database_url, "Database ready");

    // GitHub OAuth client
    let github = GithubClient::new(
        config.github_client_id.clone(),
        config.github_client_secret.clone(),
    );

    // Session manager
    let sessions = SessionService::new(db.clone(), github, &config);

    // Process-wide registry for server-push notifications
    let notifications = NotificationRegistry::new();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        sessions,
        notifications,
    });

    // Build router
    let app = reposcope::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reposcope=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
