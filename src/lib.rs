// SPDX-License-Identifier: MIT

//! Reposcope: follow GitHub repositories and their issue summaries.
//!
//! This crate provides the backend API: GitHub OAuth login with a
//! refresh-token session lifecycle, tracked-repository CRUD, chat history,
//! billing flags, and a server-push notification registry.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Db;
use services::{NotificationRegistry, SessionService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub sessions: SessionService,
    pub notifications: NotificationRegistry,
}
