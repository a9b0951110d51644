// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod chat;
pub mod repo;
pub mod user;

pub use chat::ChatMessage;
pub use repo::{RepoIssue, TrackedRepo};
pub use user::User;
