// SPDX-License-Identifier: MIT

//! Chat history storage.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One chatbot exchange line, stored per user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: i64,
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
