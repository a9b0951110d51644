// SPDX-License-Identifier: MIT

//! Process-wide registry for server-push notifications.
//!
//! Lifecycle: an entry is added when a client connects its notification
//! stream, replaced if the same username reconnects, and removed on
//! disconnect or on the first failed send. The session core only supplies
//! the username; fan-out itself is the collaborator's concern.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One pushed event.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: String,
    pub message: String,
}

/// Registry mapping a username to its live connection.
///
/// Keyed by the same username the session manager persists, so external
/// components can address a connection via `userId -> username` resolution.
#[derive(Clone, Default)]
pub struct NotificationRegistry {
    connections: Arc<DashMap<String, mpsc::Sender<Notification>>>,
}

const CHANNEL_CAPACITY: usize = 32;

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `username`, replacing any previous one.
    /// The returned receiver ends when the entry is replaced or removed.
    pub fn register(&self, username: &str) -> mpsc::Receiver<Notification> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.connections.insert(username.to_string(), tx);
        tracing::debug!(username, "Notification stream registered");
        rx
    }

    /// Remove a connection, if present.
    pub fn unregister(&self, username: &str) {
        self.connections.remove(username);
        tracing::debug!(username, "Notification stream removed");
    }

    /// Push a notification to a connected user. Returns false if the user
    /// has no live connection. A failed send removes the stale entry.
    pub fn notify(&self, username: &str, notification: Notification) -> bool {
        let Some(sender) = self.connections.get(username).map(|s| s.value().clone()) else {
            return false;
        };

        if sender.try_send(notification).is_err() {
            self.connections.remove(username);
            tracing::debug!(username, "Dropped stale notification connection");
            return false;
        }
        true
    }

    /// Number of live connections (snapshot; may be stale immediately).
    pub fn connected(&self) -> usize {
        self.connections.len()
    }
}
