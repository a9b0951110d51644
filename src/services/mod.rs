// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod github;
pub mod notify;
pub mod session;

pub use github::{GithubClient, GithubIdentity};
pub use notify::{Notification, NotificationRegistry};
pub use session::{LoginOutcome, SessionService};
