//! Contract between the dispatch core and the forum host.
//!
//! The host owns users, preferences, permissions and the activity records
//! themselves. The core only reads through this trait and hands statuses back.
//!
//! - `MemoryHost`: in-memory implementation backed by DashMap, for embedding
//!   tests and single-process hosts

mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::notification::{Recipient, UserId};
use crate::preference::PreferenceGroup;

pub use memory::MemoryHost;

/// Errors returned by host collaborators
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type HostResult<T> = Result<T, HostError>;

#[async_trait]
pub trait Host: Send + Sync {
    /// Resolve the notified user, failing with `NotFound` if absent
    async fn lookup_user(&self, user_id: UserId) -> HostResult<Recipient>;

    /// Preference definitions shown on the notification settings screen
    fn preference_definitions(&self) -> Vec<PreferenceGroup>;

    /// Whether `user_id` enabled the preference `preference_key` (e.g. "Pushbullet.Mention")
    async fn user_opted_in(&self, user_id: UserId, preference_key: &str) -> HostResult<bool>;

    async fn has_permission(&self, user_id: UserId, permission: &str) -> HostResult<bool>;

    /// Absolute URL for a host route
    fn canonical_url(&self, route: &str) -> String;

    /// Provisioned provider access token, if any
    fn credential(&self) -> Option<String>;
}

/// Join a site base URL and a route. Routes that are already absolute are kept.
pub fn absolute_url(base_url: &str, route: &str) -> String {
    if route.starts_with("http://") || route.starts_with("https://") {
        return route.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}
