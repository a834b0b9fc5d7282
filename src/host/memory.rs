//! In-memory host using DashMap.
//!
//! Everything lives in process memory and is lost on restart.

use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::notification::{Recipient, UserId};
use crate::preference::PreferenceGroup;

use super::{absolute_url, Host, HostError, HostResult};

/// In-memory host.
///
/// Unknown preferences and permissions read as `false`.
pub struct MemoryHost {
    base_url: String,
    credential: RwLock<Option<String>>,
    users: DashMap<UserId, Recipient>,
    /// (user, preference key) -> enabled
    preferences: DashMap<(UserId, String), bool>,
    /// (user, permission) -> granted
    permissions: DashMap<(UserId, String), bool>,
    definitions: RwLock<Vec<PreferenceGroup>>,
}

impl MemoryHost {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: RwLock::new(None),
            users: DashMap::new(),
            preferences: DashMap::new(),
            permissions: DashMap::new(),
            definitions: RwLock::new(Vec::new()),
        }
    }

    pub fn set_credential(&self, credential: Option<&str>) {
        let mut guard = self
            .credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = credential.map(str::to_string);
    }

    pub fn add_user(&self, recipient: Recipient) {
        self.users.insert(recipient.user_id, recipient);
    }

    pub fn remove_user(&self, user_id: UserId) -> Option<Recipient> {
        self.users.remove(&user_id).map(|(_, recipient)| recipient)
    }

    pub fn set_preference(&self, user_id: UserId, preference_key: impl Into<String>, enabled: bool) {
        self.preferences
            .insert((user_id, preference_key.into()), enabled);
    }

    pub fn grant_permission(&self, user_id: UserId, permission: impl Into<String>) {
        self.permissions.insert((user_id, permission.into()), true);
    }

    pub fn set_preference_definitions(&self, groups: Vec<PreferenceGroup>) {
        let mut guard = self
            .definitions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = groups;
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn lookup_user(&self, user_id: UserId) -> HostResult<Recipient> {
        self.users
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HostError::NotFound(format!("user {}", user_id)))
    }

    fn preference_definitions(&self) -> Vec<PreferenceGroup> {
        self.definitions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn user_opted_in(&self, user_id: UserId, preference_key: &str) -> HostResult<bool> {
        Ok(self
            .preferences
            .get(&(user_id, preference_key.to_string()))
            .map(|entry| *entry.value())
            .unwrap_or(false))
    }

    async fn has_permission(&self, user_id: UserId, permission: &str) -> HostResult<bool> {
        Ok(self
            .permissions
            .get(&(user_id, permission.to_string()))
            .map(|entry| *entry.value())
            .unwrap_or(false))
    }

    fn canonical_url(&self, route: &str) -> String {
        absolute_url(&self.base_url, route)
    }

    fn credential(&self) -> Option<String> {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
