//! Per-user opt-in for the push channel.
//!
//! The host defines notification preferences per native channel
//! (`Email.CommentReply`, `Popup.CommentReply`, ...). The push channel mirrors
//! every one of them as `<channel>.<suffix>` so users can toggle push delivery
//! per activity type without the host knowing about this channel.

use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::gate;
use crate::host::{Host, HostResult};
use crate::notification::UserId;

/// One toggle on the notification settings screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceDefinition {
    /// Dotted key, e.g. "Email.CommentReply"
    pub name: String,
    pub description: String,
}

/// A titled section of preference toggles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceGroup {
    pub name: String,
    pub preferences: Vec<PreferenceDefinition>,
}

impl PreferenceGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preferences: Vec::new(),
        }
    }

    /// Append a preference
    pub fn with(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.preferences.push(PreferenceDefinition {
            name: name.into(),
            description: description.into(),
        });
        self
    }

    /// Description of the preference called `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.preferences
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.description.as_str())
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Group flat `(group, name, description)` entries, keeping first-seen order
pub fn group_definitions<I, G, N, D>(entries: I) -> Vec<PreferenceGroup>
where
    I: IntoIterator<Item = (G, N, D)>,
    G: Into<String>,
    N: Into<String>,
    D: Into<String>,
{
    let mut groups: Vec<PreferenceGroup> = Vec::new();
    for (group, name, description) in entries {
        let group = group.into();
        let definition = PreferenceDefinition {
            name: name.into(),
            description: description.into(),
        };
        match groups.iter_mut().find(|g| g.name == group) {
            Some(existing) => existing.preferences.push(definition),
            None => groups.push(PreferenceGroup {
                name: group,
                preferences: vec![definition],
            }),
        }
    }
    groups
}

/// Preference key of `event_type` on `channel`
pub fn preference_key(channel: &str, event_type: &str) -> String {
    format!("{}.{}", channel, event_type)
}

/// Add a `<channel>.<suffix>` sibling for every `<prefix>.<suffix>` preference.
///
/// Siblings copy the description and are appended to the same group. Names
/// without a dot are ignored, and running the extension twice adds nothing.
pub fn extend_definitions(groups: &mut [PreferenceGroup], channel: &str) {
    for group in groups.iter_mut() {
        let mut siblings: Vec<PreferenceDefinition> = Vec::new();

        for preference in &group.preferences {
            let Some((prefix, suffix)) = preference.name.split_once('.') else {
                continue;
            };
            if prefix == channel || suffix.is_empty() {
                continue;
            }

            let name = preference_key(channel, suffix);
            if group.contains(&name) || siblings.iter().any(|s| s.name == name) {
                continue;
            }
            siblings.push(PreferenceDefinition {
                name,
                description: preference.description.clone(),
            });
        }

        group.preferences.extend(siblings);
    }
}

/// Opt-in checks and settings-screen extension for one channel
#[derive(Debug, Clone)]
pub struct PreferenceFilter {
    channel: String,
    permission: String,
}

impl PreferenceFilter {
    pub fn new(channel: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            permission: permission.into(),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.channel.clone(), config.permission.clone())
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn key_for(&self, event_type: &str) -> String {
        preference_key(&self.channel, event_type)
    }

    /// Whether `user_id` wants pushes for `event_type`
    pub async fn is_opted_in(
        &self,
        host: &dyn Host,
        user_id: UserId,
        event_type: &str,
    ) -> HostResult<bool> {
        host.user_opted_in(user_id, &self.key_for(event_type)).await
    }

    /// Preference definitions as `viewer` should see them.
    ///
    /// The channel's column is only added while delivery is configured and the
    /// viewer holds the channel permission.
    pub async fn definitions_for(&self, host: &dyn Host, viewer: UserId) -> Vec<PreferenceGroup> {
        let mut groups = host.preference_definitions();

        if !gate::is_configured(host) {
            return groups;
        }

        match host.has_permission(viewer, &self.permission).await {
            Ok(true) => extend_definitions(&mut groups, &self.channel),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    user_id = viewer,
                    permission = %self.permission,
                    error = %e,
                    "Permission check failed, hiding push preferences"
                );
            }
        }

        groups
    }
}
