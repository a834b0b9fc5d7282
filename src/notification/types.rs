use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::gate::Credential;

use super::DeliveryStatus;

/// Host identifier of a user
pub type UserId = u64;

/// Host identifier of an activity record
pub type EventId = u64;

/// Activity record produced by the host that may be pushed to the notified user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Host record ID
    pub id: EventId,
    /// User who gets notified
    pub notify_user_id: UserId,
    /// Activity type tag (e.g., "CommentReply"); also the preference suffix
    pub event_type: String,
    /// Headline with `{Field}` placeholders
    pub headline_format: String,
    /// Values the headline placeholders resolve against
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// Structured payload, possibly still in its stored form
    #[serde(default)]
    pub payload: EventPayload,
    /// Host route the push links to (e.g., "/discussion/5")
    pub route: String,
    /// Delivery status for this channel; `None` if never queued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    /// When the activity happened
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    /// Start building an event
    pub fn builder(id: EventId, notify_user_id: UserId, event_type: impl Into<String>) -> EventBuilder {
        EventBuilder::new(id, notify_user_id, event_type)
    }

    /// Move to `next` if the delivery state machine allows it.
    ///
    /// Returns `false` and leaves the status untouched otherwise.
    pub fn apply_status(&mut self, next: DeliveryStatus) -> bool {
        if !DeliveryStatus::can_transition(self.delivery_status, next) {
            tracing::warn!(
                event_id = self.id,
                from = ?self.delivery_status,
                to = %next,
                "Rejected invalid delivery status transition"
            );
            return false;
        }
        self.delivery_status = Some(next);
        true
    }
}

/// Payload attached to an event.
///
/// Hosts frequently keep the payload in its serialized column form; it is only
/// decoded when a headline is rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EventPayload {
    /// No payload
    #[default]
    Empty,
    /// Already decoded
    Structured(serde_json::Value),
    /// Raw stored blob (JSON text)
    Serialized(String),
}

impl EventPayload {
    /// Decoded view of the payload. A blob that does not parse is a format error.
    pub fn decode(&self) -> Result<serde_json::Value, DispatchError> {
        match self {
            EventPayload::Empty => Ok(serde_json::Value::Null),
            EventPayload::Structured(value) => Ok(value.clone()),
            EventPayload::Serialized(raw) if raw.trim().is_empty() => Ok(serde_json::Value::Null),
            EventPayload::Serialized(raw) => serde_json::from_str(raw)
                .map_err(|e| DispatchError::Format(format!("undecodable event payload: {}", e))),
        }
    }
}

/// Builder for creating events
#[derive(Debug, Clone)]
pub struct EventBuilder {
    id: EventId,
    notify_user_id: UserId,
    event_type: String,
    headline_format: String,
    fields: serde_json::Map<String, serde_json::Value>,
    payload: EventPayload,
    route: String,
    delivery_status: Option<DeliveryStatus>,
    occurred_at: Option<DateTime<Utc>>,
}

impl EventBuilder {
    pub fn new(id: EventId, notify_user_id: UserId, event_type: impl Into<String>) -> Self {
        Self {
            id,
            notify_user_id,
            event_type: event_type.into(),
            headline_format: String::new(),
            fields: serde_json::Map::new(),
            payload: EventPayload::Empty,
            route: "/".to_string(),
            delivery_status: None,
            occurred_at: None,
        }
    }

    /// Set the headline template
    pub fn headline(mut self, format: impl Into<String>) -> Self {
        self.headline_format = format.into();
        self
    }

    /// Add a headline field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set the payload
    pub fn payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Set the target route
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Start from a previously persisted status
    pub fn status(mut self, status: DeliveryStatus) -> Self {
        self.delivery_status = Some(status);
        self
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    pub fn build(self) -> Event {
        Event {
            id: self.id,
            notify_user_id: self.notify_user_id,
            event_type: self.event_type,
            headline_format: self.headline_format,
            fields: self.fields,
            payload: self.payload,
            route: self.route,
            delivery_status: self.delivery_status,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Notified user as resolved by the host at dispatch time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: UserId,
    pub name: String,
    /// Address the provider uses to find the user's devices
    pub email: Option<String>,
}

impl Recipient {
    pub fn new(user_id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            email: Some(email.into()),
        }
    }

    /// Non-blank email, if any
    pub fn contact_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

/// Everything one delivery attempt needs. Lives for a single attempt only.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Correlates log lines of one attempt
    pub delivery_id: Uuid,
    pub event_id: EventId,
    pub headline: String,
    /// Canonical absolute URL of the event's route
    pub url: String,
    pub email: String,
    pub credential: Credential,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let event = Event::builder(7, 42, "CommentReply").build();
        assert_eq!(event.id, 7);
        assert_eq!(event.notify_user_id, 42);
        assert_eq!(event.route, "/");
        assert_eq!(event.payload, EventPayload::Empty);
        assert!(event.delivery_status.is_none());
    }

    #[test]
    fn test_apply_status_follows_state_machine() {
        let mut event = Event::builder(1, 1, "Mention").build();

        assert!(!event.apply_status(DeliveryStatus::Sent));
        assert!(event.delivery_status.is_none());

        assert!(event.apply_status(DeliveryStatus::Pending));
        assert!(event.apply_status(DeliveryStatus::RetryableError));
        assert!(event.apply_status(DeliveryStatus::Sent));
        assert!(!event.apply_status(DeliveryStatus::RetryableError));
        assert_eq!(event.delivery_status, Some(DeliveryStatus::Sent));
    }

    #[test]
    fn test_payload_decode() {
        let structured = EventPayload::Structured(json!({"Name": "Bug"}));
        assert_eq!(structured.decode().unwrap()["Name"], "Bug");

        let serialized = EventPayload::Serialized(r#"{"Name":"Bug"}"#.to_string());
        assert_eq!(serialized.decode().unwrap()["Name"], "Bug");

        assert!(EventPayload::Serialized("   ".to_string()).decode().unwrap().is_null());
        assert!(EventPayload::Empty.decode().unwrap().is_null());
    }

    #[test]
    fn test_payload_decode_failure_is_format_error() {
        let broken = EventPayload::Serialized("a:1:{s:4:\"Name\"".to_string());
        assert!(matches!(broken.decode(), Err(DispatchError::Format(_))));
    }

    #[test]
    fn test_recipient_contact_email() {
        let recipient = Recipient::new(1, "ann", "a@x.com");
        assert_eq!(recipient.contact_email(), Some("a@x.com"));

        let blank = Recipient {
            user_id: 2,
            name: "bob".to_string(),
            email: Some("  ".to_string()),
        };
        assert_eq!(blank.contact_email(), None);
    }
}
