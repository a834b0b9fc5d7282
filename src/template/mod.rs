//! Message formatting for push notifications.
//!
//! This module provides:
//! - Headline rendering from an event's `{Field}` template (see [`substitution`])
//! - Reduction of the rendered headline to plain text
//! - Resolution of the event route to the host's canonical absolute URL
//!
//! Rendering never touches the event itself; it produces a derived view.

pub mod substitution;

use serde::Serialize;

use crate::error::DispatchError;
use crate::host::Host;
use crate::notification::Event;

pub use substitution::{format_string, plain_text};

/// Key under which the decoded payload is visible to placeholders
const PAYLOAD_FIELD: &str = "Data";

/// Rendered view of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    /// Plain-text headline
    pub headline: String,
    /// Canonical absolute URL of the event route
    pub url: String,
}

/// Render the headline and URL of `event`.
///
/// Fails with [`DispatchError::Format`] if the stored payload cannot be decoded.
pub fn render(event: &Event, host: &dyn Host) -> Result<RenderedMessage, DispatchError> {
    let payload = event.payload.decode()?;

    let mut context = event.fields.clone();
    context
        .entry(PAYLOAD_FIELD.to_string())
        .or_insert(payload);
    let context = serde_json::Value::Object(context);

    let headline = plain_text(&format_string(&event.headline_format, &context, host));
    let url = host.canonical_url(&event.route);

    Ok(RenderedMessage { headline, url })
}
