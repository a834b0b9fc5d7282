//! Outbound delivery to the push provider.

mod client;

use async_trait::async_trait;

use crate::notification::{DeliveryStatus, DispatchRequest};

pub use client::{classify_status, LinkPush, ProviderResponse, PushbulletClient, ACCESS_TOKEN_HEADER};

/// One delivery attempt, classified.
///
/// Implementations must not retry internally and must never fail: every
/// outcome is expressed as a [`DeliveryStatus`] other than `Pending`.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, request: &DispatchRequest) -> DeliveryStatus;
}
