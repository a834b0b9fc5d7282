//! HTTP client for the push provider.
//!
//! Builds the link push, performs one POST with bounded timeouts and folds the
//! outcome into a [`DeliveryStatus`]. Nothing is retried here; a
//! `RetryableError` is picked up again on the host's next save.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::config::{ProviderConfig, TransportFailurePolicy};
use crate::error::{DispatchError, TransportFailure};
use crate::metrics::DeliveryMetrics;
use crate::notification::{DeliveryStatus, DispatchRequest};

use super::PushSender;

/// Header carrying the provider credential
pub const ACCESS_TOKEN_HEADER: &str = "Access-Token";

/// Longest provider body kept for logs
const MAX_LOGGED_BODY: usize = 1024;

/// Wire payload of a link push. Field order is part of the wire format.
#[derive(Debug, Serialize)]
pub struct LinkPush<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub body: &'a str,
    pub url: &'a str,
    pub email: &'a str,
}

impl<'a> LinkPush<'a> {
    pub fn from_request(request: &'a DispatchRequest) -> Self {
        Self {
            kind: "link",
            body: &request.headline,
            url: &request.url,
            email: &request.email,
        }
    }
}

/// Accepted provider response
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status_code: u16,
    pub duration: Duration,
}

/// Classification of a raw provider status code
pub fn classify_status(status_code: u16) -> DeliveryStatus {
    match status_code {
        200 => DeliveryStatus::Sent,
        500..=u16::MAX => DeliveryStatus::RetryableError,
        _ => DeliveryStatus::Fatal,
    }
}

/// Client for the Pushbullet push endpoint
#[derive(Debug, Clone)]
pub struct PushbulletClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    policy: TransportFailurePolicy,
}

impl PushbulletClient {
    /// Build a client from provider settings.
    ///
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be constructed (e.g. no TLS backend).
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout: config.timeout(),
            policy: config.transport_failure,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn transport_failure_policy(&self) -> TransportFailurePolicy {
        self.policy
    }

    /// POST one link push.
    ///
    /// Only a `200` is `Ok`; every other outcome is a categorized error:
    /// - `Transport` for connect failures, timeouts and unreadable responses
    /// - `ProviderUnavailable` for 5xx responses
    /// - `ProviderRejected` for everything else
    pub async fn push(&self, request: &DispatchRequest) -> Result<ProviderResponse, DispatchError> {
        let body = serde_json::to_vec(&LinkPush::from_request(request))
            .map_err(|e| DispatchError::Format(format!("failed to encode push: {}", e)))?;

        let span = info_span!(
            "push_delivery",
            event_id = request.event_id,
            delivery_id = %request.delivery_id,
            endpoint = %self.endpoint
        );

        async move {
            let start = Instant::now();
            tracing::debug!("Sending push");

            let response = self
                .client
                .post(&self.endpoint)
                .header(ACCESS_TOKEN_HEADER, request.credential.expose())
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| self.transport_error(e, start.elapsed()))?;

            let duration = start.elapsed();
            DeliveryMetrics::observe_latency(duration);

            let status_code = response.status().as_u16();
            tracing::debug!(
                status_code,
                duration_ms = duration.as_millis() as u64,
                "Received provider response"
            );

            if status_code == 200 {
                return Ok(ProviderResponse {
                    status_code,
                    duration,
                });
            }

            let body = read_body(response).await;
            if status_code >= 500 {
                Err(DispatchError::ProviderUnavailable { status_code, body })
            } else {
                Err(DispatchError::ProviderRejected { status_code, body })
            }
        }
        .instrument(span)
        .await
    }

    fn transport_error(&self, error: reqwest::Error, elapsed: Duration) -> DispatchError {
        tracing::warn!(
            duration_ms = elapsed.as_millis() as u64,
            error = %error,
            "Push request failed"
        );

        if error.is_timeout() {
            DispatchError::transport(
                TransportFailure::Timeout,
                format!("no response within {}s", self.timeout.as_secs()),
            )
        } else if error.is_connect() {
            DispatchError::transport(TransportFailure::Connect, format!("connection failed: {}", error))
        } else {
            DispatchError::transport(TransportFailure::Other, error.to_string())
        }
    }
}

#[async_trait]
impl PushSender for PushbulletClient {
    async fn send(&self, request: &DispatchRequest) -> DeliveryStatus {
        match self.push(request).await {
            Ok(response) => {
                tracing::info!(
                    event_id = request.event_id,
                    status_code = response.status_code,
                    "Push delivered"
                );
                classify_status(response.status_code)
            }
            Err(error) => {
                let status = error
                    .delivery_status(self.policy)
                    .unwrap_or(DeliveryStatus::Fatal);
                match &error {
                    DispatchError::ProviderRejected { status_code, body }
                    | DispatchError::ProviderUnavailable { status_code, body } => {
                        tracing::warn!(
                            event_id = request.event_id,
                            status_code,
                            body = %body,
                            status = %status,
                            "Provider refused push"
                        );
                    }
                    _ => {
                        tracing::warn!(
                            event_id = request.event_id,
                            error = %error,
                            status = %status,
                            "Push not delivered"
                        );
                    }
                }
                status
            }
        }
    }
}

async fn read_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_LOGGED_BODY => {
            let truncated = String::from_utf8_lossy(&bytes[..MAX_LOGGED_BODY]);
            format!("{}... (truncated)", truncated)
        }
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("[Failed to read response body: {}]", e),
    }
}
