use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{DispatchConfig, Settings, TransportFailurePolicy};
use crate::delivery::{PushSender, PushbulletClient};
use crate::error::DispatchError;
use crate::gate::{self, Credential};
use crate::host::{Host, HostError};
use crate::metrics::DispatchMetrics;
use crate::preference::{PreferenceFilter, PreferenceGroup};
use crate::template;

use super::{DeliveryStatus, DispatchBatch, DispatchRequest, Event, UserId};

/// What happened to an event when it was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDecision {
    /// Marked `Pending` and staged in the batch
    Queued,
    /// Recipient has the channel preference switched off
    OptedOut,
    /// No provider credential; nothing written
    NotConfigured,
    /// Already staged or already carrying a status
    AlreadyQueued,
    /// Host could not answer the preference lookup; treated as opted out
    PreferenceUnavailable,
}

impl QueueDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueDecision::Queued => "queued",
            QueueDecision::OptedOut => "opted_out",
            QueueDecision::NotConfigured => "not_configured",
            QueueDecision::AlreadyQueued => "already_queued",
            QueueDecision::PreferenceUnavailable => "preference_unavailable",
        }
    }

    pub fn is_queued(self) -> bool {
        self == QueueDecision::Queued
    }
}

/// Why a pipeline pass did not attempt delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotConfigured,
    /// Status is absent, `Sent` or `Fatal`
    NotDispatchable,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NotConfigured => "not_configured",
            SkipReason::NotDispatchable => "not_dispatchable",
        }
    }
}

/// Result of one pipeline pass over an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Status left untouched
    Skipped(SkipReason),
    /// Status now holds this value
    Attempted(DeliveryStatus),
}

impl DispatchOutcome {
    /// Status written by this pass, if any
    pub fn status(self) -> Option<DeliveryStatus> {
        match self {
            DispatchOutcome::Attempted(status) => Some(status),
            DispatchOutcome::Skipped(_) => None,
        }
    }
}

/// Statistics for the push dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub queued: AtomicU64,
    pub opted_out: AtomicU64,
    pub already_queued: AtomicU64,
    pub not_configured: AtomicU64,
    pub preference_unavailable: AtomicU64,
    pub sent: AtomicU64,
    pub retryable_errors: AtomicU64,
    pub fatal_errors: AtomicU64,
    pub skipped: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            opted_out: self.opted_out.load(Ordering::Relaxed),
            already_queued: self.already_queued.load(Ordering::Relaxed),
            not_configured: self.not_configured.load(Ordering::Relaxed),
            preference_unavailable: self.preference_unavailable.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            retryable_errors: self.retryable_errors.load(Ordering::Relaxed),
            fatal_errors: self.fatal_errors.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn record_decision(&self, decision: QueueDecision) {
        let counter = match decision {
            QueueDecision::Queued => &self.queued,
            QueueDecision::OptedOut => &self.opted_out,
            QueueDecision::AlreadyQueued => &self.already_queued,
            QueueDecision::NotConfigured => &self.not_configured,
            QueueDecision::PreferenceUnavailable => &self.preference_unavailable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_outcome(&self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Attempted(DeliveryStatus::Sent) => &self.sent,
            DispatchOutcome::Attempted(DeliveryStatus::RetryableError) => &self.retryable_errors,
            DispatchOutcome::Attempted(DeliveryStatus::Fatal) => &self.fatal_errors,
            DispatchOutcome::Attempted(DeliveryStatus::Pending) | DispatchOutcome::Skipped(_) => {
                &self.skipped
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub queued: u64,
    pub opted_out: u64,
    pub already_queued: u64,
    pub not_configured: u64,
    pub preference_unavailable: u64,
    pub sent: u64,
    pub retryable_errors: u64,
    pub fatal_errors: u64,
    pub skipped: u64,
}

/// Decides which activities get pushed and delivers them.
///
/// The host calls [`on_event_created`](Self::on_event_created) when it builds an
/// activity and [`on_event_persisting`](Self::on_event_persisting) (or
/// [`dispatch_batch`](Self::dispatch_batch)) right before it saves it. Neither
/// call ever fails; every problem ends up in the event's status.
pub struct Dispatcher {
    host: Arc<dyn Host>,
    sender: Arc<dyn PushSender>,
    preferences: PreferenceFilter,
    max_concurrent_deliveries: usize,
    stats: DispatcherStats,
}

impl Dispatcher {
    pub fn new(host: Arc<dyn Host>, sender: Arc<dyn PushSender>, config: &DispatchConfig) -> Self {
        Self {
            host,
            sender,
            preferences: PreferenceFilter::from_config(config),
            max_concurrent_deliveries: config.max_concurrent_deliveries.max(1),
            stats: DispatcherStats::default(),
        }
    }

    /// Create a dispatcher delivering through [`PushbulletClient`].
    ///
    /// The transport failure policy is applied by the client.
    pub fn from_settings(host: Arc<dyn Host>, settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = PushbulletClient::new(&settings.provider)?;
        Ok(Self::new(host, Arc::new(client), &settings.dispatch))
    }

    pub fn is_configured(&self) -> bool {
        gate::is_configured(self.host.as_ref())
    }

    pub fn channel(&self) -> &str {
        self.preferences.channel()
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Preference definitions for `viewer`, including this channel's column when allowed
    pub async fn preference_definitions(&self, viewer: UserId) -> Vec<PreferenceGroup> {
        self.preferences.definitions_for(self.host.as_ref(), viewer).await
    }

    /// Decide whether a freshly created event is queued for push delivery.
    ///
    /// A queued event is marked `Pending` and a copy is staged in `batch`. Any
    /// other decision leaves both the event and the batch untouched.
    #[tracing::instrument(
        name = "dispatcher.on_event_created",
        skip(self, batch, event),
        fields(event_id = event.id, user_id = event.notify_user_id, event_type = %event.event_type)
    )]
    pub async fn on_event_created(&self, batch: &mut DispatchBatch, event: &mut Event) -> QueueDecision {
        let decision = self.decide(batch, event).await;

        if decision.is_queued() && event.apply_status(DeliveryStatus::Pending) {
            batch.stage(event.clone());
        }

        self.stats.record_decision(decision);
        DispatchMetrics::record_queue_decision(decision.as_str());
        tracing::debug!(decision = decision.as_str(), "Queue decision");

        decision
    }

    async fn decide(&self, batch: &DispatchBatch, event: &Event) -> QueueDecision {
        if !self.is_configured() {
            return QueueDecision::NotConfigured;
        }

        if batch.contains(event.id) || event.delivery_status.is_some() {
            return QueueDecision::AlreadyQueued;
        }

        match self
            .preferences
            .is_opted_in(self.host.as_ref(), event.notify_user_id, &event.event_type)
            .await
        {
            Ok(true) => QueueDecision::Queued,
            Ok(false) => QueueDecision::OptedOut,
            Err(e) => {
                tracing::warn!(error = %e, "Preference lookup failed, not queuing push");
                QueueDecision::PreferenceUnavailable
            }
        }
    }

    /// Run one delivery pass over `event`, updating its status in place.
    ///
    /// 1. Not configured: stop, status untouched.
    /// 2. Status neither `Pending` nor `RetryableError`: stop, status untouched.
    /// 3. Render headline and URL; failure sets `Fatal`.
    /// 4. Resolve the recipient; failure sets `Fatal`.
    /// 5. Deliver and store the classified result.
    #[tracing::instrument(
        name = "dispatcher.on_event_persisting",
        skip(self, event),
        fields(event_id = event.id, user_id = event.notify_user_id, event_type = %event.event_type)
    )]
    pub async fn on_event_persisting(&self, event: &mut Event) -> DispatchOutcome {
        let outcome = self.run_pass(event).await;

        self.stats.record_outcome(outcome);
        match outcome {
            DispatchOutcome::Attempted(status) => DispatchMetrics::record_dispatch(status.as_str()),
            DispatchOutcome::Skipped(reason) => DispatchMetrics::record_skipped(reason.as_str()),
        }

        outcome
    }

    async fn run_pass(&self, event: &mut Event) -> DispatchOutcome {
        let Some(credential) = gate::configured_credential(self.host.as_ref()) else {
            return DispatchOutcome::Skipped(SkipReason::NotConfigured);
        };

        if !event.delivery_status.is_some_and(DeliveryStatus::is_dispatchable) {
            tracing::debug!(status = ?event.delivery_status, "Event not eligible for delivery");
            return DispatchOutcome::Skipped(SkipReason::NotDispatchable);
        }

        let status = match self.attempt(event, credential).await {
            Ok(status) => status,
            // Rendering and lookup failures only; the sender classifies transport
            Err(error) => {
                let status = error
                    .delivery_status(TransportFailurePolicy::default())
                    .unwrap_or(DeliveryStatus::Fatal);
                tracing::warn!(
                    error = %error,
                    kind = error.kind(),
                    status = %status,
                    "Push dispatch failed before delivery"
                );
                status
            }
        };

        event.apply_status(status);
        tracing::debug!(status = %status, "Dispatch pass complete");
        DispatchOutcome::Attempted(status)
    }

    async fn attempt(&self, event: &Event, credential: Credential) -> Result<DeliveryStatus, DispatchError> {
        let rendered = template::render(event, self.host.as_ref())?;

        let recipient = self
            .host
            .lookup_user(event.notify_user_id)
            .await
            .map_err(|e| match e {
                HostError::NotFound(what) => DispatchError::NotFound(what),
                HostError::Other(e) => DispatchError::NotFound(format!(
                    "user {} could not be resolved: {}",
                    event.notify_user_id, e
                )),
            })?;

        let email = recipient.contact_email().ok_or_else(|| {
            DispatchError::NotFound(format!("email of user {}", recipient.user_id))
        })?;

        let request = DispatchRequest {
            delivery_id: Uuid::new_v4(),
            event_id: event.id,
            headline: rendered.headline,
            url: rendered.url,
            email: email.to_string(),
            credential,
        };

        Ok(self.sender.send(&request).await)
    }

    /// Run a delivery pass over each event, at most `max_concurrent_deliveries`
    /// at a time. Outcomes are returned in input order.
    pub async fn dispatch_all(&self, events: &mut [Event]) -> Vec<DispatchOutcome> {
        stream::iter(events.iter_mut().map(|event| self.on_event_persisting(event)))
            .buffered(self.max_concurrent_deliveries)
            .collect()
            .await
    }

    /// Deliver every event staged during a save transaction and hand the events
    /// back with their final statuses for the host to persist.
    #[tracing::instrument(name = "dispatcher.dispatch_batch", skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn dispatch_batch(&self, mut batch: DispatchBatch) -> Vec<Event> {
        let outcomes = self.dispatch_all(batch.events_mut()).await;

        let sent = outcomes
            .iter()
            .filter(|o| o.status() == Some(DeliveryStatus::Sent))
            .count();
        tracing::debug!(sent, total = outcomes.len(), "Dispatched batch");

        batch.into_events()
    }
}
