//! End-to-end dispatch tests
//!
//! These tests run the full pipeline (queue decision, rendering, recipient
//! lookup, HTTP delivery, classification) against a mocked provider endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

use forum_push_notifier::config::{DispatchConfig, ProviderConfig, Settings, TransportFailurePolicy};
use forum_push_notifier::delivery::{PushSender, PushbulletClient};
use forum_push_notifier::notification::{
    DeliveryStatus, DispatchBatch, DispatchOutcome, DispatchRequest, Dispatcher, Event, QueueDecision,
    Recipient, SkipReason,
};
use forum_push_notifier::MemoryHost;

const BASE_URL: &str = "https://forum.example";

/// Create a host with one opted-in user and a provisioned credential
fn create_host() -> Arc<MemoryHost> {
    let host = Arc::new(MemoryHost::new(BASE_URL));
    host.set_credential(Some("o.test-token"));
    host.add_user(Recipient::new(7, "ann", "a@x.com"));
    host.set_preference(7, "Pushbullet.CommentReply", true);
    host
}

fn create_dispatcher(host: Arc<MemoryHost>, server: &MockServer) -> Dispatcher {
    let settings = Settings {
        provider: ProviderConfig {
            endpoint: format!("{}/v2/pushes", server.uri()),
            timeout_seconds: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    Dispatcher::from_settings(host, &settings).unwrap()
}

fn reply_event(id: u64) -> Event {
    Event::builder(id, 7, "CommentReply")
        .headline("{User} replied to {Discussion}")
        .field("User", "Ann")
        .field("Discussion", "Bug")
        .route("/discussion/5")
        .build()
}

#[tokio::test]
async fn test_reply_is_pushed_and_marked_sent() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v2/pushes"))
        .and(matchers::header("Access-Token", "o.test-token"))
        .and(matchers::header("Content-Type", "application/json"))
        .and(matchers::body_string(
            r#"{"type":"link","body":"Ann replied to Bug","url":"https://forum.example/discussion/5","email":"a@x.com"}"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = create_dispatcher(create_host(), &server);
    let mut batch = DispatchBatch::new();
    let mut event = reply_event(1);

    let decision = dispatcher.on_event_created(&mut batch, &mut event).await;
    assert_eq!(decision, QueueDecision::Queued);
    assert_eq!(event.delivery_status, Some(DeliveryStatus::Pending));

    let events = dispatcher.dispatch_batch(batch).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].delivery_status, Some(DeliveryStatus::Sent));
    assert_eq!(events[0].delivery_status.map(DeliveryStatus::code), Some(2));
}

#[tokio::test]
async fn test_retryable_error_is_redelivered_on_next_save() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = create_dispatcher(create_host(), &server);
    let mut batch = DispatchBatch::new();
    let mut event = reply_event(1);
    dispatcher.on_event_created(&mut batch, &mut event).await;

    let mut event = dispatcher.dispatch_batch(batch).await.remove(0);
    assert_eq!(event.delivery_status, Some(DeliveryStatus::RetryableError));

    // Next save cycle of the same record
    let outcome = dispatcher.on_event_persisting(&mut event).await;
    assert_eq!(outcome, DispatchOutcome::Attempted(DeliveryStatus::Sent));

    // Already sent: never delivered again
    let outcome = dispatcher.on_event_persisting(&mut event).await;
    assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NotDispatchable));

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rejected_push_is_fatal_and_final() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":{"type":"invalid_request"}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = create_dispatcher(create_host(), &server);
    let mut event = reply_event(1);
    event.delivery_status = Some(DeliveryStatus::Pending);

    assert_eq!(
        dispatcher.on_event_persisting(&mut event).await,
        DispatchOutcome::Attempted(DeliveryStatus::Fatal)
    );
    assert_eq!(
        dispatcher.on_event_persisting(&mut event).await,
        DispatchOutcome::Skipped(SkipReason::NotDispatchable)
    );
    assert_eq!(event.delivery_status, Some(DeliveryStatus::Fatal));
}

#[tokio::test]
async fn test_nothing_is_sent_without_credential() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let host = create_host();
    host.set_credential(None);
    let dispatcher = create_dispatcher(host, &server);
    let mut batch = DispatchBatch::new();
    let mut event = reply_event(1);

    assert_eq!(
        dispatcher.on_event_created(&mut batch, &mut event).await,
        QueueDecision::NotConfigured
    );
    assert!(batch.is_empty());
    assert!(event.delivery_status.is_none());

    let mut pending = reply_event(2);
    pending.delivery_status = Some(DeliveryStatus::Pending);
    for _ in 0..2 {
        dispatcher.on_event_persisting(&mut pending).await;
    }
    assert_eq!(pending.delivery_status, Some(DeliveryStatus::Pending));
}

#[tokio::test]
async fn test_opted_out_user_gets_nothing() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let host = create_host();
    host.set_preference(7, "Pushbullet.CommentReply", false);
    let dispatcher = create_dispatcher(host, &server);
    let mut batch = DispatchBatch::new();
    let mut event = reply_event(1);

    assert_eq!(
        dispatcher.on_event_created(&mut batch, &mut event).await,
        QueueDecision::OptedOut
    );
    let events = dispatcher.dispatch_batch(batch).await;
    assert!(events.is_empty());
    assert!(event.delivery_status.is_none());
}

#[tokio::test]
async fn test_unreachable_provider_follows_transport_policy() {
    let host = create_host();
    let settings = |policy| Settings {
        provider: ProviderConfig {
            // Port 1 is reserved and refuses connections
            endpoint: "http://127.0.0.1:1/v2/pushes".to_string(),
            timeout_seconds: 1,
            connect_timeout_seconds: 1,
            transport_failure: policy,
            ..Default::default()
        },
        ..Default::default()
    };

    let lenient = Dispatcher::from_settings(host.clone(), &settings(TransportFailurePolicy::Retryable)).unwrap();
    let mut event = reply_event(1);
    event.delivery_status = Some(DeliveryStatus::Pending);
    assert_eq!(
        lenient.on_event_persisting(&mut event).await.status(),
        Some(DeliveryStatus::RetryableError)
    );

    let strict = Dispatcher::from_settings(host, &settings(TransportFailurePolicy::Fatal)).unwrap();
    assert_eq!(
        strict.on_event_persisting(&mut event).await.status(),
        Some(DeliveryStatus::Fatal)
    );
}

#[tokio::test]
async fn test_sender_policy_applies_with_plain_constructor() {
    let strict = PushbulletClient::new(&ProviderConfig {
        endpoint: "http://127.0.0.1:1/v2/pushes".to_string(),
        timeout_seconds: 1,
        connect_timeout_seconds: 1,
        transport_failure: TransportFailurePolicy::Fatal,
        ..Default::default()
    })
    .unwrap();
    let dispatcher = Dispatcher::new(create_host(), Arc::new(strict), &DispatchConfig::default());

    let mut event = reply_event(1);
    event.delivery_status = Some(DeliveryStatus::Pending);
    assert_eq!(
        dispatcher.on_event_persisting(&mut event).await,
        DispatchOutcome::Attempted(DeliveryStatus::Fatal)
    );
}

/// Sender that holds each push briefly and records the most pushes in flight at once
#[derive(Default)]
struct SlowSender {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl PushSender for SlowSender {
    async fn send(&self, _request: &DispatchRequest) -> DeliveryStatus {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        DeliveryStatus::Sent
    }
}

#[tokio::test]
async fn test_batch_deliveries_overlap_up_to_the_limit() {
    let sender = Arc::new(SlowSender::default());
    let dispatcher = Dispatcher::new(
        create_host(),
        sender.clone(),
        &DispatchConfig {
            max_concurrent_deliveries: 3,
            ..Default::default()
        },
    );

    let mut batch = DispatchBatch::new();
    for id in 1..=9 {
        let mut event = reply_event(id);
        dispatcher.on_event_created(&mut batch, &mut event).await;
    }

    let events = dispatcher.dispatch_batch(batch).await;
    assert!(events
        .iter()
        .all(|e| e.delivery_status == Some(DeliveryStatus::Sent)));
    assert_eq!(sender.calls.load(Ordering::SeqCst), 9);

    let peak = sender.peak.load(Ordering::SeqCst);
    assert!(peak > 1, "deliveries ran one at a time");
    assert!(peak <= 3, "{} deliveries in flight, limit is 3", peak);
}
