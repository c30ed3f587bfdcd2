use std::sync::Arc;

use push_relay::clients::fcm::{FcmClient, FcmSettings};
use push_relay::clients::provider::{ClientFactory, DeliveryClientProvider, PushDelivery};
use push_relay::error::{DeliveryError, RelayError};
use push_relay::models::fcm::{OutboundNotification, SendTarget};
use push_relay::models::message::Envelope;
use push_relay::models::retry::RetryConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{StaticTokenSource, single_attempt};

const PROJECT_ID: &str = "relay-test";

fn test_client(server: &MockServer, retry: RetryConfig) -> FcmClient {
    FcmClient::with_token_source(
        PROJECT_ID.to_string(),
        FcmSettings {
            fcm_endpoint: server.uri(),
            iid_endpoint: server.uri(),
            retry,
        },
        Arc::new(StaticTokenSource("test-access-token".to_string())),
    )
}

/// Test: A successful send returns the provider-assigned message name
#[tokio::test]
async fn test_send_success_returns_message_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/messages:send", PROJECT_ID)))
        .and(header("authorization", "Bearer test-access-token"))
        .and(body_partial_json(json!({
            "message": {
                "token": "tok1",
                "notification": {"title": "Hi", "body": "There"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/relay-test/messages/0:abc123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, single_attempt());

    let message_id = client
        .send(&SendTarget::Token("tok1".to_string()), "Hi", "There", None)
        .await
        .expect("send should succeed");

    assert_eq!(message_id, "projects/relay-test/messages/0:abc123");
}

/// Test: A rejected send is retried up to the configured attempt limit
#[tokio::test]
async fn test_send_rejection_is_retried_then_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/messages:send", PROJECT_ID)))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2,
    };
    let client = test_client(&server, retry);

    let err = client
        .send(&SendTarget::Token("tok1".to_string()), "Hi", "There", None)
        .await
        .expect_err("send should fail after exhausting retries");

    match err {
        DeliveryError::Rejected { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

/// Test: Topic sends address the topic instead of a device token
#[tokio::test]
async fn test_send_to_topic_targets_topic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/messages:send", PROJECT_ID)))
        .and(body_partial_json(json!({"message": {"topic": "news"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/relay-test/messages/0:topic1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, single_attempt());

    let message_id = client
        .send(&SendTarget::Topic("news".to_string()), "Hi", "There", None)
        .await
        .expect("topic send should succeed");

    assert_eq!(message_id, "projects/relay-test/messages/0:topic1");
}

/// Test: Subscribe tallies per-token results from the IID batch endpoint
#[tokio::test]
async fn test_subscribe_counts_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/iid/v1:batchAdd"))
        .and(header("access_token_auth", "true"))
        .and(body_partial_json(json!({
            "to": "/topics/news",
            "registration_tokens": ["tok1", "tok2"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{}, {"error": "NOT_FOUND"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, single_attempt());

    let membership = client
        .subscribe(&["tok1".to_string(), "tok2".to_string()], "news")
        .await
        .expect("subscribe call should succeed");

    assert_eq!(membership.success_count, 1);
    assert_eq!(membership.failure_count, 1);
}

/// Test: Unsubscribe uses the batchRemove endpoint
#[tokio::test]
async fn test_unsubscribe_uses_batch_remove() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/iid/v1:batchRemove"))
        .and(body_partial_json(json!({"to": "/topics/news"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{}]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, single_attempt());

    let membership = client
        .unsubscribe(&["tok1".to_string()], "news")
        .await
        .expect("unsubscribe call should succeed");

    assert_eq!(membership.success_count, 1);
    assert_eq!(membership.failure_count, 0);
}

/// Test: Batch sends report per-item outcomes without failing the batch
#[tokio::test]
async fn test_send_batch_collects_per_item_outcomes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/messages:send", PROJECT_ID)))
        .and(body_partial_json(json!({"message": {"token": "tok-ok"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/relay-test/messages/0:ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/messages:send", PROJECT_ID)))
        .and(body_partial_json(json!({"message": {"token": "tok-bad"}})))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, single_attempt());

    let notifications = vec![
        OutboundNotification {
            target: SendTarget::Token("tok-ok".to_string()),
            title: "Hi".to_string(),
            body: "There".to_string(),
            data: None,
        },
        OutboundNotification {
            target: SendTarget::Token("tok-bad".to_string()),
            title: "Hi".to_string(),
            body: "There".to_string(),
            data: None,
        },
    ];

    let outcomes = client
        .send_batch(&notifications)
        .await
        .expect("batch send should complete");

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].is_success());
    assert_eq!(
        outcomes[0].message_id.as_deref(),
        Some("projects/relay-test/messages/0:ok")
    );
    assert!(!outcomes[1].is_success());
}

/// Test: A partial subscribe failure surfaces as a subscription error
/// through the handler
#[tokio::test]
async fn test_handler_reports_subscription_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/iid/v1:batchAdd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"error": "INVALID_ARGUMENT"}]
        })))
        .mount(&server)
        .await;

    let client: Arc<dyn PushDelivery> = Arc::new(test_client(&server, single_attempt()));
    let factory: ClientFactory = Arc::new(move || {
        let client = Arc::clone(&client);
        Box::pin(async move { Ok(client) })
    });
    let provider = DeliveryClientProvider::with_factory(factory, false);

    let envelope = Envelope::parse(
        r#"{"actionType":"SUBSCRIBE_TO_TOPIC","fcmToken":"tok1","topicName":"news"}"#,
    )
    .unwrap();

    let err = push_relay::handlers::subscribe(&provider, &envelope)
        .await
        .expect_err("partial failure should surface");

    match err {
        RelayError::Subscription(e) => {
            assert_eq!(e.topic, "news");
            assert_eq!(e.failed, 1);
            assert_eq!(e.attempted, 1);
        }
        other => panic!("expected subscription error, got {:?}", other),
    }
}
