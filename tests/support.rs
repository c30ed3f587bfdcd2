use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use push_relay::clients::fcm::TokenSource;
use push_relay::clients::provider::{ClientFactory, DeliveryClientProvider, PushDelivery};
use push_relay::error::DeliveryError;
use push_relay::models::fcm::{OutboundNotification, SendOutcome, SendTarget, TopicMembership};
use push_relay::models::retry::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Send {
        target: SendTarget,
        title: String,
        body: String,
        data: Option<HashMap<String, String>>,
    },
    Subscribe {
        tokens: Vec<String>,
        topic: String,
    },
    Unsubscribe {
        tokens: Vec<String>,
        topic: String,
    },
}

/// In-memory delivery provider recording every call, with knobs to inject
/// send failures and topic-membership failures.
#[derive(Default)]
pub struct RecordingDelivery {
    pub calls: Mutex<Vec<RecordedCall>>,
    pub fail_sends: bool,
    pub fail_token: Option<String>,
    pub membership_failures: usize,
}

impl RecordingDelivery {
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn should_fail(&self, target: &SendTarget) -> bool {
        if self.fail_sends {
            return true;
        }

        match (&self.fail_token, target) {
            (Some(fail_token), SendTarget::Token(token)) => fail_token == token,
            _ => false,
        }
    }
}

#[async_trait]
impl PushDelivery for RecordingDelivery {
    async fn send(
        &self,
        target: &SendTarget,
        title: &str,
        body: &str,
        data: Option<HashMap<String, String>>,
    ) -> Result<String, DeliveryError> {
        self.calls.lock().unwrap().push(RecordedCall::Send {
            target: target.clone(),
            title: title.to_string(),
            body: body.to_string(),
            data,
        });

        if self.should_fail(target) {
            return Err(DeliveryError::Rejected {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "injected send failure".to_string(),
            });
        }

        Ok("fake-message-id".to_string())
    }

    async fn send_batch(
        &self,
        notifications: &[OutboundNotification],
    ) -> Result<Vec<SendOutcome>, DeliveryError> {
        let mut outcomes = Vec::with_capacity(notifications.len());

        for notification in notifications {
            let result = self
                .send(
                    &notification.target,
                    &notification.title,
                    &notification.body,
                    notification.data.clone(),
                )
                .await;

            outcomes.push(match result {
                Ok(message_id) => SendOutcome {
                    message_id: Some(message_id),
                    error: None,
                },
                Err(e) => SendOutcome {
                    message_id: None,
                    error: Some(e.to_string()),
                },
            });
        }

        Ok(outcomes)
    }

    async fn subscribe(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicMembership, DeliveryError> {
        self.calls.lock().unwrap().push(RecordedCall::Subscribe {
            tokens: tokens.to_vec(),
            topic: topic.to_string(),
        });

        Ok(TopicMembership {
            success_count: tokens.len().saturating_sub(self.membership_failures),
            failure_count: self.membership_failures,
        })
    }

    async fn unsubscribe(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicMembership, DeliveryError> {
        self.calls.lock().unwrap().push(RecordedCall::Unsubscribe {
            tokens: tokens.to_vec(),
            topic: topic.to_string(),
        });

        Ok(TopicMembership {
            success_count: tokens.len().saturating_sub(self.membership_failures),
            failure_count: self.membership_failures,
        })
    }
}

/// Provider whose factory hands out the given fake, counting initializations.
pub fn counting_provider(
    delivery: Arc<RecordingDelivery>,
    init_count: Arc<AtomicU32>,
) -> DeliveryClientProvider {
    let factory: ClientFactory = Arc::new(move || {
        let delivery = Arc::clone(&delivery);
        let init_count = Arc::clone(&init_count);

        Box::pin(async move {
            init_count.fetch_add(1, Ordering::SeqCst);
            let client: Arc<dyn PushDelivery> = delivery;
            Ok(client)
        })
    });

    DeliveryClientProvider::with_factory(factory, false)
}

pub fn static_provider(delivery: Arc<RecordingDelivery>) -> DeliveryClientProvider {
    counting_provider(delivery, Arc::new(AtomicU32::new(0)))
}

pub struct StaticTokenSource(pub String);

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, DeliveryError> {
        Ok(self.0.clone())
    }
}

/// Retry tuning that keeps tests fast: single attempt unless stated.
pub fn single_attempt() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        initial_delay_ms: 1,
        max_delay_ms: 1,
        backoff_multiplier: 1,
    }
}
