use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clients::fcm::{FcmClient, FcmSettings};
use crate::config::Config;
use crate::error::{DeliveryError, InitError};
use crate::models::fcm::{OutboundNotification, SendOutcome, SendTarget, TopicMembership};

/// Capability interface over the push-delivery provider. The production
/// implementation is [`FcmClient`]; tests substitute an in-memory fake.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    /// Delivers one notification and returns the provider message id.
    async fn send(
        &self,
        target: &SendTarget,
        title: &str,
        body: &str,
        data: Option<HashMap<String, String>>,
    ) -> Result<String, DeliveryError>;

    /// Delivers many notifications, one outcome per item. A single rejected
    /// item never fails the whole call.
    async fn send_batch(
        &self,
        notifications: &[OutboundNotification],
    ) -> Result<Vec<SendOutcome>, DeliveryError>;

    async fn subscribe(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicMembership, DeliveryError>;

    async fn unsubscribe(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicMembership, DeliveryError>;
}

pub type ClientFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn PushDelivery>, InitError>> + Send + Sync>;

/// Observable lifecycle of the shared client, surfaced on the health check.
#[derive(Debug, Clone)]
pub enum ClientState {
    Uninitialized,
    Ready,
    Failed(InitError),
}

/// Process-wide owner of the delivery client.
///
/// The slot mutex is held across initialization, so concurrent first callers
/// block until the one in-flight attempt resolves and then all observe the
/// same outcome. A failed outcome stays cached unless `retry_init_on_failure`
/// is set, in which case the next caller re-runs the factory.
pub struct DeliveryClientProvider {
    slot: Mutex<Option<Result<Arc<dyn PushDelivery>, InitError>>>,
    factory: ClientFactory,
    retry_init_on_failure: bool,
}

impl DeliveryClientProvider {
    pub fn new(config: &Config) -> Self {
        let settings = FcmSettings::from_config(config);

        let factory: ClientFactory = Arc::new(move || {
            let settings = settings.clone();
            Box::pin(async move {
                let client = FcmClient::initialize(settings).await?;
                let client: Arc<dyn PushDelivery> = Arc::new(client);
                Ok(client)
            })
        });

        Self::with_factory(factory, config.retry_init_on_failure)
    }

    pub fn with_factory(factory: ClientFactory, retry_init_on_failure: bool) -> Self {
        Self {
            slot: Mutex::new(None),
            factory,
            retry_init_on_failure,
        }
    }

    pub async fn get_client(&self) -> Result<Arc<dyn PushDelivery>, InitError> {
        let mut slot = self.slot.lock().await;

        match slot.as_ref() {
            Some(Ok(client)) => return Ok(Arc::clone(client)),
            Some(Err(err)) if !self.retry_init_on_failure => return Err(err.clone()),
            _ => {}
        }

        let outcome = (self.factory)().await;

        match &outcome {
            Ok(_) => info!("Delivery client initialized"),
            Err(err) => warn!(error = %err, "Delivery client initialization failed"),
        }

        *slot = Some(outcome.clone());
        outcome
    }

    pub async fn state(&self) -> ClientState {
        match self.slot.lock().await.as_ref() {
            None => ClientState::Uninitialized,
            Some(Ok(_)) => ClientState::Ready,
            Some(Err(err)) => ClientState::Failed(err.clone()),
        }
    }
}
