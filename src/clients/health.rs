use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{
        provider::{ClientState, DeliveryClientProvider},
        rbmq::RabbitMqClient,
    },
    config::Config,
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub struct HealthChecker {
    config: Config,
    provider: Arc<DeliveryClientProvider>,
}

impl HealthChecker {
    pub fn new(config: Config, provider: Arc<DeliveryClientProvider>) -> Self {
        Self { config, provider }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let rabbitmq_health = self.check_rabbitmq().await;
        checks.insert("message_broker".to_string(), rabbitmq_health);

        let delivery_health = self.check_delivery_client().await;
        checks.insert("delivery_client".to_string(), delivery_health);

        let overall_status = self.determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now(),
            checks,
        }
    }

    async fn check_rabbitmq(&self) -> ServiceHealth {
        let start = Instant::now();

        match RabbitMqClient::connect(&self.config).await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    // An uninitialized client is healthy-idle: initialization is lazy and
    // only happens once a message needs the provider.
    async fn check_delivery_client(&self) -> ServiceHealth {
        match self.provider.state().await {
            ClientState::Uninitialized => ServiceHealth::healthy(0),
            ClientState::Ready => ServiceHealth::healthy(0),
            ClientState::Failed(e) => {
                warn!(error = %e, "Delivery client is in a failed state");
                ServiceHealth::unhealthy(format!("Initialization failed: {}", e))
            }
        }
    }

    fn determine_overall_status(&self, checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
        let has_unhealthy = checks
            .values()
            .any(|health| health.status == HealthStatus::Unhealthy);

        if has_unhealthy {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        }
    }
}
