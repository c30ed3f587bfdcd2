use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt;
use lapin::{Consumer, message::Delivery};
use tokio::time::{Duration, timeout};
use tracing::{info, warn};

use crate::clients::provider::DeliveryClientProvider;
use crate::clients::rbmq::RabbitMqClient;
use crate::config::Config;
use crate::dispatcher::process_batch;
use crate::models::message::{BatchResult, Disposition, DlqMessage, QueueMessage};

/// Consume loop: accumulate a batch, dispatch it, then settle each delivery
/// against the batch result. Runs until the consumer stream closes.
pub async fn run_worker(config: Config, provider: Arc<DeliveryClientProvider>) -> Result<(), Error> {
    let rabbitmq = RabbitMqClient::connect(&config).await?;
    let mut consumer = rabbitmq.create_consumer().await?;

    info!("Push relay worker started");

    loop {
        let deliveries = collect_batch(
            &mut consumer,
            config.batch_max_messages,
            Duration::from_millis(config.batch_linger_ms),
        )
        .await?;

        if deliveries.is_empty() {
            info!("Consumer stream closed, worker shutting down");
            return Ok(());
        }

        let messages: Vec<QueueMessage> = deliveries
            .iter()
            .map(|delivery| QueueMessage {
                id: delivery.delivery_tag.to_string(),
                body: String::from_utf8_lossy(&delivery.data).into_owned(),
            })
            .collect();

        let result = process_batch(&provider, &messages, config.worker_concurrency).await;

        settle(&rabbitmq, &deliveries, &result).await?;
    }
}

/// Waits for one delivery, then drains followers until the batch is full or
/// the linger window elapses without a new message.
async fn collect_batch(
    consumer: &mut Consumer,
    max_messages: usize,
    linger: Duration,
) -> Result<Vec<Delivery>, Error> {
    let mut deliveries = Vec::new();

    match consumer.next().await {
        Some(Ok(delivery)) => deliveries.push(delivery),
        Some(Err(e)) => return Err(anyhow!("Failed to receive delivery: {}", e)),
        None => return Ok(deliveries),
    }

    while deliveries.len() < max_messages {
        match timeout(linger, consumer.next()).await {
            Ok(Some(Ok(delivery))) => deliveries.push(delivery),
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Delivery receive failed mid-batch");
                break;
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }

    Ok(deliveries)
}

/// Acknowledges consumed messages and rejects failed ones for redelivery. A
/// message failing on its second pass goes to the failed queue instead of
/// cycling through the broker again.
async fn settle(
    rabbitmq: &RabbitMqClient,
    deliveries: &[Delivery],
    result: &BatchResult,
) -> Result<(), Error> {
    for (delivery, outcome) in deliveries.iter().zip(result.outcomes()) {
        match &outcome.disposition {
            Disposition::Delivered | Disposition::Drained => {
                rabbitmq.acknowledge(delivery.delivery_tag).await?;
            }
            Disposition::Failed(error) => {
                if delivery.redelivered {
                    let dlq_message = DlqMessage {
                        payload: String::from_utf8_lossy(&delivery.data).into_owned(),
                        failure_reason: error.to_string(),
                        failed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    };

                    rabbitmq.publish_to_dlq(&dlq_message).await?;
                    rabbitmq.reject(delivery.delivery_tag, false).await?;

                    warn!(
                        delivery_tag = delivery.delivery_tag,
                        "Redelivered message failed again, routed to dlq"
                    );
                } else {
                    rabbitmq.reject(delivery.delivery_tag, true).await?;
                }
            }
        }
    }

    Ok(())
}
