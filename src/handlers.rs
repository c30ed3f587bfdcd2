//! Per-action handlers. Each one validates its action-specific fields
//! before touching the delivery client provider, so an invalid message
//! never triggers client initialization or a provider call.

use tracing::{debug, info};

use crate::clients::provider::DeliveryClientProvider;
use crate::error::{RelayError, SubscriptionError};
use crate::models::fcm::SendTarget;
use crate::models::message::{
    Action, Envelope, SendSingleRequest, SendToTopicRequest, TopicMemberRequest,
};

pub async fn send_single(
    provider: &DeliveryClientProvider,
    envelope: &Envelope,
) -> Result<(), RelayError> {
    let request = SendSingleRequest::from_envelope(envelope)?;

    debug!(device_token = %request.token, "Sending single push notification");

    let client = provider.get_client().await?;

    let message_id = client
        .send(
            &SendTarget::Token(request.token),
            &request.title,
            &request.body,
            request.data,
        )
        .await?;

    info!(message_id = %message_id, "Single notification delivered");

    Ok(())
}

pub async fn send_to_topic(
    provider: &DeliveryClientProvider,
    envelope: &Envelope,
) -> Result<(), RelayError> {
    let request = SendToTopicRequest::from_envelope(envelope)?;

    debug!(topic = %request.topic, "Sending topic push notification");

    let client = provider.get_client().await?;

    let message_id = client
        .send(
            &SendTarget::Topic(request.topic),
            &request.title,
            &request.body,
            request.data,
        )
        .await?;

    info!(message_id = %message_id, "Topic notification delivered");

    Ok(())
}

pub async fn subscribe(
    provider: &DeliveryClientProvider,
    envelope: &Envelope,
) -> Result<(), RelayError> {
    let request = TopicMemberRequest::from_envelope(Action::Subscribe, envelope)?;

    let client = provider.get_client().await?;

    let tokens = vec![request.token];
    let membership = client.subscribe(&tokens, &request.topic).await?;

    if membership.failure_count > 0 {
        return Err(SubscriptionError {
            topic: request.topic,
            operation: "subscribe",
            failed: membership.failure_count,
            attempted: tokens.len(),
        }
        .into());
    }

    info!(topic = %request.topic, "Token subscribed to topic");

    Ok(())
}

pub async fn unsubscribe(
    provider: &DeliveryClientProvider,
    envelope: &Envelope,
) -> Result<(), RelayError> {
    let request = TopicMemberRequest::from_envelope(Action::Unsubscribe, envelope)?;

    let client = provider.get_client().await?;

    let tokens = vec![request.token];
    let membership = client.unsubscribe(&tokens, &request.topic).await?;

    if membership.failure_count > 0 {
        return Err(SubscriptionError {
            topic: request.topic,
            operation: "unsubscribe",
            failed: membership.failure_count,
            attempted: tokens.len(),
        }
        .into());
    }

    info!(topic = %request.topic, "Token unsubscribed from topic");

    Ok(())
}
