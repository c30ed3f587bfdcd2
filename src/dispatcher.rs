use futures_util::{StreamExt, stream};
use tracing::{info, warn};

use crate::clients::provider::DeliveryClientProvider;
use crate::error::RelayError;
use crate::handlers;
use crate::models::message::{
    Action, BatchResult, Disposition, Envelope, MessageOutcome, QueueMessage,
};

/// Processes one batch of queue messages and accounts for every one of them.
///
/// No error escapes this function: parse, validation, initialization and
/// delivery failures all become per-message failure markers in the returned
/// [`BatchResult`]. Messages are independent, so they are dispatched with
/// bounded concurrency while outcome order follows input order.
pub async fn process_batch(
    provider: &DeliveryClientProvider,
    messages: &[QueueMessage],
    concurrency: usize,
) -> BatchResult {
    let outcomes = stream::iter(messages)
        .map(|message| process_message(provider, message))
        .buffered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let result = BatchResult::new(outcomes);

    info!(
        total = messages.len(),
        failed = result.failed_count(),
        "Batch processed"
    );

    result
}

async fn process_message(
    provider: &DeliveryClientProvider,
    message: &QueueMessage,
) -> MessageOutcome {
    let disposition = match dispatch(provider, &message.body).await {
        Ok(disposition) => disposition,
        Err(e) => {
            warn!(message_id = %message.id, error = %e, "Message failed");
            Disposition::Failed(e)
        }
    };

    MessageOutcome {
        message_id: message.id.clone(),
        disposition,
    }
}

async fn dispatch(
    provider: &DeliveryClientProvider,
    payload: &str,
) -> Result<Disposition, RelayError> {
    let envelope = Envelope::parse(payload)?;

    let action = match Action::from_tag(&envelope.action_type) {
        Some(action) => action,
        None => {
            // Unroutable tags are consumed rather than redelivered forever.
            warn!(action_type = %envelope.action_type, "Unknown action type, draining message");
            return Ok(Disposition::Drained);
        }
    };

    match action {
        Action::SendSingle => handlers::send_single(provider, &envelope).await?,
        Action::SendToTopic => handlers::send_to_topic(provider, &envelope).await?,
        Action::Subscribe => handlers::subscribe(provider, &envelope).await?,
        Action::Unsubscribe => handlers::unsubscribe(provider, &envelope).await?,
    }

    Ok(Disposition::Delivered)
}
