use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, RelayError, ValidationError};

/// Wire format of a queue message. Unknown JSON fields are ignored; absent
/// optional strings deserialize to empty strings and absent `data` to `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub action_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fcm_token: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
}

impl Envelope {
    /// Decodes a raw queue payload. Only the envelope-level requirement is
    /// checked here; per-action field requirements belong to the handlers.
    pub fn parse(raw: &str) -> Result<Envelope, ParseError> {
        let envelope: Envelope = serde_json::from_str(raw)?;

        if envelope.action_type.is_empty() {
            return Err(ParseError::MissingField("actionType"));
        }

        Ok(envelope)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SendSingle,
    SendToTopic,
    Subscribe,
    Unsubscribe,
}

impl Action {
    /// Maps a wire tag to an action. `None` means the tag is unroutable and
    /// the message will be drained instead of retried.
    pub fn from_tag(tag: &str) -> Option<Action> {
        match tag {
            "SEND_SINGLE_NOTIFICATION" => Some(Action::SendSingle),
            "SEND_TOPIC_NOTIFICATION" => Some(Action::SendToTopic),
            "SUBSCRIBE_TO_TOPIC" => Some(Action::Subscribe),
            "UNSUBSCRIBE_FROM_TOPIC" => Some(Action::Unsubscribe),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Action::SendSingle => "SEND_SINGLE_NOTIFICATION",
            Action::SendToTopic => "SEND_TOPIC_NOTIFICATION",
            Action::Subscribe => "SUBSCRIBE_TO_TOPIC",
            Action::Unsubscribe => "UNSUBSCRIBE_FROM_TOPIC",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// A single-device send with every field it needs, nothing optional.
#[derive(Debug, Clone)]
pub struct SendSingleRequest {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: Option<HashMap<String, String>>,
}

impl SendSingleRequest {
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ValidationError> {
        let token = require(Action::SendSingle, "fcmToken", &envelope.fcm_token)?;
        let title = require(Action::SendSingle, "title", &envelope.title)?;
        let body = require(Action::SendSingle, "body", &envelope.body)?;

        Ok(Self {
            token,
            title,
            body,
            data: envelope.data.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SendToTopicRequest {
    pub topic: String,
    pub title: String,
    pub body: String,
    pub data: Option<HashMap<String, String>>,
}

impl SendToTopicRequest {
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ValidationError> {
        let topic = require(Action::SendToTopic, "topicName", &envelope.topic_name)?;
        let title = require(Action::SendToTopic, "title", &envelope.title)?;
        let body = require(Action::SendToTopic, "body", &envelope.body)?;

        Ok(Self {
            topic,
            title,
            body,
            data: envelope.data.clone(),
        })
    }
}

/// Token/topic pair shared by the subscribe and unsubscribe actions.
#[derive(Debug, Clone)]
pub struct TopicMemberRequest {
    pub token: String,
    pub topic: String,
}

impl TopicMemberRequest {
    pub fn from_envelope(action: Action, envelope: &Envelope) -> Result<Self, ValidationError> {
        let token = require(action, "fcmToken", &envelope.fcm_token)?;
        let topic = require(action, "topicName", &envelope.topic_name)?;

        Ok(Self { token, topic })
    }
}

fn require(action: Action, field: &'static str, value: &str) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError { action, field });
    }

    Ok(value.to_string())
}

/// One inbound queue message at the transport boundary: an opaque identifier
/// used for failure reporting plus the raw payload text.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: String,
    pub body: String,
}

#[derive(Debug)]
pub enum Disposition {
    /// Handler reached the provider and the provider accepted.
    Delivered,
    /// Unroutable action tag, intentionally consumed without retry.
    Drained,
    Failed(RelayError),
}

#[derive(Debug)]
pub struct MessageOutcome {
    pub message_id: String,
    pub disposition: Disposition,
}

impl MessageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.disposition, Disposition::Failed(_))
    }
}

/// Ordered per-message outcomes for one batch. Identifiers reported by
/// [`BatchResult::failed_ids`] are redelivered by the transport; everything
/// else is considered consumed.
#[derive(Debug, Default)]
pub struct BatchResult {
    outcomes: Vec<MessageOutcome>,
}

impl BatchResult {
    pub fn new(outcomes: Vec<MessageOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[MessageOutcome] {
        &self.outcomes
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_failed())
            .map(|outcome| outcome.message_id.clone())
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

/// Payload published to the failed queue once redelivery is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMessage {
    pub payload: String,
    pub failure_reason: String,
    pub failed_at: String,
}
