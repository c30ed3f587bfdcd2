use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Where a notification is addressed: one device or one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    Token(String),
    Topic(String),
}

/// One entry of a batch send.
#[derive(Debug, Clone)]
pub struct OutboundNotification {
    pub target: SendTarget,
    pub title: String,
    pub body: String,
    pub data: Option<HashMap<String, String>>,
}

/// Per-item result of a batch send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-token tallies for a subscribe/unsubscribe call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMembership {
    pub success_count: usize,
    pub failure_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmSendRequest {
    pub message: FcmMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    pub notification: FcmNotification,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmNotification {
    pub title: String,
    pub body: String,
}

/// FCM v1 send response; `name` is the provider-assigned message name.
#[derive(Debug, Clone, Deserialize)]
pub struct FcmSendResponse {
    pub name: Option<String>,
}

/// IID batchAdd/batchRemove request body.
#[derive(Debug, Clone, Serialize)]
pub struct TopicManagementRequest {
    pub to: String,
    pub registration_tokens: Vec<String>,
}

/// IID response: one entry per token, empty object on success.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicManagementResponse {
    #[serde(default)]
    pub results: Vec<TopicManagementResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicManagementResult {
    pub error: Option<String>,
}
