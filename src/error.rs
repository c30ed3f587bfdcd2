use thiserror::Error;

use crate::models::message::Action;

/// Failure while decoding a raw queue payload into an envelope.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed message payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// An action-specific required field was absent or empty.
#[derive(Debug, Clone, Error)]
#[error("missing required field `{field}` for action {action}")]
pub struct ValidationError {
    pub action: Action,
    pub field: &'static str,
}

/// The delivery client could not be constructed.
///
/// Clone so a failed initialization outcome can be cached and handed to
/// every later caller.
#[derive(Debug, Clone, Error)]
pub enum InitError {
    #[error("environment variable `{0}` is not set")]
    MissingConfig(&'static str),

    #[error("credentials file not found at {path}: {detail}")]
    CredentialNotFound { path: String, detail: String },

    #[error("delivery provider rejected credentials: {0}")]
    ProviderRejected(String),
}

/// A provider call failed after a valid request was built.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request to delivery provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to obtain access token: {0}")]
    Auth(String),

    #[error("delivery provider returned {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Partial or total failure on a multi-token topic operation.
#[derive(Debug, Clone, Error)]
#[error("{failed} of {attempted} tokens failed to {operation} for topic `{topic}`")]
pub struct SubscriptionError {
    pub topic: String,
    pub operation: &'static str,
    pub failed: usize,
    pub attempted: usize,
}

/// Per-message failure marker collected by the batch dispatcher.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}
