use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clients::provider::PushDelivery;
use crate::config::Config;
use crate::error::{DeliveryError, InitError};
use crate::models::fcm::{
    FcmMessage, FcmNotification, FcmSendRequest, FcmSendResponse, OutboundNotification,
    SendOutcome, SendTarget, TopicManagementRequest, TopicManagementResponse, TopicMembership,
};
use crate::models::retry::RetryConfig;
use crate::utils::retry_with_backoff;

const FCM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/firebase.messaging"];

const PROJECT_ID_VAR: &str = "FCM_PROJECT_ID";
const CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Source of OAuth2 bearer tokens for provider calls. Production binds to
/// gcp_auth; tests supply a fixed token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, DeliveryError>;
}

pub struct GcpTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl GcpTokenSource {
    pub fn new(account: CustomServiceAccount) -> Self {
        Self {
            provider: Arc::new(account),
        }
    }
}

#[async_trait]
impl TokenSource for GcpTokenSource {
    async fn access_token(&self) -> Result<String, DeliveryError> {
        let token = self
            .provider
            .token(FCM_SCOPES)
            .await
            .map_err(|e| DeliveryError::Auth(e.to_string()))?;

        Ok(token.as_str().to_string())
    }
}

#[derive(Clone)]
pub struct FcmSettings {
    pub fcm_endpoint: String,
    pub iid_endpoint: String,
    pub retry: RetryConfig,
}

impl FcmSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fcm_endpoint: config.fcm_endpoint.clone(),
            iid_endpoint: config.iid_endpoint.clone(),
            retry: config.retry_config(),
        }
    }
}

pub struct FcmClient {
    http_client: Client,
    project_id: String,
    settings: FcmSettings,
    token_source: Arc<dyn TokenSource>,
}

impl FcmClient {
    /// Reads identity configuration from the environment and builds the
    /// client. Called once per process through the delivery client provider.
    pub async fn initialize(settings: FcmSettings) -> Result<Self, InitError> {
        let project_id = env::var(PROJECT_ID_VAR)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or(InitError::MissingConfig(PROJECT_ID_VAR))?;

        let credentials_path = env::var(CREDENTIALS_VAR)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or(InitError::MissingConfig(CREDENTIALS_VAR))?;

        if let Err(e) = std::fs::metadata(&credentials_path) {
            return Err(InitError::CredentialNotFound {
                path: credentials_path,
                detail: e.to_string(),
            });
        }

        let account = CustomServiceAccount::from_file(&credentials_path)
            .map_err(|e| InitError::ProviderRejected(e.to_string()))?;

        info!(project_id = %project_id, "FCM client initialized");

        Ok(Self::with_token_source(
            project_id,
            settings,
            Arc::new(GcpTokenSource::new(account)),
        ))
    }

    pub fn with_token_source(
        project_id: String,
        settings: FcmSettings,
        token_source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http_client: Client::new(),
            project_id,
            settings,
            token_source,
        }
    }

    async fn send_once(&self, request: &FcmSendRequest) -> Result<String, DeliveryError> {
        let access_token = self.token_source.access_token().await?;

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.settings.fcm_endpoint, self.project_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&access_token)
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            let body: FcmSendResponse = response.json().await?;
            let message_id = body.name.unwrap_or_else(|| Uuid::new_v4().to_string());

            info!(message_id = %message_id, "FCM push notification sent");
            Ok(message_id)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected { status, body })
        }
    }

    async fn change_membership(
        &self,
        path: &str,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicMembership, DeliveryError> {
        let access_token = self.token_source.access_token().await?;

        let url = format!("{}/iid/v1{}", self.settings.iid_endpoint, path);

        let request = TopicManagementRequest {
            to: format!("/topics/{}", topic),
            registration_tokens: tokens.to_vec(),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&access_token)
            .header("access_token_auth", "true")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status, body });
        }

        let body: TopicManagementResponse = response.json().await?;

        let failure_count = body
            .results
            .iter()
            .filter(|result| result.error.is_some())
            .count();

        debug!(
            topic,
            tokens = tokens.len(),
            failures = failure_count,
            "Topic membership updated"
        );

        Ok(TopicMembership {
            success_count: tokens.len().saturating_sub(failure_count),
            failure_count,
        })
    }

    fn build_request(
        target: &SendTarget,
        title: &str,
        body: &str,
        data: Option<HashMap<String, String>>,
    ) -> FcmSendRequest {
        let (token, topic) = match target {
            SendTarget::Token(token) => (Some(token.clone()), None),
            SendTarget::Topic(topic) => (None, Some(topic.clone())),
        };

        FcmSendRequest {
            message: FcmMessage {
                token,
                topic,
                notification: FcmNotification {
                    title: title.to_string(),
                    body: body.to_string(),
                },
                data,
            },
        }
    }
}

#[async_trait]
impl PushDelivery for FcmClient {
    async fn send(
        &self,
        target: &SendTarget,
        title: &str,
        body: &str,
        data: Option<HashMap<String, String>>,
    ) -> Result<String, DeliveryError> {
        let request = Self::build_request(target, title, body, data);

        retry_with_backoff(&self.settings.retry, || self.send_once(&request)).await
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
        self.change_membership(":batchAdd", tokens, topic).await
    }

    async fn unsubscribe(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicMembership, DeliveryError> {
        self.change_membership(":batchRemove", tokens, topic).await
    }
}
