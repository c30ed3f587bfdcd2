use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::retry::RetryConfig;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    pub push_queue_name: String,
    pub failed_queue_name: String,
    pub prefetch_count: u16,

    #[serde(default = "default_batch_max_messages")]
    pub batch_max_messages: usize,

    #[serde(default = "default_batch_linger_ms")]
    pub batch_linger_ms: u64,

    #[serde(default = "default_fcm_endpoint")]
    pub fcm_endpoint: String,

    #[serde(default = "default_iid_endpoint")]
    pub iid_endpoint: String,

    // Whether a failed delivery-client initialization is retried on the next
    // message instead of being cached for process lifetime.
    #[serde(default)]
    pub retry_init_on_failure: bool,

    pub max_retry_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub retry_backoff_multiplier: u64,

    pub worker_concurrency: usize,

    pub server_port: u16,
}

fn default_batch_max_messages() -> usize {
    10
}

fn default_batch_linger_ms() -> u64 {
    200
}

fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_iid_endpoint() -> String {
    "https://iid.googleapis.com".to_string()
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }
}
