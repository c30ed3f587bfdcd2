use std::sync::Arc;

use anyhow::{Error, Result};
use tracing_subscriber::EnvFilter;

use push_relay::{api, clients::provider::DeliveryClientProvider, config::Config, worker};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let provider = Arc::new(DeliveryClientProvider::new(&config));

    tokio::select! {
        result = api::run_api_server(config.clone(), Arc::clone(&provider)) => result,
        result = worker::run_worker(config, provider) => result,
    }
}
