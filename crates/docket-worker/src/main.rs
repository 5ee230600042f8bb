//! docket-worker — queue consumer for image extraction tasks.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use docket_broker::{BrokerConfig, BrokerConnection, Publisher};
use docket_core::Result;
use docket_inference::{ChatCompletionsBackend, InferenceBackend};
use docket_store::{RedisResultStore, StoreConfig};
use docket_worker::{ConsumerLoop, TaskHandler};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("docket worker starting");

    // An unreachable result store at startup is the one process-fatal
    // condition; everything downstream recovers in place.
    let store = RedisResultStore::connect(StoreConfig::from_env()).await?;

    let connection = Arc::new(BrokerConnection::new(BrokerConfig::from_env()));
    let publisher = Arc::new(Publisher::new(connection.clone()));
    let backend = Arc::new(ChatCompletionsBackend::from_env());
    info!(model = backend.model_name(), "Inference backend configured");

    let handler = Arc::new(TaskHandler::new(backend, Arc::new(store), publisher));
    let consumer = ConsumerLoop::new(connection, handler);

    let stop = consumer.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            stop.stop();
        }
    });

    consumer.run().await;
    Ok(())
}
