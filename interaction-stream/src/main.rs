//! Consume kiosk interactions from Kafka and store them one by one as they arrive.
use anyhow::Context;
use envconfig::Envconfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use interaction_stream::config::Config;
use interaction_stream::{run, shutdown_signal};

fn setup_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    let log_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_filter(EnvFilter::from_default_env())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_filter(EnvFilter::from_default_env())
            .boxed()
    };
    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_from_env().context("invalid configuration")?;
    let shutdown = shutdown_signal().context("failed to install signal handlers")?;

    run(config, shutdown).await?;

    info!("Stream ingestion stopped");

    Ok(())
}
