//! Ingest archived kiosk exports into the museum database in one transaction.
use anyhow::Context;
use envconfig::Envconfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use interaction_batch::config::Config;
use interaction_batch::run;

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

    run(config).await?;

    info!("Batch ingestion finished");

    Ok(())
}
