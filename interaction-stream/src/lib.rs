use std::future::Future;

use anyhow::Context;
use tokio::signal::unix::SignalKind;
use tracing::{error, info, warn};

use interaction_common::diagnostics::TracingDiagnostics;
use interaction_common::lookup::ReferenceLookup;
use interaction_common::metrics::{serve, setup_metrics_router};
use interaction_common::normalize::Normalizer;
use interaction_common::sink::PgSink;

use crate::config::Config;
use crate::error::StreamError;
use crate::feed::KafkaFeed;
use crate::worker::{StreamWorker, PATH};

pub mod config;
pub mod error;
pub mod feed;
pub mod worker;

/// Resolves on the first SIGINT or SIGTERM received by the process.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    })
}

/// Run a streaming ingestion session until `shutdown` resolves.
///
/// The destination connection is closed however the session ends, once it has been opened.
pub async fn run(config: Config, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    let museum = config.session.museum().to_owned();
    let window = config.session.window()?;
    info!(%museum, %window, "starting stream ingestion");

    let feed = KafkaFeed::subscribe(&config.kafka, config.topic()).map_err(StreamError::from)?;

    let conn = config.session.connect().await?;
    let mut sink = PgSink::new(conn);

    let result = async {
        let lookup = ReferenceLookup::load(sink.connection(), &museum).await?;

        let router = setup_metrics_router().context("failed to install metrics recorder")?;
        let bind = config.bind();
        tokio::task::spawn(async move {
            if let Err(e) = serve(router, &bind).await {
                error!("failed to serve metrics: {e}");
            }
        });

        let diagnostics = TracingDiagnostics::new(PATH);
        let mut worker = StreamWorker::new(
            feed,
            &mut sink,
            &diagnostics,
            Normalizer::new(&lookup, window),
            config.poll_timeout.0,
        );
        worker.run(shutdown).await?;

        Ok::<(), anyhow::Error>(())
    }
    .await;

    match sink.close().await {
        Ok(()) => info!("closed destination connection"),
        Err(e) => warn!("failed to close destination connection: {e}"),
    }

    result
}
