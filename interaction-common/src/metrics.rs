use axum::{routing::get, Router};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::error::FailureKind;
use crate::types::InteractionKind;

pub const NORMALIZED_COUNTER: &str = "interactions_normalized_total";
pub const REJECTED_COUNTER: &str = "interactions_rejected_total";
pub const PERSISTED_COUNTER: &str = "interactions_persisted_total";
pub const FEED_ERRORS_COUNTER: &str = "interaction_feed_errors_total";
pub const FEED_EMPTY_COUNTER: &str = "interaction_feed_empty_total";

/// Bind a `TcpListener` on the provided bind address to serve a `Router` on it.
/// This function is intended to take a Router as returned by `setup_metrics_router`, potentially with more routes added by the caller.
pub async fn serve(router: Router, bind: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, router).await?;

    Ok(())
}

/// Install the global Prometheus recorder and build a Router exposing it on `/metrics`.
/// Can only succeed once per process.
pub fn setup_metrics_router() -> Result<Router, BuildError> {
    let recorder_handle = setup_metrics_recorder()?;

    Ok(Router::new().route(
        "/metrics",
        get(move || std::future::ready(recorder_handle.render())),
    ))
}

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_normalized(path: &'static str, kind: InteractionKind) {
    metrics::counter!(NORMALIZED_COUNTER, "path" => path, "kind" => kind.as_str()).increment(1);
}

pub fn record_rejected(path: &'static str, reason: FailureKind) {
    metrics::counter!(REJECTED_COUNTER, "path" => path, "reason" => reason.as_str()).increment(1);
}

pub fn record_persisted(path: &'static str, kind: InteractionKind, count: u64) {
    metrics::counter!(PERSISTED_COUNTER, "path" => path, "kind" => kind.as_str()).increment(count);
}

pub fn record_feed_error(path: &'static str) {
    metrics::counter!(FEED_ERRORS_COUNTER, "path" => path).increment(1);
}

pub fn record_feed_empty(path: &'static str) {
    metrics::counter!(FEED_EMPTY_COUNTER, "path" => path).increment(1);
}
