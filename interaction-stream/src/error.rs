use interaction_common::error::SinkError;
use rdkafka::error::KafkaError;
use thiserror::Error;

/// Enumeration of errors that stop the streaming worker.
/// Per-message failures never show up here: they are reported as diagnostics and skipped.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("failed to subscribe to the interaction feed: {0}")]
    Subscribe(#[from] KafkaError),
    #[error("the destination connection can no longer be used: {0}")]
    ConnectionLost(#[from] SinkError),
}
