use std::fmt;

use tracing::{error, info, warn};

use crate::error::{FailureKind, NormalizeError, SinkError};
use crate::metrics;
use crate::types::NormalizedInteraction;

/// Why a single event did not make it into the destination tables.
#[derive(Debug)]
pub enum IngestFailure {
    /// The record was rejected by the normalizer.
    Normalize(NormalizeError),
    /// The record was valid but writing it failed.
    Persistence(SinkError),
    /// The feed reported an error instead of delivering a message.
    Feed(String),
}

impl IngestFailure {
    /// Taxonomy tag, if the failure belongs to a record. Feed errors don't.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            IngestFailure::Normalize(e) => Some(e.kind()),
            IngestFailure::Persistence(e) => Some(e.kind()),
            IngestFailure::Feed(_) => None,
        }
    }

    pub fn reason(&self) -> &'static str {
        self.kind().map_or("feed_error", |kind| kind.as_str())
    }
}

impl fmt::Display for IngestFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IngestFailure::Normalize(e) => write!(f, "{e}"),
            IngestFailure::Persistence(e) => write!(f, "{e}"),
            IngestFailure::Feed(e) => write!(f, "feed error: {e}"),
        }
    }
}

impl From<NormalizeError> for IngestFailure {
    fn from(error: NormalizeError) -> Self {
        IngestFailure::Normalize(error)
    }
}

impl From<SinkError> for IngestFailure {
    fn from(error: SinkError) -> Self {
        IngestFailure::Persistence(error)
    }
}

/// Receives the outcome of every event an ingestion loop handles.
pub trait DiagnosticSink {
    fn record_success(&self, interaction: &NormalizedInteraction);

    /// `raw` is the record as received, rendered for humans. Empty when there was none.
    fn record_failure(&self, raw: &str, failure: &IngestFailure);
}

/// Reports outcomes as tracing events and metrics counters labelled with the ingestion path.
#[derive(Debug, Clone, Copy)]
pub struct TracingDiagnostics {
    path: &'static str,
}

impl TracingDiagnostics {
    pub fn new(path: &'static str) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

impl DiagnosticSink for TracingDiagnostics {
    fn record_success(&self, interaction: &NormalizedInteraction) {
        info!(
            path = self.path,
            kind = %interaction.kind,
            event_at = %interaction.event_at,
            exhibition_id = interaction.exhibition_id,
            value_id = interaction.value_id,
            "interaction accepted"
        );
        metrics::record_normalized(self.path, interaction.kind);
    }

    fn record_failure(&self, raw: &str, failure: &IngestFailure) {
        match failure {
            IngestFailure::Normalize(e) => {
                warn!(path = self.path, reason = %e.kind(), record = raw, "interaction rejected: {e}");
                metrics::record_rejected(self.path, e.kind());
            }
            IngestFailure::Persistence(e) => {
                error!(path = self.path, reason = %e.kind(), record = raw, "interaction not stored: {e}");
                metrics::record_rejected(self.path, e.kind());
            }
            IngestFailure::Feed(e) => {
                error!(path = self.path, "error polling the feed: {e}");
                metrics::record_feed_error(self.path);
            }
        }
    }
}
