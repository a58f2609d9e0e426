use std::future::Future;
use std::time;

use tracing::{debug, info};

use interaction_common::diagnostics::{DiagnosticSink, IngestFailure};
use interaction_common::metrics;
use interaction_common::normalize::Normalizer;
use interaction_common::sink::InteractionSink;

use crate::error::StreamError;
use crate::feed::{decode_payload, FeedPoll, InteractionFeed};

pub const PATH: &str = "stream";

/// Consumes the interaction feed one message at a time, storing every valid interaction as
/// soon as it has been normalized.
pub struct StreamWorker<'a, F, S, D> {
    /// The feed we poll for messages.
    feed: F,
    /// Where valid interactions are written, one committed row per message.
    sink: &'a mut S,
    /// Receives the outcome of every message.
    diagnostics: &'a D,
    normalizer: Normalizer<'a>,
    /// How long a single poll may wait for a message.
    poll_timeout: time::Duration,
}

impl<'a, F, S, D> StreamWorker<'a, F, S, D>
where
    F: InteractionFeed,
    S: InteractionSink,
    D: DiagnosticSink,
{
    pub fn new(
        feed: F,
        sink: &'a mut S,
        diagnostics: &'a D,
        normalizer: Normalizer<'a>,
        poll_timeout: time::Duration,
    ) -> Self {
        Self {
            feed,
            sink,
            diagnostics,
            normalizer,
            poll_timeout,
        }
    }

    /// Process messages until `shutdown` resolves or the feed closes.
    ///
    /// Shutdown is only observed between messages: a message that was received is always
    /// fully handled first. Returns an error only when the destination connection is lost.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<(), StreamError> {
        tokio::pin!(shutdown);

        loop {
            let polled = tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested, stopping stream worker");
                    return Ok(());
                }
                polled = self.feed.poll(self.poll_timeout) => polled,
            };

            match polled {
                FeedPoll::Idle => {
                    metrics::record_feed_empty(PATH);
                }
                FeedPoll::Closed => {
                    info!("interaction feed closed, stopping stream worker");
                    return Ok(());
                }
                FeedPoll::Error(e) => {
                    self.diagnostics.record_failure("", &IngestFailure::Feed(e));
                }
                FeedPoll::Message(None) => {
                    debug!("skipping message without payload");
                }
                FeedPoll::Message(Some(payload)) => {
                    self.process_message(&payload).await?;
                }
            }
        }
    }

    async fn process_message(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        let record = match decode_payload(payload) {
            Ok(record) => record,
            Err(e) => {
                self.diagnostics
                    .record_failure(&String::from_utf8_lossy(payload), &e.into());
                return Ok(());
            }
        };

        let interaction = match self.normalizer.normalize(&record) {
            Ok(interaction) => interaction,
            Err(e) => {
                self.diagnostics
                    .record_failure(&record.to_log_string(), &e.into());
                return Ok(());
            }
        };

        match self.sink.insert_one(&interaction).await {
            Ok(()) => {
                metrics::record_persisted(PATH, interaction.kind, 1);
                self.diagnostics.record_success(&interaction);
                Ok(())
            }
            Err(e) => {
                let fatal = e.is_fatal();
                let failure = IngestFailure::Persistence(e);
                self.diagnostics
                    .record_failure(&record.to_log_string(), &failure);

                // The event is dropped either way, we never retry a write.
                match failure {
                    IngestFailure::Persistence(e) if fatal => Err(StreamError::ConnectionLost(e)),
                    _ => Ok(()),
                }
            }
        }
    }
}
