use anyhow::Context;
use regex::Regex;
use tracing::{info, warn};

use interaction_common::diagnostics::{DiagnosticSink, TracingDiagnostics};
use interaction_common::error::SinkError;
use interaction_common::lookup::ReferenceLookup;
use interaction_common::metrics;
use interaction_common::normalize::Normalizer;
use interaction_common::sink::{InteractionSink, PgSink};
use interaction_common::types::{InteractionKind, RawInteractionRecord, UploadBatch};

use crate::batch::{prepare_upload_batch, PreparedBatch, PATH};
use crate::config::{Config, SourceKind};
use crate::parse::merge_records;
use crate::source::{filter_keys, folder::FolderSource, key_pattern, s3::S3Source, DataSource};

pub mod batch;
pub mod config;
pub mod error;
pub mod parse;
pub mod source;

/// Fetch every export whose key matches `pattern` and merge them into one list of records.
pub async fn load_records(
    source: &dyn DataSource,
    pattern: &Regex,
) -> anyhow::Result<Vec<RawInteractionRecord>> {
    let keys = filter_keys(source.keys().await?, pattern);
    info!(exports = keys.len(), "found exports to ingest");

    let mut exports = Vec::with_capacity(keys.len());
    for key in keys {
        let contents = source
            .get(&key)
            .await
            .with_context(|| format!("failed to fetch export {key}"))?;
        exports.push((key, contents));
    }

    Ok(merge_records(exports.as_slice())?)
}

/// Normalize `records` and write all accepted ones in a single transaction.
pub async fn ingest_records<S, D>(
    records: &[RawInteractionRecord],
    normalizer: &Normalizer<'_>,
    diagnostics: &D,
    limit: Option<usize>,
    sink: &mut S,
) -> Result<UploadBatch, SinkError>
where
    S: InteractionSink,
    D: DiagnosticSink,
{
    let PreparedBatch { batch, rejected } =
        prepare_upload_batch(records, normalizer, diagnostics, limit);
    info!(
        ratings = batch.ratings.len(),
        requests = batch.requests.len(),
        rejected,
        "prepared upload batch"
    );

    sink.insert_batch(&batch).await?;

    metrics::record_persisted(PATH, InteractionKind::Rating, batch.ratings.len() as u64);
    metrics::record_persisted(PATH, InteractionKind::Request, batch.requests.len() as u64);

    Ok(batch)
}

/// Run one batch ingestion session over the archived exports.
///
/// The destination connection is closed however the session ends, once it has been opened.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let museum = config.session.museum().to_owned();
    let window = config.session.window()?;
    let pattern = key_pattern(&config.key_pattern)?;
    info!(%museum, %window, "starting batch ingestion");

    let source: Box<dyn DataSource> = match config.source_kind {
        SourceKind::S3 => Box::new(S3Source::from_config(&config).await?),
        SourceKind::Folder => Box::new(
            FolderSource::new(&config.data_folder)
                .await
                .with_context(|| format!("failed to open data folder {}", config.data_folder))?,
        ),
    };

    let conn = config.session.connect().await?;
    let mut sink = PgSink::new(conn);

    let result = async {
        let lookup = ReferenceLookup::load(sink.connection(), &museum).await?;
        let records = load_records(source.as_ref(), &pattern).await?;
        info!(records = records.len(), "merged exports");

        let diagnostics = TracingDiagnostics::new(PATH);
        let normalizer = Normalizer::new(&lookup, window);
        let batch = ingest_records(
            &records,
            &normalizer,
            &diagnostics,
            config.max_rows,
            &mut sink,
        )
        .await?;
        info!(stored = batch.len(), "uploaded all exports");

        Ok::<(), anyhow::Error>(())
    }
    .await;

    match sink.close().await {
        Ok(()) => info!("closed destination connection"),
        Err(e) => warn!("failed to close destination connection: {e}"),
    }

    result
}
