use interaction_common::diagnostics::DiagnosticSink;
use interaction_common::normalize::Normalizer;
use interaction_common::types::{RawInteractionRecord, UploadBatch};

pub const PATH: &str = "batch";

/// An upload batch and the number of records rejected while building it.
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub batch: UploadBatch,
    /// Records that were normalized and failed. Records left over by a limit are not counted.
    pub rejected: usize,
}

/// Normalize `records` in order into an upload batch.
///
/// Rejected records are reported and skipped. With a `limit`, stops as soon as that many records
/// were accepted. Nothing is written anywhere.
pub fn prepare_upload_batch<D: DiagnosticSink>(
    records: &[RawInteractionRecord],
    normalizer: &Normalizer,
    diagnostics: &D,
    limit: Option<usize>,
) -> PreparedBatch {
    let mut batch = UploadBatch::new();
    let mut rejected = 0;

    for record in records {
        if limit.is_some_and(|limit| batch.len() >= limit) {
            break;
        }

        match normalizer.normalize(record) {
            Ok(interaction) => {
                diagnostics.record_success(&interaction);
                batch.push(interaction);
            }
            Err(e) => {
                rejected += 1;
                diagnostics.record_failure(&record.to_log_string(), &e.into());
            }
        }
    }

    PreparedBatch { batch, rejected }
}
