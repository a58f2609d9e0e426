use serde_json::Value;

use interaction_common::types::RawInteractionRecord;

use crate::error::SourceError;

/// Read one CSV export into raw records.
///
/// Columns are matched by header name, so their order doesn't matter. Unknown columns are
/// ignored and columns missing from the file, or from a short row, leave the field absent.
pub fn read_records(key: &str, contents: &[u8]) -> Result<Vec<RawInteractionRecord>, SourceError> {
    let csv_error = |error: csv::Error| SourceError::Csv {
        key: key.to_owned(),
        error,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(contents);

    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.is_empty() {
        return Err(SourceError::MissingHeader {
            key: key.to_owned(),
        });
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;

        let mut record = RawInteractionRecord::default();
        for (column, field) in headers.iter().zip(row.iter()) {
            record.set_column(column.trim(), Value::String(field.to_owned()));
        }
        records.push(record);
    }

    Ok(records)
}

/// Concatenate the records of several exports, in the order the exports are given.
pub fn merge_records<K, C>(exports: &[(K, C)]) -> Result<Vec<RawInteractionRecord>, SourceError>
where
    K: AsRef<str>,
    C: AsRef<[u8]>,
{
    let mut records = Vec::new();
    for (key, contents) in exports {
        records.extend(read_records(key.as_ref(), contents.as_ref())?);
    }
    Ok(records)
}
