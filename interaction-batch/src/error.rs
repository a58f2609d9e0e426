use thiserror::Error;

/// Enumeration of errors raised while turning archived exports into raw records.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("export {key} is not valid CSV: {error}")]
    Csv { key: String, error: csv::Error },
    #[error("export {key} has no header row")]
    MissingHeader { key: String },
    #[error("invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
