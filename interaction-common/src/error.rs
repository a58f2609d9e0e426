use std::fmt;

use chrono::NaiveTime;
use thiserror::Error;

/// Tag shared by every failure an ingestion session can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    MissingField,
    InvalidType,
    ParseError,
    Unrecognized,
    OutOfWindow,
    PersistenceError,
    ReferenceUnavailable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingField => "missing_field",
            FailureKind::InvalidType => "invalid_type",
            FailureKind::ParseError => "parse_error",
            FailureKind::Unrecognized => "unrecognized",
            FailureKind::OutOfWindow => "out_of_window",
            FailureKind::PersistenceError => "persistence_error",
            FailureKind::ReferenceUnavailable => "reference_unavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Enumeration of reasons a raw record can be rejected during normalization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("required field '{field}' is missing")]
    MissingField { field: &'static str },
    #[error("field '{field}' has illegal type {found}")]
    InvalidType {
        field: &'static str,
        found: &'static str,
    },
    #[error("field '{field}' could not be parsed from {value:?}")]
    ParseError { field: &'static str, value: String },
    #[error("{value} is not a recognised value for field '{field}'")]
    Unrecognized { field: &'static str, value: i64 },
    #[error("event time {time} is outside the allowed window {start} - {end}")]
    OutOfWindow {
        time: NaiveTime,
        start: NaiveTime,
        end: NaiveTime,
    },
}

impl NormalizeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            NormalizeError::MissingField { .. } => FailureKind::MissingField,
            NormalizeError::InvalidType { .. } => FailureKind::InvalidType,
            NormalizeError::ParseError { .. } => FailureKind::ParseError,
            NormalizeError::Unrecognized { .. } => FailureKind::Unrecognized,
            NormalizeError::OutOfWindow { .. } => FailureKind::OutOfWindow,
        }
    }
}

/// Enumeration of errors raised while writing to the destination tables.
/// Errors originate from sqlx and are wrapped to tell apart a failed statement
/// from a connection that can no longer be used.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("{command} into {table} failed with: {error}")]
    Persistence {
        command: &'static str,
        table: &'static str,
        error: sqlx::Error,
    },
    #[error("destination connection lost during {command}: {error}")]
    ConnectionLost {
        command: &'static str,
        error: sqlx::Error,
    },
}

impl SinkError {
    /// Wrap a sqlx error, classifying transport-level failures as a lost connection.
    pub fn from_sqlx(command: &'static str, table: &'static str, error: sqlx::Error) -> Self {
        if is_connection_fault(&error) {
            SinkError::ConnectionLost { command, error }
        } else {
            SinkError::Persistence {
                command,
                table,
                error,
            }
        }
    }

    /// A fatal error means the connection is unusable and no later write can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SinkError::ConnectionLost { .. })
    }

    pub fn kind(&self) -> FailureKind {
        FailureKind::PersistenceError
    }
}

fn is_connection_fault(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed
    )
}

/// Enumeration of reasons the reference data could not be loaded at session start.
/// All of them abort the session before any record is processed.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("connection to the reference database failed with: {error}")]
    Connection { error: sqlx::Error },
    #[error("{query} query failed with: {error}")]
    Query {
        query: &'static str,
        error: sqlx::Error,
    },
    #[error("museum '{0}' does not exist in the reference database")]
    UnknownMuseum(String),
    #[error("exhibition public id '{0}' does not end in a number")]
    MalformedPublicId(String),
}

impl LookupError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ReferenceUnavailable
    }
}

/// Enumeration of session configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no time window configured for museum '{0}', set WINDOW_START and WINDOW_END")]
    MissingWindow(String),
    #[error("only one of WINDOW_START and WINDOW_END is set")]
    PartialWindow,
}
