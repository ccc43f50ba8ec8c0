//! Error types for the tablesync engine.

use crate::{RecordId, TableName};
use thiserror::Error;

/// All possible errors from the engine and its adapters.
///
/// Errors are `Clone` because an [`Action`](crate::Action) both stores the
/// failure in its state and hands it back to the caller that triggered it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    // Lookup errors
    #[error("record not found: {table}/{id}")]
    NotFound { table: TableName, id: RecordId },

    #[error("record already exists: {table}/{id}")]
    AlreadyExists { table: TableName, id: RecordId },

    // Validation errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("field is not writable: {0}")]
    ReadOnlyField(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    // Adapter errors
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error (status {status}): {body}")]
    Remote {
        status: u16,
        body: serde_json::Value,
    },

    // Usage errors
    #[error("misuse: {0}")]
    Misuse(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation referenced an id that does not exist.
    NotFound,
    /// The adapter rejected the data or the query.
    Validation,
    /// Network or storage I/O failed.
    Transport,
    /// The API was used outside its required scope.
    Misuse,
}

impl ErrorKind {
    /// Stable name used in wire error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Misuse => "misuse",
        }
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::AlreadyExists { .. }
            | Error::InvalidPayload(_)
            | Error::MissingRequiredField(_)
            | Error::ReadOnlyField(_)
            | Error::UnknownField(_)
            | Error::TypeMismatch { .. }
            | Error::InvalidQuery(_) => ErrorKind::Validation,
            Error::Remote { status, .. } if (400..500).contains(status) => ErrorKind::Validation,
            Error::Remote { .. } | Error::Transport(_) => ErrorKind::Transport,
            Error::Misuse(_) => ErrorKind::Misuse,
        }
    }

    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(table: impl Into<TableName>, id: impl Into<RecordId>) -> Self {
        Error::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
