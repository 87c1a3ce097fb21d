//! Error types for the ormbulk execution engine.
//!
//! All public APIs return `BulkResult<T>` — no panics in library code.

use std::fmt;

use thiserror::Error;

/// Vendor-neutral classification of a driver-level SQL failure.
///
/// Sessions report failures in these terms so callers never have to match on
/// driver-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorCategory {
    /// PK/FK/unique/check violation
    ConstraintViolation,
    /// Statement rejected by the server's parser
    SyntaxError,
    /// Connection lost or unusable
    ConnectionFailure,
    /// Lock wait timed out or deadlock victim
    LockTimeout,
    /// Bad data (truncation, overflow, conversion)
    Data,
    /// Anything the driver could not classify
    Other,
}

impl fmt::Display for SqlErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConstraintViolation => "constraint violation",
            Self::SyntaxError => "syntax error",
            Self::ConnectionFailure => "connection failure",
            Self::LockTimeout => "lock timeout",
            Self::Data => "data error",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Raw failure reported by a [`SqlSession`](crate::session::SqlSession), before
/// the offending SQL text is attached by the executor layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
    pub category: SqlErrorCategory,
}

impl DriverError {
    pub fn new(message: impl Into<String>, category: SqlErrorCategory) -> Self {
        Self {
            message: message.into(),
            category,
        }
    }
}

/// Unified error type for all ormbulk operations.
#[derive(Debug, Error)]
pub enum BulkError {
    /// Programming/mapping inconsistency — never retried
    #[error("assertion failure: {0}")]
    AssertionFailure(String),

    /// Invalid entity topology or metadata construction
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Statement parsing error
    #[error("SQL parse error: {message}\nSQL: {sql}")]
    SqlParse { message: String, sql: String },

    /// Unsupported statement shape or SQL feature
    #[error("SQL feature not supported: {feature}\nHint: {hint}")]
    SqlNotSupported { feature: String, hint: String },

    /// Physical statement failed at the driver, wrapped with the offending SQL
    #[error("SQL execution error ({category}): {message}\nSQL: {sql}")]
    SqlExecution {
        message: String,
        sql: String,
        category: SqlErrorCategory,
    },

    /// Positional parameter index past the supplied parameter list
    #[error("positional parameter {index} out of range: {available} parameter(s) supplied")]
    ParameterCount { index: usize, available: usize },

    /// Dialect profile deserialization error
    #[error("dialect profile error: {0}")]
    DialectProfile(String),
}

impl BulkError {
    /// Wrap a driver failure with the SQL statement that produced it.
    pub fn from_driver(err: DriverError, sql: &str) -> Self {
        BulkError::SqlExecution {
            message: err.message,
            sql: sql.to_string(),
            category: err.category,
        }
    }
}

/// Result type alias for all ormbulk operations.
pub type BulkResult<T> = Result<T, BulkError>;

impl From<serde_json::Error> for BulkError {
    fn from(err: serde_json::Error) -> Self {
        BulkError::DialectProfile(err.to_string())
    }
}
