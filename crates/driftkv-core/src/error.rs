//! Error types for DriftKV operations
//!
//! Errors only cross the public boundary at open time, from an explicit
//! `flush()`, or from `close()`. The steady-state set/delete/wipe path reports
//! failures through the optional error callback instead.

use std::path::PathBuf;

use thiserror::Error;

/// DriftKV error types with file context
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O operation failed
    #[error("I/O error{}: {message} ({kind})", display_path(.path))]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// A record carried a type token outside {String, Int, Float, Bool}
    #[error("unknown type tag {tag:?} in {} at line {line}", .path.display())]
    UnknownTypeTag {
        /// File being loaded
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// The token that was found
        tag: String,
    },

    /// A string value could not be decoded back to UTF-8 text
    #[error("cannot decode value in {} at line {line}: {message}", .path.display())]
    Decode {
        /// File being loaded
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Description of the decode failure
        message: String,
    },

    /// Configuration rejected by `Config::validate`
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background worker stopped after an I/O failure
    #[error("flush worker stopped: {0}")]
    WorkerFailed(String),
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

impl StoreError {
    /// Wrap an `std::io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error, context: &str) -> Self {
        StoreError::Io {
            path: Some(path.into()),
            kind: err.kind(),
            message: format!("{}: {}", context, err),
        }
    }
}

/// Convert std::io::Error to StoreError::Io
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for DriftKV operations
pub type StoreResult<T> = Result<T, StoreError>;
