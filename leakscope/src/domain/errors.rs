//! Structured error types for leakscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::fmt;

use leakscope_common::TaskId;
use thiserror::Error;

use crate::report::LeakReport;

/// The dump byte stream itself failed. Fatal for the current attempt.
#[derive(Error, Debug)]
#[error("failed to read task dump: {0}")]
pub struct ScanError(#[from] pub std::io::Error);

/// A single malformed stack. Isolated: the parser records it and moves on to
/// the next header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackParseError {
    #[error("parse header: unexpected format: {line:?}")]
    MalformedHeader { line: String },

    #[error("parse header: bad goroutine ID {id:?} in line {line:?}")]
    BadTaskId { id: String, line: String },

    #[error("parse header: missing state in line {line:?}")]
    MissingState { line: String },

    #[error("parse function in goroutine {task}: no function found: {line:?}")]
    NoFunction { task: TaskId, line: String },
}

/// Every per-stack failure of one parse, joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseErrors(pub Vec<StackParseError>);

impl ParseErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

/// Unsupported option combination, reported before any sampling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cleanup can only be passed to verify_none or verify_test_main")]
    CleanupNotSupported,

    #[error("invalid function pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The dump of the calling task could not be made sense of. A well-formed
    /// runtime never produces this, so it points at a bug in the parser or
    /// the dump source rather than at the code under test.
    #[error("internal inconsistency: {0}")]
    Inconsistent(String),

    #[error("{0}")]
    Leak(Box<LeakReport>),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write report file {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DetectError {
    /// Returns the report if this error is a detected leak.
    pub fn leak_report(&self) -> Option<&LeakReport> {
        match self {
            DetectError::Leak(report) => Some(report),
            _ => None,
        }
    }
}
