// error.rs — Error types for the audit log.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or reading the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the audit log file.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read audit log at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append audit record to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A line of the log is not a valid record.
    #[error("line {line} is not a valid audit record: {source}")]
    MalformedLine {
        line: usize,
        source: serde_json::Error,
    },

    /// The hash chain is broken; the log has been edited.
    #[error("integrity check failed at line {line}: expected hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },

    /// A record contradicts itself, e.g. an Allow that names no ticket.
    #[error("inconsistent audit record at line {line}: {reason}")]
    InconsistentRecord { line: usize, reason: String },
}
