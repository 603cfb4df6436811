//! Error types for the audit crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening or writing an audit sink.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit file's directory could not be created.
    #[error("cannot prepare audit log {}: {source}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A sink is in an unusable state (e.g. a poisoned lock).
    #[error("storage error: {0}")]
    StorageError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
