//! Error types shared across the indexing and retrieval pipeline.
//!
//! The taxonomy distinguishes failures by recovery policy:
//!
//! - I/O and extraction problems on individual files are handled at the
//!   call site (skip + warn) and never abort a whole indexing run.
//! - [`IndexError::EmbedUnavailable`] is retried with backoff by the
//!   embedder; if retries are exhausted it aborts the current batch.
//! - Store failures roll back the enclosing transaction and propagate.
//! - [`IndexError::Cancelled`] unwinds immediately; per-file transactions
//!   that already committed stay on disk.

use std::path::PathBuf;

/// Errors produced by the codescout core.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedding provider unavailable: {reason}")]
    EmbedUnavailable { reason: String },

    #[error("embedding failed for input {index}: {source}")]
    EmbedBatch {
        index: usize,
        #[source]
        source: Box<IndexError>,
    },

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("caller index lock timed out after {waited_ms} ms")]
    LockTimeout { waited_ms: u64 },

    #[error("caller index snapshot error: {0}")]
    Snapshot(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid path filter: {0}")]
    InvalidPathFilter(#[from] globset::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    Other(String),
}

impl IndexError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when retrying the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbedUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
