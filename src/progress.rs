//! Indexing progress reporting.
//!
//! The indexer emits typed [`ProgressEvent`]s across every long-running
//! operation so consumers (the CLI, an agent frontend) can show what is
//! being scanned, how much is left, and when the index is up to date.
//! Events go to a [`ProgressSink`]; the default sink writes human lines
//! on **stderr** so stdout stays parseable.

use serde::Serialize;

/// Kind of a progress event, mirrored in the JSON `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Scanning,
    ScanComplete,
    Embedding,
    FileUpdate,
    FileUpdateComplete,
    FileUpdateError,
    FileDeleted,
    FolderDeleted,
    Complete,
    Error,
}

/// A single progress update emitted during indexing.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    /// Project name (basename of the root).
    pub project: String,
    /// Human-readable message.
    pub message: String,
    pub current: usize,
    pub total: usize,
    pub percent: f64,
    /// File being processed, relative to the project root.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, project: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            project: project.into(),
            message: message.into(),
            current: 0,
            total: 0,
            percent: 0.0,
            file: String::new(),
            error: String::new(),
        }
    }

    pub fn with_counts(mut self, current: usize, total: usize) -> Self {
        self.current = current;
        self.total = total;
        if total > 0 {
            self.percent = current as f64 / total as f64 * 100.0;
        }
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }
}

/// Receives progress events from the indexer. Implementations must be
/// cheap and non-blocking; indexing continues regardless of what a sink
/// does with the event.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress lines on stderr.
pub struct StderrSink;

impl ProgressSink for StderrSink {
    fn report(&self, event: ProgressEvent) {
        match event.kind {
            ProgressKind::Embedding => {
                eprintln!(
                    "[{}] {} ({}/{}, {:.0}%)",
                    event.project, event.message, event.current, event.total, event.percent
                );
            }
            ProgressKind::Error | ProgressKind::FileUpdateError => {
                eprintln!("[{}] {}: {}", event.project, event.message, event.error);
            }
            _ => {
                eprintln!("[{}] {}", event.project, event.message);
            }
        }
    }
}

/// Discards every event. Used by tests and embedded callers.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _event: ProgressEvent) {}
}
