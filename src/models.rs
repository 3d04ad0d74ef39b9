//! Core data types used throughout codescout.
//!
//! The data lifecycle is:
//!
//! ```text
//! Scanner → FileDescriptor → Extractor → Chunk → embed() → Store
//!                                                   ↓
//!                                             search() → SearchResult
//!                                                   ↓
//!                                       usage graph → SearchResponse
//! ```
//!
//! - A **[`FileDescriptor`]** is produced by the scanner for every
//!   indexable file, carrying a SHA-256 content hash that drives
//!   incremental decisions.
//! - A **[`Chunk`]** is the atomic retrieval unit: a function, method,
//!   class, block, or whole file, together with the symbol references
//!   observed in its body.
//! - A **[`SearchResult`]** is one ranked hit, optionally enriched with
//!   [`UsageInfo`] (callers, callees, unused/untested flags).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

/// Kind of code chunk extracted from a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Method,
    Class,
    Block,
    File,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Method => "method",
            ChunkKind::Class => "class",
            ChunkKind::Block => "block",
            ChunkKind::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(ChunkKind::Function),
            "method" => Some(ChunkKind::Method),
            "class" => Some(ChunkKind::Class),
            "block" => Some(ChunkKind::Block),
            "file" => Some(ChunkKind::File),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file discovered by the scanner, ready for indexing.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Absolute path: the key used everywhere in the store.
    pub path: String,
    /// Path relative to the scanned project root.
    pub relative_path: String,
    /// File size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the full file content.
    pub hash: String,
    /// Detected language tag (`"rust"`, `"python"`, … or `"text"`).
    pub language: String,
}

/// A parsed code segment: the atomic unit of retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Stable identifier: `{sha256(absolute_path)[..16]}:{ordinal}`.
    pub id: String,
    /// Absolute path of the defining file.
    pub file_path: String,
    pub kind: ChunkKind,
    /// Symbol name; qualified as `Parent.name` for methods. Empty only
    /// for `block` and `file` chunks.
    pub name: String,
    pub language: String,
    /// 1-based inclusive line range.
    pub start_line: usize,
    pub end_line: usize,
    /// Raw source text of the chunk.
    pub content: String,
    /// Callee names observed in the body (dotted form for member calls).
    pub calls: Vec<String>,
    /// Type names observed in type positions.
    pub references: Vec<String>,
    pub is_exported: bool,
    pub is_test: bool,
    /// Enclosing class-like symbol for methods; empty otherwise.
    pub parent: String,
}

impl Chunk {
    /// Text handed to the embedding model: a language/kind/name prefix
    /// gives the model context the raw body alone lacks.
    pub fn embedding_text(&self) -> String {
        if self.name.is_empty() {
            format!("{} {}:\n{}", self.language, self.kind, self.content)
        } else {
            format!(
                "{} {}: {}\n{}",
                self.language, self.kind, self.name, self.content
            )
        }
    }
}

/// Deterministic chunk id from the absolute path and the chunk ordinal.
pub fn chunk_id(absolute_path: &str, ordinal: usize) -> String {
    let normalized = absolute_path.replace('\\', "/");
    let digest = Sha256::digest(normalized.as_bytes());
    let mut hex = String::with_capacity(32);
    for b in &digest[..16] {
        hex.push_str(&format!("{:02x}", b));
    }
    format!("{}:{}", hex, ordinal)
}

/// Hex-encoded SHA-256 of arbitrary content.
pub fn content_hash(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Optional filters for [`search`](crate::store::Store::search).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Restrict to a subdirectory or glob (`src/**/*.rs`).
    pub path: Option<String>,
    /// Language filter, case-insensitive.
    pub language: Option<String>,
    /// Chunk kind filter; `None` or `"all"` matches everything.
    pub kind: Option<String>,
    /// Exclude config/docs languages (JSON, YAML, Markdown, …).
    pub code_only: bool,
    /// Minimum similarity in `[0, 1]`.
    pub min_similarity: f32,
    /// Maximum results, clamped to `[1, 50]` by callers.
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            path: None,
            language: None,
            kind: None,
            code_only: true,
            min_similarity: 0.0,
            limit: 5,
        }
    }
}

/// Languages that are configuration or documentation rather than code.
pub fn is_non_code_language(language: &str) -> bool {
    matches!(
        language,
        "json" | "yaml" | "toml" | "markdown" | "xml" | "html" | "css" | "dockerfile" | "text"
    )
}

/// A single ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Path relative to the caller's working directory (`./src/lib.rs`).
    pub file_path: String,
    pub absolute_path: String,
    pub chunk_type: String,
    pub name: String,
    /// `"start-end"` line range.
    pub lines: String,
    pub content: String,
    pub similarity: f32,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
}

/// How a symbol is used across the index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageInfo {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub called_by: Vec<CallerInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Chunks whose type references name this symbol. Populated for
    /// class-kind results (structs, interfaces, traits).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub referenced_by: Vec<CallerInfo>,
    pub is_exported: bool,
    pub is_test: bool,
    /// Exported but never called or referenced anywhere in the index.
    pub is_unused: bool,
    /// Exported, not itself a test, and never called from a test.
    pub not_tested: bool,
}

/// A callee, resolved against the index when possible.
#[derive(Debug, Clone, Serialize)]
pub struct CallInfo {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file_path: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub line: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    /// Not found in the index (external or stdlib).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_external: bool,
}

/// A chunk whose `calls` list names a given symbol.
#[derive(Debug, Clone, Serialize)]
pub struct CallerInfo {
    pub name: String,
    pub file_path: String,
    pub line: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    pub is_test: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parent: String,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Full search response: ranked results plus the usage graph.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub count: usize,
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<UsageGraph>,
}

/// Call graph spanning the result set, its callees, and its callers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    /// Symbol name.
    pub id: String,
    /// `function`, `method`, or `class`.
    #[serde(rename = "type")]
    pub kind: String,
    pub file_path: String,
    pub is_exported: bool,
    pub is_test: bool,
    pub is_unused: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub count: usize,
}

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexSummary {
    pub project: String,
    pub files_indexed: usize,
    pub chunks_stored: usize,
    /// Files left untouched because their hash was unchanged.
    pub skipped: usize,
    /// Files removed from the index because they vanished from disk.
    pub deleted: usize,
    pub time_taken_ms: u128,
}

/// Pre-index statistics for a root, reported by `cscout status`.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub total_files: usize,
    pub total_size: u64,
    pub new_files: usize,
    pub modified_files: usize,
    pub unchanged_files: usize,
    pub by_language: HashMap<String, usize>,
}

/// Compute a `./`-prefixed forward-slash path relative to `cwd`.
///
/// Returns `None` when the path cannot be expressed under `cwd` without
/// escaping it (`../`), which callers use to drop out-of-tree results.
pub fn relative_to(cwd: &Path, absolute: &str) -> Option<String> {
    let stripped = Path::new(absolute).strip_prefix(cwd).ok()?;
    Some(format!(
        "./{}",
        stripped.to_string_lossy().replace('\\', "/")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_stable() {
        let a = chunk_id("/home/u/project/src/lib.rs", 0);
        let b = chunk_id("/home/u/project/src/lib.rs", 0);
        assert_eq!(a, b);
        assert!(a.ends_with(":0"));
    }

    #[test]
    fn test_chunk_id_ordinal_varies() {
        let a = chunk_id("/p/a.rs", 0);
        let b = chunk_id("/p/a.rs", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_chunk_id_path_separators_normalized() {
        let unix = chunk_id("/p/a.rs", 2);
        let win = chunk_id("\\p\\a.rs", 2);
        assert_eq!(unix, win);
    }

    #[test]
    fn test_embedding_text_named() {
        let chunk = Chunk {
            id: "x:0".into(),
            file_path: "/p/a.rs".into(),
            kind: ChunkKind::Function,
            name: "greet".into(),
            language: "rust".into(),
            start_line: 1,
            end_line: 3,
            content: "fn greet() {}".into(),
            calls: vec![],
            references: vec![],
            is_exported: true,
            is_test: false,
            parent: String::new(),
        };
        assert_eq!(
            chunk.embedding_text(),
            "rust function: greet\nfn greet() {}"
        );
    }

    #[test]
    fn test_embedding_text_unnamed() {
        let chunk = Chunk {
            id: "x:0".into(),
            file_path: "/p/a.txt".into(),
            kind: ChunkKind::Block,
            name: String::new(),
            language: "text".into(),
            start_line: 1,
            end_line: 1,
            content: "hello".into(),
            calls: vec![],
            references: vec![],
            is_exported: false,
            is_test: false,
            parent: String::new(),
        };
        assert_eq!(chunk.embedding_text(), "text block:\nhello");
    }

    #[test]
    fn test_relative_to_inside() {
        let rel = relative_to(Path::new("/home/u/proj"), "/home/u/proj/src/a.rs");
        assert_eq!(rel.as_deref(), Some("./src/a.rs"));
    }

    #[test]
    fn test_relative_to_outside() {
        assert!(relative_to(Path::new("/home/u/proj"), "/tmp/other.rs").is_none());
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            ChunkKind::Function,
            ChunkKind::Method,
            ChunkKind::Class,
            ChunkKind::Block,
            ChunkKind::File,
        ] {
            assert_eq!(ChunkKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ChunkKind::parse("module"), None);
    }
}
