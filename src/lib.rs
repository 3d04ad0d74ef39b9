//! # codescout
//!
//! **Semantic code search with live indexing and usage-graph analysis.**
//!
//! codescout indexes source trees into a persistent on-disk semantic
//! index and answers natural-language code-search queries enriched with
//! a code-usage graph (callers, callees, reference relations). The index
//! stays incrementally consistent with the filesystem under live
//! editing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌──────────┐   ┌──────────────┐
//! │ Scanner │──▶│ Extractor │──▶│ Embedder │──▶│    Store     │
//! │ ignore  │   │ tree-sit. │   │  Ollama  │   │ SQLite + vec │
//! └─────────┘   └───────────┘   └──────────┘   └──────┬───────┘
//!      ▲                                              │
//! ┌────┴────┐   ┌───────────┐                  ┌──────▼───────┐
//! │ Watcher │──▶│  Indexer  │                  │  Retrieval   │
//! │ notify  │   │ increment │◀─────────────────│ usage graph  │
//! └─────────┘   └───────────┘                  └──────────────┘
//! ```
//!
//! ## Data flow
//!
//! - **Index path**: the [`scanner`] walks a root honoring nested ignore
//!   files and produces hashed file descriptors; the [`extractor`]
//!   parses each file into [`models::Chunk`]s with symbol references;
//!   the [`store`] embeds and persists them (and feeds the
//!   [`caller_index`]).
//! - **Query path**: the query is embedded, k-NN over stored vectors
//!   produces candidates, metadata filters and a name boost rank them,
//!   and the [`retrieval`] service attaches callers, callees, and
//!   unused/untested flags plus a combined usage graph.
//! - **Live path**: the [`watcher`] debounces filesystem events into
//!   per-file [`indexer`] operations, so edits, deletions, and new
//!   files are reflected without a full re-scan.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with env overrides |
//! | [`models`] | Core data types: `FileDescriptor`, `Chunk`, search/usage types |
//! | [`error`] | Error taxonomy ([`error::IndexError`]) |
//! | [`progress`] | Typed progress event stream |
//! | [`scanner`] | Tree walk, ignore resolution, hashing, language detection |
//! | [`adapters`] | Per-language tree-sitter adapters |
//! | [`extractor`] | Generic AST traversal into chunks |
//! | [`fallback`] | Rule-based and line-window chunking |
//! | [`embedder`] | Embedding capability, Ollama provider, retry/batch |
//! | [`store`] | Durable hybrid vector + metadata store |
//! | [`caller_index`] | Inverted caller map with snapshot persistence |
//! | [`indexer`] | Incremental orchestration, single-flight |
//! | [`retrieval`] | Search + usage graph composition |
//! | [`watcher`] | Debounced filesystem watching |

pub mod adapters;
pub mod caller_index;
pub mod config;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod fallback;
pub mod indexer;
pub mod models;
pub mod progress;
pub mod retrieval;
pub mod scanner;
pub mod store;
pub mod watcher;
