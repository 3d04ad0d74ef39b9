//! # codescout CLI (`cscout`)
//!
//! The `cscout` binary drives the indexing and retrieval engine from
//! the command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cscout index [PATH]` | Incrementally index a project root |
//! | `cscout search "<query>"` | Semantic search with usage analysis |
//! | `cscout status` | Index statistics and provider connectivity |
//! | `cscout reindex [PATH]` | Force a full rebuild of a root |
//! | `cscout remove [PATH]` | Remove a root from the index |
//! | `cscout watch [PATH]` | Index, then keep the index live until Ctrl-C |
//!
//! ## Examples
//!
//! ```bash
//! cscout index .
//! cscout search "function that parses configuration"
//! cscout search "http handler" --language go --type function --limit 10
//! cscout watch .
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use codescout::caller_index::CallerIndex;
use codescout::config::{load_config, Config};
use codescout::embedder::OllamaEmbedder;
use codescout::indexer::Indexer;
use codescout::models::SearchOptions;
use codescout::progress::StderrSink;
use codescout::retrieval::RetrievalService;
use codescout::store::Store;
use codescout::watcher::WatcherManager;

/// Semantic code search with live indexing and usage-graph analysis.
#[derive(Parser)]
#[command(name = "cscout", version, about)]
struct Cli {
    /// Path to the configuration file (TOML). Missing file = defaults.
    #[arg(long, global = true, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codescout")
        .join("config.toml")
}

#[derive(Subcommand)]
enum Commands {
    /// Incrementally index a project root.
    Index {
        /// Project root (default: current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Do not start a file watcher after indexing.
        #[arg(long)]
        no_watch: bool,
    },

    /// Search the index semantically.
    Search {
        /// Natural-language query.
        query: String,

        /// Restrict to a subdirectory or glob (`src/**/*.rs`).
        #[arg(long)]
        path: Option<String>,

        /// Filter by language (case-insensitive).
        #[arg(long)]
        language: Option<String>,

        /// Filter by chunk type: function, class, method, or all.
        #[arg(long = "type", default_value = "all")]
        kind: String,

        /// Include non-code files (JSON, YAML, Markdown, …).
        #[arg(long)]
        include_non_code: bool,

        /// Minimum similarity threshold (0.0 - 1.0).
        #[arg(long, default_value_t = 0.0)]
        min_similarity: f32,

        /// Maximum results (1 - 50).
        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// Emit the full JSON response instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics and provider connectivity. With a path,
    /// also report what an index run on it would do.
    Status {
        path: Option<PathBuf>,
    },

    /// Force a complete rebuild of a project root.
    Reindex {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Remove a project root from the index.
    Remove {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Index a root and keep the index live until interrupted.
    Watch {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

struct App {
    indexer: Arc<Indexer>,
    retrieval: RetrievalService,
    store: Arc<Store>,
    embedder: Arc<OllamaEmbedder>,
    cfg: Arc<Config>,
}

async fn build_app(cfg: Config) -> Result<App> {
    let cfg = Arc::new(cfg);

    let embedder = Arc::new(OllamaEmbedder::new(
        cfg.ollama_url.clone(),
        cfg.embedding_model.clone(),
    ));
    let store = Arc::new(
        Store::open(
            &cfg.db_path(),
            embedder.clone() as Arc<dyn codescout::embedder::Embedder>,
            cfg.clamped_workers(),
        )
        .await?,
    );
    let caller_index = Arc::new(CallerIndex::new(
        cfg.caller_index_path(),
        cfg.legacy_caller_index_path(),
        cfg.caller_index_lock_path(),
    ));
    if store.migrated() {
        // The store was wiped by a dimension change; the snapshot would
        // otherwise keep serving callers for chunks that no longer exist.
        caller_index.clear();
        if let Err(err) = caller_index.save() {
            tracing::warn!(error = %err, "failed to reset caller index");
        }
    }

    let indexer = Arc::new(Indexer::new(
        Arc::clone(&cfg),
        Arc::clone(&store),
        Arc::clone(&caller_index),
        Arc::new(StderrSink),
    ));
    let manager = Arc::new(WatcherManager::new(
        Arc::clone(&cfg),
        indexer.clone() as Arc<dyn codescout::watcher::WatchTarget>,
    ));
    indexer.set_watch_controller(manager);

    let retrieval = RetrievalService::new(Arc::clone(&store), caller_index);
    Ok(App {
        indexer,
        retrieval,
        store,
        embedder,
        cfg,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let app = build_app(cfg).await?;
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Index { path, no_watch } => {
            let summary = app
                .indexer
                .index_project(&path, !no_watch, &cancel)
                .await?;
            println!(
                "indexed {}: {} files, {} chunks, {} deleted in {}ms",
                summary.project,
                summary.files_indexed,
                summary.chunks_stored,
                summary.deleted,
                summary.time_taken_ms
            );
        }

        Commands::Search {
            query,
            path,
            language,
            kind,
            include_non_code,
            min_similarity,
            limit,
            json,
        } => {
            let opts = SearchOptions {
                path,
                language,
                kind: Some(kind),
                code_only: !include_non_code,
                min_similarity,
                limit: limit.clamp(1, 50),
            };
            let cwd = std::env::current_dir()?;
            let response = app.retrieval.search_with_usage(&query, &cwd, &opts).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else if response.count == 0 {
                println!("No matching results found. Index a project first.");
            } else {
                print_results(&response);
            }
        }

        Commands::Status { path } => {
            let chunk_count = app.store.chunk_count().await?;
            let roots = app.store.indexed_roots().await?;
            let provider = match app.embedder.test_connection().await {
                Ok(()) => "connected",
                Err(_) => "disconnected",
            };
            println!("model:     {}", app.cfg.embedding_model);
            println!("provider:  {} ({})", app.cfg.ollama_url, provider);
            println!("dimension: {}", app.store.dimension());
            println!("chunks:    {}", chunk_count);
            println!("data dir:  {}", app.cfg.data_dir.display());
            println!("roots:");
            for root in roots {
                println!("  {}", root);
            }

            if let Some(path) = path {
                let summary = app.indexer.scan_project(&path).await?;
                println!("\nscan of {}:", path.display());
                println!(
                    "  {} files ({} new, {} modified, {} unchanged), {} bytes",
                    summary.total_files,
                    summary.new_files,
                    summary.modified_files,
                    summary.unchanged_files,
                    summary.total_size
                );
                let mut languages: Vec<_> = summary.by_language.iter().collect();
                languages.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
                for (language, count) in languages {
                    println!("  {:>6}  {}", count, language);
                }
            }
        }

        Commands::Reindex { path } => {
            let summary = app.indexer.reindex_project(&path, &cancel).await?;
            println!(
                "reindexed {}: {} files, {} chunks in {}ms",
                summary.project, summary.files_indexed, summary.chunks_stored, summary.time_taken_ms
            );
        }

        Commands::Remove { path } => {
            app.indexer.remove_project(&path).await?;
            println!("removed {}", path.display());
        }

        Commands::Watch { path } => {
            if app.cfg.auto_index {
                app.indexer.index_project(&path, true, &cancel).await?;
            } else {
                app.indexer.watch_project(&path);
            }
            println!("watching {} (Ctrl-C to stop)", path.display());
            tokio::signal::ctrl_c().await?;
            cancel.cancel();
        }
    }

    Ok(())
}

fn print_results(response: &codescout::models::SearchResponse) {
    println!("Found {} results:", response.count);
    for (i, r) in response.results.iter().enumerate() {
        let flags = format_flags(r.usage.as_ref());
        println!(
            "\n{}. {} ({}) {}:{}{}",
            i + 1,
            r.name,
            r.chunk_type,
            r.file_path,
            r.lines,
            flags
        );

        if let Some(usage) = &r.usage {
            if !usage.called_by.is_empty() {
                let items: Vec<String> = usage
                    .called_by
                    .iter()
                    .map(|c| format!("{} ({}:{})", c.name, basename(&c.file_path), c.line))
                    .collect();
                println!("   Called by: {}", items.join(", "));
            }
            if !usage.referenced_by.is_empty() {
                let items: Vec<String> = usage
                    .referenced_by
                    .iter()
                    .map(|c| format!("{} ({}:{})", c.name, basename(&c.file_path), c.line))
                    .collect();
                println!("   Used by: {}", items.join(", "));
            }
        }

        println!("   ```");
        for line in r.content.lines() {
            println!("   {}", line);
        }
        println!("   ```");
    }
}

fn format_flags(usage: Option<&codescout::models::UsageInfo>) -> String {
    let Some(usage) = usage else {
        return String::new();
    };

    let mut flags = Vec::new();
    if usage.is_exported {
        flags.push("exported");
    }
    if usage.is_unused {
        flags.push("UNUSED");
    }
    if usage.not_tested {
        flags.push("no-tests");
    }
    if usage.is_test {
        flags.push("test");
    }

    if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
