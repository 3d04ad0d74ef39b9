//! Shared test harness: a deterministic embedder and a fully wired
//! engine rooted in a temp directory.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use codescout::caller_index::CallerIndex;
use codescout::config::Config;
use codescout::embedder::{normalize, Embedder};
use codescout::error::Result;
use codescout::indexer::Indexer;
use codescout::progress::NullSink;
use codescout::retrieval::RetrievalService;
use codescout::store::Store;
use codescout::watcher::{WatcherManager, WatchTarget};

/// Deterministic embedder: hashes character trigrams into buckets and
/// normalizes. Similar strings produce similar vectors, no network.
pub struct HashEmbedder {
    dims: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0f32; self.dims];
        let lower = text.to_lowercase();
        for window in lower.as_bytes().windows(3) {
            let mut h: usize = 5381;
            for &b in window {
                h = h.wrapping_mul(33).wrapping_add(b as usize);
            }
            v[h % self.dims] += 1.0;
        }
        Ok(normalize(v))
    }

    fn model_name(&self) -> &str {
        "hash-test"
    }
}

pub struct TestEnv {
    pub tmp: TempDir,
    pub project: PathBuf,
    pub cfg: Arc<Config>,
    pub embedder: Arc<HashEmbedder>,
    pub store: Arc<Store>,
    pub caller_index: Arc<CallerIndex>,
    pub indexer: Arc<Indexer>,
    pub retrieval: RetrievalService,
}

/// Build a fully wired engine with a `project/` root inside a temp dir.
pub async fn setup(dims: usize) -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("project");
    fs::create_dir_all(&project).unwrap();

    let mut cfg = Config::default();
    cfg.data_dir = tmp.path().join("data");
    cfg.debounce_ms = 100;
    cfg.watch_enabled = true;
    let cfg = Arc::new(cfg);

    let embedder = Arc::new(HashEmbedder::new(dims));
    let store = Arc::new(
        Store::open(
            &cfg.db_path(),
            embedder.clone() as Arc<dyn Embedder>,
            cfg.clamped_workers(),
        )
        .await
        .unwrap(),
    );
    let caller_index = Arc::new(CallerIndex::new(
        cfg.caller_index_path(),
        cfg.legacy_caller_index_path(),
        cfg.caller_index_lock_path(),
    ));

    let indexer = Arc::new(Indexer::new(
        Arc::clone(&cfg),
        Arc::clone(&store),
        Arc::clone(&caller_index),
        Arc::new(NullSink),
    ));
    let manager = Arc::new(WatcherManager::new(
        Arc::clone(&cfg),
        indexer.clone() as Arc<dyn WatchTarget>,
    ));
    indexer.set_watch_controller(manager);

    let retrieval = RetrievalService::new(Arc::clone(&store), Arc::clone(&caller_index));

    TestEnv {
        tmp,
        project,
        cfg,
        embedder,
        store,
        caller_index,
        indexer,
        retrieval,
    }
}

pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}
