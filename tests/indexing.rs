//! End-to-end indexing and retrieval scenarios.

mod common;

use common::{setup, write_file, HashEmbedder};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use codescout::embedder::Embedder;
use codescout::models::SearchOptions;
use codescout::store::Store;

fn opts(limit: usize) -> SearchOptions {
    SearchOptions {
        limit,
        code_only: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn fresh_index_then_search() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    write_file(
        &env.project,
        "src/greet.rs",
        "/// Returns a friendly greeting.\npub fn greet(name: &str) -> String {\n    format!(\"Hello, {}!\", name)\n}\n",
    );

    let summary = env
        .indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.files_indexed, 1);
    assert!(summary.chunks_stored >= 1);

    let results = env
        .retrieval
        .search("greet greeting function", env.tmp.path(), &opts(5))
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].name, "greet");
    assert!(
        results[0].similarity >= 0.4,
        "similarity too low: {}",
        results[0].similarity
    );
    // Lines must cover the whole function body.
    assert_eq!(results[0].lines, "2-4");
    assert!(results[0].content.contains("Hello"));
}

#[tokio::test]
async fn second_index_is_a_no_op() {
    let env = setup(32).await;
    let cancel = CancellationToken::new();

    write_file(&env.project, "a.rs", "pub fn alpha() -> u32 { 1 }\n");
    write_file(&env.project, "b.rs", "pub fn beta() -> u32 { 2 }\n");

    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    let chunks_before = env.store.chunk_count().await.unwrap();
    let calls_before = env.embedder.call_count();

    let summary = env
        .indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    // No chunks written, no deletions, and no embedding calls at all.
    assert_eq!(summary.chunks_stored, 0);
    assert_eq!(summary.deleted, 0);
    assert_eq!(env.store.chunk_count().await.unwrap(), chunks_before);
    assert_eq!(env.embedder.call_count(), calls_before);
}

#[tokio::test]
async fn incremental_reembedding_replaces_chunk() {
    let env = setup(32).await;
    let cancel = CancellationToken::new();

    write_file(
        &env.project,
        "greet.rs",
        "pub fn greet() -> &'static str {\n    \"hello\"\n}\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    let vectors_before = env.store.vector_count().await.unwrap();

    // Same symbol, new body.
    write_file(
        &env.project,
        "greet.rs",
        "pub fn greet() -> &'static str {\n    \"good evening to you\"\n}\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let chunk = env
        .store
        .get_chunk_by_name("greet")
        .await
        .unwrap()
        .expect("greet chunk");
    assert!(chunk.content.contains("good evening"));

    // Exactly one greet chunk and an unchanged vector count: the prior
    // vector is gone, not orphaned.
    let all = env.store.all_chunks().await.unwrap();
    assert_eq!(all.iter().filter(|c| c.name == "greet").count(), 1);
    assert_eq!(env.store.vector_count().await.unwrap(), vectors_before);
}

#[tokio::test]
async fn hashes_and_chunks_stay_consistent() {
    let env = setup(32).await;
    let cancel = CancellationToken::new();

    write_file(&env.project, "a.rs", "pub fn alpha() -> u32 { 1 }\n");
    write_file(&env.project, "sub/b.rs", "pub fn beta() -> u32 { 2 }\n");
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let root_key = env.project.canonicalize().unwrap();
    let root_key = root_key.to_string_lossy();
    let hashed_paths = env.store.project_paths(&root_key).await.unwrap();
    assert_eq!(hashed_paths.len(), 2);

    let chunks = env.store.all_chunks().await.unwrap();
    // Every hashed path has at least one chunk, and vice versa.
    for path in &hashed_paths {
        assert!(
            chunks.iter().any(|c| &c.file_path == path),
            "no chunk for hashed path {path}"
        );
    }
    for chunk in &chunks {
        assert!(
            hashed_paths.contains(&chunk.file_path),
            "chunk without hash row: {}",
            chunk.file_path
        );
    }

    // Chunk/vector counts match one-to-one.
    assert_eq!(
        env.store.chunk_count().await.unwrap(),
        env.store.vector_count().await.unwrap()
    );
}

#[tokio::test]
async fn caller_discovery_across_files() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    write_file(
        &env.project,
        "foo.rs",
        "pub fn helper() -> u32 {\n    42\n}\n",
    );
    write_file(
        &env.project,
        "bar.rs",
        "pub fn caller() -> u32 {\n    helper()\n}\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let callers = env.store.find_callers("helper", 10, None).await.unwrap();
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].name, "caller");
    assert!(callers[0].file_path.ends_with("bar.rs"));

    let index_callers = env.caller_index.find_callers("helper", 10);
    assert_eq!(index_callers.len(), 1);
    assert_eq!(index_callers[0].name, "caller");

    // Search enrichment agrees.
    let response = env
        .retrieval
        .search_with_usage("helper", env.tmp.path(), &opts(5))
        .await
        .unwrap();
    let helper = response
        .results
        .iter()
        .find(|r| r.name == "helper")
        .expect("helper in results");
    let usage = helper.usage.as_ref().expect("usage populated");
    assert!(usage.called_by.iter().any(|c| c.name == "caller"));
    assert!(!usage.is_unused);

    // The graph carries the caller -> helper edge.
    let graph = response.graph.as_ref().unwrap();
    assert!(graph
        .edges
        .iter()
        .any(|e| e.from == "caller" && e.to == "helper"));
}

#[tokio::test]
async fn unused_flag_for_never_called_export() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    write_file(
        &env.project,
        "lonely.rs",
        "pub fn orphan_function() -> u32 {\n    7\n}\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let response = env
        .retrieval
        .search_with_usage("orphan_function", env.tmp.path(), &opts(5))
        .await
        .unwrap();
    let orphan = response
        .results
        .iter()
        .find(|r| r.name == "orphan_function")
        .expect("orphan in results");
    let usage = orphan.usage.as_ref().unwrap();
    assert!(usage.is_exported);
    assert!(usage.is_unused);
    assert!(usage.not_tested);
}

#[tokio::test]
async fn path_and_language_filters() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    write_file(&env.project, "a.py", "def handler(x):\n    return x\n");
    write_file(
        &env.project,
        "sub/a.go",
        "package sub\n\nfunc Handler(x int) int {\n\treturn x\n}\n",
    );
    write_file(
        &env.project,
        "other/b.go",
        "package other\n\nfunc HandlerB(x int) int {\n\treturn x\n}\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let search_opts = SearchOptions {
        language: Some("go".into()),
        path: Some("project/sub/*".into()),
        limit: 10,
        code_only: true,
        ..Default::default()
    };
    let results = env
        .retrieval
        .search("handler", env.tmp.path(), &search_opts)
        .await
        .unwrap();

    assert!(!results.is_empty());
    for r in &results {
        assert_eq!(r.language, "go");
        assert!(r.file_path.contains("sub/"), "wrong path: {}", r.file_path);
    }
}

#[tokio::test]
async fn dimension_migration_then_reindex() {
    let env = setup(4).await;
    let cancel = CancellationToken::new();

    write_file(&env.project, "a.rs", "pub fn alpha() -> u32 { 1 }\n");
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    assert!(env.store.chunk_count().await.unwrap() > 0);
    env.store.close().await;

    // Reopen the same database with an 8-dim embedder: the store must
    // come up empty and accept a full re-population.
    let embedder = Arc::new(HashEmbedder::new(8));
    let store = Arc::new(
        Store::open(&env.cfg.db_path(), embedder as Arc<dyn Embedder>, 2)
            .await
            .unwrap(),
    );
    assert_eq!(store.dimension(), 8);
    assert_eq!(store.chunk_count().await.unwrap(), 0);
    assert!(store.indexed_roots().await.unwrap().is_empty());

    // A fresh index run fully repopulates with 8-dim vectors.
    let caller_index = Arc::new(codescout::caller_index::CallerIndex::new(
        env.cfg.caller_index_path(),
        env.cfg.legacy_caller_index_path(),
        env.cfg.caller_index_lock_path(),
    ));
    let indexer = codescout::indexer::Indexer::new(
        Arc::clone(&env.cfg),
        Arc::clone(&store),
        caller_index,
        Arc::new(codescout::progress::NullSink),
    );
    let summary = indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.files_indexed, 1);
    assert!(store.chunk_count().await.unwrap() > 0);
    assert_eq!(
        store.chunk_count().await.unwrap(),
        store.vector_count().await.unwrap()
    );
}

#[tokio::test]
async fn remove_project_clears_everything() {
    let env = setup(32).await;
    let cancel = CancellationToken::new();

    write_file(&env.project, "a.rs", "pub fn alpha() -> u32 { 1 }\n");
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    assert!(env.store.chunk_count().await.unwrap() > 0);

    env.indexer.remove_project(&env.project).await.unwrap();
    assert_eq!(env.store.chunk_count().await.unwrap(), 0);
    assert_eq!(env.store.vector_count().await.unwrap(), 0);
    assert!(env.store.indexed_roots().await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_index_preserves_committed_files() {
    let env = setup(32).await;

    write_file(&env.project, "a.rs", "pub fn alpha() -> u32 { 1 }\n");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = env.indexer.index_project(&env.project, false, &cancel).await;
    assert!(result.is_err());

    // Nothing was committed for the cancelled file, so a fresh run
    // indexes it from scratch.
    let cancel = CancellationToken::new();
    let summary = env
        .indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.files_indexed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_update_and_delete() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    let file = write_file(
        &env.project,
        "watched.rs",
        "pub fn watched_symbol() -> u32 { 1 }\n",
    );
    env.indexer
        .index_project(&env.project, true, &cancel)
        .await
        .unwrap();
    assert!(env
        .store
        .get_chunk_by_name("watched_symbol")
        .await
        .unwrap()
        .is_some());

    // Rewrite the file: the watcher should re-index it.
    fs::write(
        &file,
        "pub fn watched_symbol() -> u32 { 2 }\npub fn second_symbol() -> u32 { 3 }\n",
    )
    .unwrap();

    let mut found = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if env
            .store
            .get_chunk_by_name("second_symbol")
            .await
            .unwrap()
            .is_some()
        {
            found = true;
            break;
        }
    }
    assert!(found, "watcher did not pick up the file update");

    // Delete the file: chunks and hash rows must disappear.
    fs::remove_file(&file).unwrap();

    let mut gone = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let chunk = env.store.get_chunk_by_name("watched_symbol").await.unwrap();
        if chunk.is_none() {
            gone = true;
            break;
        }
    }
    assert!(gone, "watcher did not remove deleted file from the index");

    let root_key = env.project.canonicalize().unwrap();
    let paths = env
        .store
        .project_paths(&root_key.to_string_lossy())
        .await
        .unwrap();
    assert!(paths.iter().all(|p| !p.ends_with("watched.rs")));
}
