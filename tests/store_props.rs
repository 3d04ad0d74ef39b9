//! Store-level properties exercised through the public API.

mod common;

use common::{setup, write_file};
use tokio_util::sync::CancellationToken;

use codescout::models::SearchOptions;

fn opts(limit: usize) -> SearchOptions {
    SearchOptions {
        limit,
        code_only: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn search_never_returns_deleted_paths() {
    let env = setup(32).await;
    let cancel = CancellationToken::new();

    let file = write_file(
        &env.project,
        "victim.rs",
        "pub fn victim_symbol() -> u32 { 1 }\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    std::fs::remove_file(&file).unwrap();
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let results = env
        .retrieval
        .search("victim_symbol", env.tmp.path(), &opts(10))
        .await
        .unwrap();
    assert!(
        results.iter().all(|r| !r.absolute_path.ends_with("victim.rs")),
        "search returned a chunk for a deleted file"
    );
    assert_eq!(env.store.chunk_count().await.unwrap(), 0);
    assert_eq!(env.store.vector_count().await.unwrap(), 0);
}

#[tokio::test]
async fn add_then_delete_restores_prior_state() {
    let env = setup(32).await;
    let cancel = CancellationToken::new();

    write_file(&env.project, "keep.rs", "pub fn keep() -> u32 { 1 }\n");
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    let chunks_before = env.store.chunk_count().await.unwrap();
    let vectors_before = env.store.vector_count().await.unwrap();

    // Add a second file, then delete it again.
    let extra = write_file(&env.project, "extra.rs", "pub fn extra() -> u32 { 2 }\n");
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();
    assert!(env.store.chunk_count().await.unwrap() > chunks_before);

    std::fs::remove_file(&extra).unwrap();
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    assert_eq!(env.store.chunk_count().await.unwrap(), chunks_before);
    assert_eq!(env.store.vector_count().await.unwrap(), vectors_before);
    assert!(env.store.get_chunk_by_name("extra").await.unwrap().is_none());
    assert!(env.store.get_chunk_by_name("keep").await.unwrap().is_some());
}

#[tokio::test]
async fn deep_callers_report_levels() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    // level_three -> level_two -> level_one -> base
    write_file(&env.project, "base.rs", "pub fn base() -> u32 { 0 }\n");
    write_file(
        &env.project,
        "one.rs",
        "pub fn level_one() -> u32 { base() }\n",
    );
    write_file(
        &env.project,
        "two.rs",
        "pub fn level_two() -> u32 { level_one() }\n",
    );
    write_file(
        &env.project,
        "three.rs",
        "pub fn level_three() -> u32 { level_two() }\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let levels = env.caller_index.find_callers_deep("base", 3, 10);
    assert_eq!(levels[&1].len(), 1);
    assert_eq!(levels[&1][0].name, "level_one");
    assert_eq!(levels[&2][0].name, "level_two");
    assert_eq!(levels[&3][0].name, "level_three");
}

#[tokio::test]
async fn kind_filter_restricts_results() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    write_file(
        &env.project,
        "shapes.rs",
        "pub struct Circle {\n    pub radius: f64,\n}\n\npub fn circle_area(c: &Circle) -> f64 {\n    c.radius * c.radius * 3.14\n}\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let mut class_opts = opts(10);
    class_opts.kind = Some("class".into());
    let results = env
        .retrieval
        .search("circle", env.tmp.path(), &class_opts)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.chunk_type == "class"));

    let mut fn_opts = opts(10);
    fn_opts.kind = Some("function".into());
    let results = env
        .retrieval
        .search("circle", env.tmp.path(), &fn_opts)
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.chunk_type == "function"));
}

#[tokio::test]
async fn min_similarity_filters_weak_matches() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    write_file(&env.project, "a.rs", "pub fn alpha() -> u32 { 1 }\n");
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let mut strict = opts(10);
    strict.min_similarity = 0.99;
    let results = env
        .retrieval
        .search("completely unrelated topic entirely", env.tmp.path(), &strict)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn caller_index_rebuilds_from_store() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    write_file(&env.project, "base.rs", "pub fn base() -> u32 { 0 }\n");
    write_file(
        &env.project,
        "caller.rs",
        "pub fn caller() -> u32 { base() }\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let stats_before = env.caller_index.stats();
    assert!(stats_before.1 > 0);

    // Wipe the in-memory index, then rebuild it from stored chunks.
    env.caller_index.clear();
    assert!(env.caller_index.find_callers("base", 10).is_empty());

    let chunks = env.store.all_chunks().await.unwrap();
    env.caller_index.rebuild(&chunks);

    assert_eq!(env.caller_index.stats(), stats_before);
    let callers = env.caller_index.find_callers("base", 10);
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].name, "caller");
}

#[tokio::test]
async fn referencers_surface_type_usage() {
    let env = setup(64).await;
    let cancel = CancellationToken::new();

    write_file(
        &env.project,
        "types.rs",
        "pub struct Request {\n    pub body: String,\n}\n\npub fn handle(req: Request) -> u32 {\n    req.body.len() as u32\n}\n",
    );
    env.indexer
        .index_project(&env.project, false, &cancel)
        .await
        .unwrap();

    let refs = env
        .store
        .find_referencers("Request", 10, None)
        .await
        .unwrap();
    let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"handle"), "refs were {names:?}");
    assert!(!names.contains(&"Request"));

    // The same relation shows up as "used by" on class-kind search
    // results, and as a referencer edge in the graph.
    let response = env
        .retrieval
        .search_with_usage("Request struct", env.tmp.path(), &opts(10))
        .await
        .unwrap();
    let request = response
        .results
        .iter()
        .find(|r| r.name == "Request")
        .expect("Request in results");
    let usage = request.usage.as_ref().expect("usage populated");
    assert!(usage.referenced_by.iter().any(|r| r.name == "handle"));
    assert!(!usage.is_unused);

    let graph = response.graph.as_ref().unwrap();
    assert!(graph
        .edges
        .iter()
        .any(|e| e.from == "handle" && e.to == "Request"));

    // Function results carry no referenced_by list.
    let handle = response.results.iter().find(|r| r.name == "handle");
    if let Some(handle) = handle {
        if let Some(usage) = &handle.usage {
            assert!(usage.referenced_by.is_empty());
        }
    }
}
