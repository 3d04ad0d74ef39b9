//! Search composition: vector search plus usage-graph enrichment.
//!
//! The retrieval service wraps the store's semantic search and, for
//! every named result, resolves its outbound calls against the index,
//! walks the caller index three levels deep, collects the chunks that
//! reference class-kind results in type position ("used by"), derives
//! the `is_unused` / `not_tested` flags, and assembles a usage graph
//! spanning results, callees, callers, and referencers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::caller_index::CallerIndex;
use crate::error::Result;
use crate::models::{
    relative_to, CallInfo, CallerInfo, ChunkKind, GraphEdge, GraphNode, SearchOptions,
    SearchResponse, SearchResult, UsageGraph, UsageInfo,
};
use crate::store::Store;

const CALLER_DEPTH: usize = 3;
const CALLERS_PER_LEVEL: usize = 10;
const MAX_REFERENCERS: usize = 10;

pub struct RetrievalService {
    store: Arc<Store>,
    caller_index: Arc<CallerIndex>,
}

impl RetrievalService {
    pub fn new(store: Arc<Store>, caller_index: Arc<CallerIndex>) -> Self {
        Self {
            store,
            caller_index,
        }
    }

    /// Plain semantic search with relative paths computed against `cwd`.
    pub async fn search(
        &self,
        query: &str,
        cwd: &Path,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        self.store.search(query, cwd, opts).await
    }

    /// Search and enrich every named result with usage information and
    /// a combined call graph.
    pub async fn search_with_usage(
        &self,
        query: &str,
        cwd: &Path,
        opts: &SearchOptions,
    ) -> Result<SearchResponse> {
        let mut results = self.store.search(query, cwd, opts).await?;

        let cwd_buf = cwd.to_path_buf();
        let mut join_set = tokio::task::JoinSet::new();
        for (index, result) in results.iter().enumerate() {
            if result.name.is_empty() {
                continue;
            }
            let store = Arc::clone(&self.store);
            let caller_index = Arc::clone(&self.caller_index);
            let name = result.name.clone();
            let cwd = cwd_buf.clone();
            join_set.spawn(async move {
                let usage = enrich_symbol(&store, &caller_index, &name, &cwd).await;
                (index, usage)
            });
        }

        let mut enriched: HashMap<usize, UsageInfo> = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((index, Ok(usage))) = joined {
                enriched.insert(index, usage);
            }
        }

        for (index, usage) in &enriched {
            results[*index].usage = Some(usage.clone());
        }

        let graph = build_graph(&results);
        Ok(SearchResponse {
            count: results.len(),
            results,
            graph: Some(graph),
        })
    }
}

async fn enrich_symbol(
    store: &Store,
    caller_index: &CallerIndex,
    name: &str,
    cwd: &PathBuf,
) -> Result<UsageInfo> {
    let metadata = store.get_chunk_by_name(name).await?;

    let mut calls = Vec::new();
    let mut references = Vec::new();
    let mut referenced_by = Vec::new();
    let mut is_exported = false;
    let mut is_test = false;

    if let Some(chunk) = &metadata {
        is_exported = chunk.is_exported;
        is_test = chunk.is_test;
        references = chunk.references.clone();

        for call_name in &chunk.calls {
            let info = match store.get_chunk_by_name(call_name).await? {
                Some(target) => CallInfo {
                    name: call_name.clone(),
                    file_path: relativize(cwd, &target.file_path),
                    line: target.start_line,
                    language: target.language,
                    is_external: false,
                },
                None => CallInfo {
                    name: call_name.clone(),
                    file_path: String::new(),
                    line: 0,
                    language: String::new(),
                    is_external: true,
                },
            };
            calls.push(info);
        }

        // "Used by": who names this type in a type position. Only
        // meaningful for class-kind symbols.
        if chunk.kind == ChunkKind::Class {
            for mut referencer in store.find_referencers(name, MAX_REFERENCERS, None).await? {
                referencer.file_path = relativize(cwd, &referencer.file_path);
                referenced_by.push(referencer);
            }
        }
    }

    // Deep callers, flattened level by level.
    let by_level = caller_index.find_callers_deep(name, CALLER_DEPTH, CALLERS_PER_LEVEL);
    let mut called_by = Vec::new();
    let mut has_test_caller = false;
    for level in 1..=CALLER_DEPTH {
        if let Some(callers) = by_level.get(&level) {
            for caller in callers {
                let mut caller = caller.clone();
                caller.file_path = relativize(cwd, &caller.file_path);
                if caller.is_test {
                    has_test_caller = true;
                }
                called_by.push(caller);
            }
        }
    }

    let is_unused = is_exported && called_by.is_empty() && referenced_by.is_empty();
    let not_tested = is_exported && !is_test && !has_test_caller;

    Ok(UsageInfo {
        calls,
        called_by,
        references,
        referenced_by,
        is_exported,
        is_test,
        is_unused,
        not_tested,
    })
}

/// One node per distinct symbol, one edge per call relation with
/// duplicate edges collapsed into a count.
fn build_graph(results: &[SearchResult]) -> UsageGraph {
    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut node_seen: HashMap<String, usize> = HashMap::new();
    let mut edge_counts: HashMap<(String, String), usize> = HashMap::new();
    let mut edge_order: Vec<(String, String)> = Vec::new();

    let add_node = |nodes: &mut Vec<GraphNode>,
                        node_seen: &mut HashMap<String, usize>,
                        node: GraphNode| {
        if !node_seen.contains_key(&node.id) {
            node_seen.insert(node.id.clone(), nodes.len());
            nodes.push(node);
        }
    };

    for result in results {
        if result.name.is_empty() {
            continue;
        }
        let usage = result.usage.as_ref();
        add_node(
            &mut nodes,
            &mut node_seen,
            GraphNode {
                id: result.name.clone(),
                kind: result.chunk_type.clone(),
                file_path: result.file_path.clone(),
                is_exported: usage.map(|u| u.is_exported).unwrap_or(false),
                is_test: usage.map(|u| u.is_test).unwrap_or(false),
                is_unused: usage.map(|u| u.is_unused).unwrap_or(false),
            },
        );

        let Some(usage) = usage else { continue };

        for call in &usage.calls {
            add_node(
                &mut nodes,
                &mut node_seen,
                GraphNode {
                    id: call.name.clone(),
                    kind: "function".to_string(),
                    file_path: call.file_path.clone(),
                    is_exported: false,
                    is_test: false,
                    is_unused: false,
                },
            );
            let key = (result.name.clone(), call.name.clone());
            if !edge_counts.contains_key(&key) {
                edge_order.push(key.clone());
            }
            *edge_counts.entry(key).or_default() += 1;
        }

        for caller in &usage.called_by {
            add_node(
                &mut nodes,
                &mut node_seen,
                GraphNode {
                    id: caller.name.clone(),
                    kind: "function".to_string(),
                    file_path: caller.file_path.clone(),
                    is_exported: false,
                    is_test: caller.is_test,
                    is_unused: false,
                },
            );
            let key = (caller.name.clone(), result.name.clone());
            if !edge_counts.contains_key(&key) {
                edge_order.push(key.clone());
            }
            *edge_counts.entry(key).or_default() += 1;
        }

        for referencer in &usage.referenced_by {
            add_node(
                &mut nodes,
                &mut node_seen,
                GraphNode {
                    id: referencer.name.clone(),
                    kind: "function".to_string(),
                    file_path: referencer.file_path.clone(),
                    is_exported: false,
                    is_test: referencer.is_test,
                    is_unused: false,
                },
            );
            let key = (referencer.name.clone(), result.name.clone());
            if !edge_counts.contains_key(&key) {
                edge_order.push(key.clone());
            }
            *edge_counts.entry(key).or_default() += 1;
        }
    }

    let edges = edge_order
        .into_iter()
        .map(|key| {
            let count = edge_counts[&key];
            GraphEdge {
                from: key.0,
                to: key.1,
                count,
            }
        })
        .collect();

    UsageGraph { nodes, edges }
}

fn relativize(cwd: &Path, absolute: &str) -> String {
    relative_to(cwd, absolute).unwrap_or_else(|| absolute.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageInfo;

    fn result(name: &str) -> SearchResult {
        SearchResult {
            file_path: format!("./{name}.rs"),
            absolute_path: format!("/p/{name}.rs"),
            chunk_type: "function".to_string(),
            name: name.to_string(),
            lines: "1-3".to_string(),
            content: String::new(),
            similarity: 0.9,
            language: "rust".to_string(),
            usage: None,
        }
    }

    fn caller(name: &str, is_test: bool) -> CallerInfo {
        CallerInfo {
            name: name.to_string(),
            file_path: format!("./{name}.rs"),
            line: 1,
            language: "rust".to_string(),
            is_test,
            parent: String::new(),
        }
    }

    #[test]
    fn test_graph_nodes_deduplicated() {
        let mut a = result("alpha");
        a.usage = Some(UsageInfo {
            called_by: vec![caller("shared", false)],
            ..Default::default()
        });
        let mut b = result("beta");
        b.usage = Some(UsageInfo {
            called_by: vec![caller("shared", false)],
            ..Default::default()
        });

        let graph = build_graph(&[a, b]);
        let shared_nodes = graph.nodes.iter().filter(|n| n.id == "shared").count();
        assert_eq!(shared_nodes, 1);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_graph_referencer_edges() {
        let mut ty = result("Config");
        ty.chunk_type = "class".to_string();
        ty.usage = Some(UsageInfo {
            referenced_by: vec![caller("load_config", false)],
            ..Default::default()
        });

        let graph = build_graph(&[ty]);
        assert!(graph.nodes.iter().any(|n| n.id == "load_config"));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.from == "load_config" && e.to == "Config"));
    }

    #[test]
    fn test_graph_edge_direction() {
        let mut a = result("alpha");
        a.usage = Some(UsageInfo {
            calls: vec![CallInfo {
                name: "callee".to_string(),
                file_path: String::new(),
                line: 0,
                language: String::new(),
                is_external: true,
            }],
            called_by: vec![caller("upstream", false)],
            ..Default::default()
        });

        let graph = build_graph(&[a]);
        assert!(graph
            .edges
            .iter()
            .any(|e| e.from == "alpha" && e.to == "callee"));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.from == "upstream" && e.to == "alpha"));
    }
}
