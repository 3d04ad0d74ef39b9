//! AST extraction of semantic chunks.
//!
//! For grammar-backed languages the extractor runs a single generic
//! traversal and asks the [`LanguageAdapter`](crate::adapters) at each
//! node: is this a symbol, a call, a type reference? Symbols become
//! [`Chunk`]s carrying their outbound calls and references. Languages
//! without a grammar fall back to rule-based chunking, and as a last
//! resort to fixed-size line windows, so every text file yields at
//! least one chunk.

use std::collections::BTreeSet;
use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::adapters::{adapter_for, LanguageAdapter};
use crate::fallback::{chunk_by_lines, chunk_by_rules, split_oversized, RawChunk};
use crate::models::{Chunk, ChunkKind};

pub struct Extractor {
    max_chunk_lines: usize,
    overlap_lines: usize,
}

impl Extractor {
    pub fn new(max_chunk_lines: usize, overlap_lines: usize) -> Self {
        Self {
            max_chunk_lines,
            overlap_lines,
        }
    }

    /// Parse `content` into chunks. `absolute_path` is recorded on every
    /// chunk; `relative_path` is used for test classification and for
    /// naming whole-file chunks. Chunk ids are assigned by the caller.
    pub fn extract(
        &self,
        content: &str,
        language: &str,
        absolute_path: &str,
        relative_path: &str,
    ) -> Vec<Chunk> {
        let path_is_test = is_test_path(relative_path);

        if let Some(adapter) = adapter_for(language) {
            let symbols = self.extract_with_grammar(content, adapter);
            if !symbols.is_empty() {
                let content_is_test = path_is_test
                    || adapter
                        .test_markers
                        .iter()
                        .any(|marker| content.contains(marker));
                return self.finish(symbols, language, absolute_path, content_is_test);
            }
        }

        let raw = chunk_by_rules(content, language);
        let raw = if raw.is_empty() {
            chunk_by_lines(
                content,
                relative_path,
                self.max_chunk_lines,
                self.overlap_lines,
            )
        } else {
            raw
        };

        let symbols = raw
            .into_iter()
            .map(|r| ExtractedSymbol {
                raw: r,
                calls: Vec::new(),
                references: Vec::new(),
                is_exported: false,
                parent: String::new(),
            })
            .collect();
        self.finish(symbols, language, absolute_path, path_is_test)
    }

    fn extract_with_grammar(
        &self,
        content: &str,
        adapter: &'static LanguageAdapter,
    ) -> Vec<ExtractedSymbol> {
        let mut parser = Parser::new();
        if parser.set_language(&adapter.grammar).is_err() {
            return Vec::new();
        }
        let tree = match parser.parse(content, None) {
            Some(tree) => tree,
            None => return Vec::new(),
        };

        let src = content.as_bytes();
        let mut symbols = Vec::new();
        collect_symbols(tree.root_node(), src, adapter, "", &mut symbols);
        symbols
    }

    fn finish(
        &self,
        symbols: Vec<ExtractedSymbol>,
        language: &str,
        absolute_path: &str,
        file_is_test: bool,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for sym in symbols {
            let line_count = sym.raw.content.lines().count();
            let parts = if line_count > self.max_chunk_lines {
                split_oversized(&sym.raw, self.max_chunk_lines, self.overlap_lines)
            } else {
                vec![sym.raw.clone()]
            };

            for part in parts {
                let is_test = file_is_test
                    || part.name.to_lowercase().starts_with("test");
                chunks.push(Chunk {
                    id: String::new(),
                    file_path: absolute_path.to_string(),
                    kind: part.kind,
                    name: part.name,
                    language: language.to_string(),
                    start_line: part.start_line,
                    end_line: part.end_line,
                    content: part.content,
                    calls: sym.calls.clone(),
                    references: sym.references.clone(),
                    is_exported: sym.is_exported,
                    is_test,
                    parent: sym.parent.clone(),
                });
            }
        }
        chunks
    }
}

struct ExtractedSymbol {
    raw: RawChunk,
    calls: Vec<String>,
    references: Vec<String>,
    is_exported: bool,
    parent: String,
}

/// Recursive symbol collection. `parent` carries the name of the
/// innermost enclosing class-like symbol.
fn collect_symbols(
    node: Node,
    src: &[u8],
    adapter: &'static LanguageAdapter,
    parent: &str,
    out: &mut Vec<ExtractedSymbol>,
) {
    let mut child_parent = parent.to_string();

    if let Some(found) = (adapter.symbol)(&node, src, parent) {
        let effective_parent = found.parent_override.clone().unwrap_or_else(|| parent.to_string());

        let name = if found.kind == ChunkKind::Method && !effective_parent.is_empty() {
            format!("{}.{}", effective_parent, found.name)
        } else {
            found.name.clone()
        };

        let mut calls = BTreeSet::new();
        collect_calls(node, src, adapter, &mut calls);
        let mut references = BTreeSet::new();
        collect_references(node, src, adapter, &mut references);

        out.push(ExtractedSymbol {
            raw: RawChunk {
                kind: found.kind,
                name: name.clone(),
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
                content: node.utf8_text(src).unwrap_or_default().to_string(),
            },
            calls: calls.into_iter().collect(),
            references: references.into_iter().collect(),
            is_exported: (adapter.is_exported)(&node, &name, src),
            parent: if found.kind == ChunkKind::Method {
                effective_parent
            } else {
                String::new()
            },
        });

        if found.kind == ChunkKind::Class {
            child_parent = found.name;
        }
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        collect_symbols(child, src, adapter, &child_parent, out);
    }
}

fn collect_calls(
    node: Node,
    src: &[u8],
    adapter: &'static LanguageAdapter,
    out: &mut BTreeSet<String>,
) {
    if let Some(name) = (adapter.call)(&node, src) {
        if !adapter.keywords.contains(&name.as_str()) {
            out.insert(name);
        }
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        collect_calls(child, src, adapter, out);
    }
}

fn collect_references(
    node: Node,
    src: &[u8],
    adapter: &'static LanguageAdapter,
    out: &mut BTreeSet<String>,
) {
    if let Some(name) = (adapter.reference)(&node, src) {
        if !adapter.builtin_types.contains(&name.as_str()) {
            out.insert(name);
        }
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        collect_references(child, src, adapter, out);
    }
}

/// Path-based test classification: known filename patterns or a
/// `test`/`tests` path component.
pub fn is_test_path(relative_path: &str) -> bool {
    let path = relative_path.replace('\\', "/");
    let base = path.rsplit('/').next().unwrap_or(&path).to_lowercase();

    let patterns = [
        "_test.go", "_test.py", "_test.js", "_test.ts", "_test.rs", ".test.js", ".test.ts",
        ".test.jsx", ".test.tsx", ".spec.js", ".spec.ts", ".spec.jsx", ".spec.tsx", "test.py",
        "tests.py",
    ];
    if patterns.iter().any(|p| base.contains(p)) || base.starts_with("test_") {
        return true;
    }

    Path::new(&path)
        .components()
        .any(|c| matches!(c.as_os_str().to_str(), Some("test") | Some("tests")))
}
