//! Rule-based chunkers for languages without a grammar.
//!
//! Three tiers, tried in order by the extractor:
//!
//! 1. Indentation rules (`def` / `class`) for Python-shaped languages.
//! 2. Line patterns plus brace counting for C-shaped languages
//!    (Kotlin, Scala, Swift, Groovy, Dart, and the grammar languages
//!    when their parse yields nothing).
//! 3. Fixed-size line windows with overlap, which always succeeds.
//!
//! Fallback chunks carry no call/reference metadata; only the grammar
//! path produces a symbol graph.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::ChunkKind;

/// A chunk candidate before ids, language, and flags are assigned.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub kind: ChunkKind,
    pub name: String,
    /// 1-based inclusive range.
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
}

/// Dispatch to the rule set for a language. Returns an empty vector when
/// no rule set applies (caller falls through to line windows).
pub fn chunk_by_rules(content: &str, language: &str) -> Vec<RawChunk> {
    match language {
        "python" => chunk_python(content),
        "javascript" | "typescript" | "svelte" => chunk_javascript(content),
        "java" | "kotlin" | "csharp" | "scala" | "groovy" | "swift" | "dart" => {
            chunk_brace_language(content)
        }
        "rust" => chunk_rust(content),
        _ => Vec::new(),
    }
}

static PY_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)def\s+(\w+)\s*\(").unwrap());
static PY_ASYNC_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)async\s+def\s+(\w+)\s*\(").unwrap());
static PY_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s*)class\s+(\w+)").unwrap());

/// Indentation-based Python chunking: a `def`/`class` opens a block, a
/// non-comment line at the same or lower indent closes it.
fn chunk_python(content: &str) -> Vec<RawChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut current: Option<(ChunkKind, String, usize, usize)> = None; // kind, name, start, indent

    for (i, line) in lines.iter().enumerate() {
        let line_num = i + 1;

        let matched = PY_CLASS
            .captures(line)
            .map(|c| (ChunkKind::Class, c))
            .or_else(|| PY_ASYNC_DEF.captures(line).map(|c| (ChunkKind::Function, c)))
            .or_else(|| {
                PY_DEF.captures(line).map(|c| {
                    let kind = if c[1].is_empty() {
                        ChunkKind::Function
                    } else {
                        ChunkKind::Method
                    };
                    (kind, c)
                })
            });

        if let Some((kind, caps)) = matched {
            if let Some((k, name, start, _)) = current.take() {
                chunks.push(make_chunk(&lines, k, name, start, line_num - 1));
            }
            let indent = caps[1].len();
            current = Some((kind, caps[2].to_string(), line_num, indent));
            continue;
        }

        if let Some((_, _, _, indent)) = current {
            let trimmed = line.trim_start();
            if !trimmed.is_empty() && !trimmed.starts_with('#') && indent_of(line) <= indent {
                let (k, name, start, _) = current.take().unwrap();
                chunks.push(make_chunk(&lines, k, name, start, line_num - 1));
            }
        }
    }

    if let Some((k, name, start, _)) = current {
        chunks.push(make_chunk(&lines, k, name, start, lines.len()));
    }

    chunks
}

static JS_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)").unwrap());
static JS_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?\([^)]*\)\s*=>")
        .unwrap()
});
static JS_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:export\s+)?class\s+(\w+)").unwrap());
static JS_METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(?:async\s+)?(\w+)\s*\([^)]*\)\s*\{").unwrap());

/// Brace-counted JavaScript/TypeScript chunking with method extraction
/// inside classes.
fn chunk_javascript(content: &str) -> Vec<RawChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut brace_count: i64 = 0;
    let mut current: Option<(ChunkKind, String, usize)> = None;

    for (i, line) in lines.iter().enumerate() {
        let line_num = i + 1;

        if let Some(caps) = JS_CLASS.captures(line) {
            current = Some((ChunkKind::Class, caps[1].to_string(), line_num));
            brace_count = 0;
        } else if current.is_none() {
            if let Some(caps) = JS_FUNC.captures(line).or_else(|| JS_ARROW.captures(line)) {
                current = Some((ChunkKind::Function, caps[1].to_string(), line_num));
                brace_count = 0;
            }
        }

        if let Some((ChunkKind::Class, class_name, _)) = &current {
            if let Some(caps) = JS_METHOD.captures(line) {
                let method_name = format!("{}.{}", class_name, &caps[1]);
                let end = find_brace_end(&lines, i);
                chunks.push(make_chunk(
                    &lines,
                    ChunkKind::Method,
                    method_name,
                    line_num,
                    end,
                ));
            }
        }

        brace_count += brace_delta(line);

        if let Some((kind, name, start)) = &current {
            if brace_count <= 0 && line.contains('}') {
                chunks.push(make_chunk(&lines, *kind, name.clone(), *start, line_num));
                current = None;
                brace_count = 0;
            }
        }
    }

    if let Some((kind, name, start)) = current {
        chunks.push(make_chunk(&lines, kind, name, start, lines.len()));
    }

    chunks
}

static BRACE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:public|private|protected|internal|abstract|sealed|final|open)?\s*(?:static\s+)?(?:class|interface|enum|record|object|trait)\s+(\w+)",
    )
    .unwrap()
});
static BRACE_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:public|private|protected|internal|abstract|override|virtual|static|final|suspend|inline)?\s*(?:fun|func|void|[A-Z]\w*)\s+(\w+)\s*\(",
    )
    .unwrap()
});

/// Generic brace-language chunking (Java, Kotlin, Scala, Swift, …):
/// class declarations plus brace-counted method bodies.
fn chunk_brace_language(content: &str) -> Vec<RawChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut brace_count: i64 = 0;
    let mut current: Option<(String, usize)> = None;

    for (i, line) in lines.iter().enumerate() {
        let line_num = i + 1;

        if let Some(caps) = BRACE_CLASS.captures(line) {
            if let Some((name, start)) = current.take() {
                chunks.push(make_chunk(
                    &lines,
                    ChunkKind::Class,
                    name,
                    start,
                    line_num - 1,
                ));
            }
            current = Some((caps[1].to_string(), line_num));
        }

        if let Some(caps) = BRACE_METHOD.captures(line) {
            let end = find_brace_end(&lines, i);
            chunks.push(make_chunk(
                &lines,
                ChunkKind::Method,
                caps[1].to_string(),
                line_num,
                end,
            ));
        }

        brace_count += brace_delta(line);

        if let Some((name, start)) = &current {
            if brace_count <= 0 && line.contains('}') {
                chunks.push(make_chunk(
                    &lines,
                    ChunkKind::Class,
                    name.clone(),
                    *start,
                    line_num,
                ));
                current = None;
            }
        }
    }

    chunks
}

static RUST_FN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)").unwrap());
static RUST_STRUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)").unwrap());
static RUST_ENUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+(\w+)").unwrap());
static RUST_IMPL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*impl(?:<[^>]+>)?\s+(?:(\w+)\s+for\s+)?(\w+)").unwrap());

fn chunk_rust(content: &str) -> Vec<RawChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut brace_count: i64 = 0;
    let mut current: Option<(String, usize)> = None;

    for (i, line) in lines.iter().enumerate() {
        let line_num = i + 1;

        if current.is_none() {
            if let Some(caps) = RUST_STRUCT.captures(line).or_else(|| RUST_ENUM.captures(line)) {
                current = Some((caps[1].to_string(), line_num));
                brace_count = 0;
            }
        }

        if let Some(caps) = RUST_IMPL.captures(line) {
            let name = match caps.get(1) {
                Some(trait_name) => format!("{} for {}", trait_name.as_str(), &caps[2]),
                None => caps[2].to_string(),
            };
            current = Some((format!("impl {}", name), line_num));
            brace_count = 0;
        }

        if let Some(caps) = RUST_FN.captures(line) {
            let end = find_brace_end(&lines, i);
            chunks.push(make_chunk(
                &lines,
                ChunkKind::Function,
                caps[1].to_string(),
                line_num,
                end,
            ));
        }

        brace_count += brace_delta(line);

        if let Some((name, start)) = &current {
            if brace_count <= 0 && line.contains('}') {
                chunks.push(make_chunk(
                    &lines,
                    ChunkKind::Class,
                    name.clone(),
                    *start,
                    line_num,
                ));
                current = None;
            }
        }
    }

    chunks
}

/// Split content into overlapping line windows. A file that fits in one
/// window becomes a single `file` chunk named after its path.
pub fn chunk_by_lines(
    content: &str,
    relative_path: &str,
    max_lines: usize,
    overlap: usize,
) -> Vec<RawChunk> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() <= max_lines {
        return vec![RawChunk {
            kind: ChunkKind::File,
            name: relative_path.to_string(),
            start_line: 1,
            end_line: lines.len().max(1),
            content: content.to_string(),
        }];
    }

    let step = max_lines - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + max_lines).min(lines.len());
        chunks.push(RawChunk {
            kind: ChunkKind::Block,
            name: String::new(),
            start_line: start + 1,
            end_line: end,
            content: lines[start..end].join("\n"),
        });
        if end >= lines.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Split an oversized symbol into overlapping windows, preserving the
/// symbol's identity on every part; later parts get an ordinal suffix.
pub fn split_oversized(raw: &RawChunk, max_lines: usize, overlap: usize) -> Vec<RawChunk> {
    let lines: Vec<&str> = raw.content.lines().collect();
    let step = max_lines - overlap;
    let mut parts = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + max_lines).min(lines.len());
        let part_num = start / step + 1;
        let name = if part_num > 1 || end < lines.len() {
            format!("{} (part {})", raw.name, part_num)
        } else {
            raw.name.clone()
        };
        parts.push(RawChunk {
            kind: raw.kind,
            name,
            start_line: raw.start_line + start,
            end_line: raw.start_line + end - 1,
            content: lines[start..end].join("\n"),
        });
        if end >= lines.len() {
            break;
        }
        start += step;
    }
    parts
}

fn make_chunk(
    lines: &[&str],
    kind: ChunkKind,
    name: String,
    start: usize,
    end: usize,
) -> RawChunk {
    let start = start.max(1);
    let end = end.clamp(start, lines.len().max(1));
    RawChunk {
        kind,
        name,
        start_line: start,
        end_line: end,
        content: lines[start - 1..end.min(lines.len())].join("\n"),
    }
}

/// Line index (0-based) where the brace block opened at `start` closes.
/// Returns a 1-based line number.
fn find_brace_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i64 = 0;
    let mut seen_open = false;
    for (j, line) in lines.iter().enumerate().skip(start) {
        if line.contains('{') {
            seen_open = true;
        }
        depth += brace_delta(line);
        if seen_open && depth <= 0 && j > start {
            return j + 1;
        }
    }
    lines.len()
}

fn brace_delta(line: &str) -> i64 {
    let open = line.matches('{').count() as i64;
    let close = line.matches('}').count() as i64;
    open - close
}

fn indent_of(line: &str) -> usize {
    let mut count = 0;
    for ch in line.chars() {
        match ch {
            ' ' => count += 1,
            '\t' => count += 4,
            _ => break,
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_functions_and_methods() {
        let src = "def top():\n    return 1\n\nclass Greeter:\n    def greet(self):\n        return 2\n";
        let chunks = chunk_python(src);
        let names: Vec<&str> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"top"));
        assert!(names.contains(&"Greeter"));
        assert!(names.contains(&"greet"));
        let greet = chunks.iter().find(|c| c.name == "greet").unwrap();
        assert_eq!(greet.kind, ChunkKind::Method);
    }

    #[test]
    fn test_javascript_function_and_class() {
        let src = "function hello() {\n  return 1;\n}\n\nclass Widget {\n  render() {\n    return 2;\n  }\n}\n";
        let chunks = chunk_javascript(src);
        let names: Vec<&str> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"hello"));
        assert!(names.contains(&"Widget"));
        assert!(names.contains(&"Widget.render"));
    }

    #[test]
    fn test_kotlin_via_brace_rules() {
        let src = "class Engine {\n    fun start() {\n        ignite()\n    }\n}\n";
        let chunks = chunk_by_rules(src, "kotlin");
        let names: Vec<&str> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"Engine"));
        assert!(names.contains(&"start"));
    }

    #[test]
    fn test_unknown_language_has_no_rules() {
        assert!(chunk_by_rules("some text", "haskell").is_empty());
    }

    #[test]
    fn test_line_windows_small_file_is_single_file_chunk() {
        let chunks = chunk_by_lines("a\nb\nc", "notes.txt", 10, 2);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::File);
        assert_eq!(chunks[0].name, "notes.txt");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn test_line_windows_overlap() {
        let content: String = (1..=25).map(|i| format!("line{}\n", i)).collect();
        let chunks = chunk_by_lines(&content, "big.txt", 10, 2);
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 10);
        // Next window starts inside the previous one.
        assert_eq!(chunks[1].start_line, 9);
        assert_eq!(chunks.last().unwrap().end_line, 25);
    }

    #[test]
    fn test_split_oversized_keeps_identity() {
        let raw = RawChunk {
            kind: ChunkKind::Function,
            name: "huge".into(),
            start_line: 100,
            end_line: 111,
            content: (0..12)
                .map(|i| format!("l{}", i))
                .collect::<Vec<_>>()
                .join("\n"),
        };
        let parts = split_oversized(&raw, 8, 2);
        assert!(parts.len() >= 2);
        assert_eq!(parts[0].name, "huge (part 1)");
        assert_eq!(parts[1].name, "huge (part 2)");
        assert_eq!(parts[0].start_line, 100);
        // Overlap: part 2 starts before part 1 ends.
        assert!(parts[1].start_line <= parts[0].end_line);
        for p in &parts {
            assert_eq!(p.kind, ChunkKind::Function);
        }
    }
}
