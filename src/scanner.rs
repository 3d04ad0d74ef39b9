//! File discovery and filtering.
//!
//! Walks a project tree and yields a de-duplicated list of
//! [`FileDescriptor`]s for everything worth indexing. Filtering happens
//! in layers: excluded directory basenames, per-directory `.gitignore`
//! files (a deeper ignore file overrides an ancestor for paths under
//! it), size and extension limits, and a null-byte probe that drops
//! binary files.
//!
//! Unreadable files or directories are skipped with a warning; a scan
//! never aborts on per-file errors.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::Config;
use crate::models::FileDescriptor;

pub struct Scanner<'a> {
    cfg: &'a Config,
    root: PathBuf,
}

impl<'a> Scanner<'a> {
    pub fn new(cfg: &'a Config, root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { cfg, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and return all indexable files, sorted by path for
    /// deterministic ordering.
    pub fn scan(&self) -> Vec<FileDescriptor> {
        let mut files = Vec::new();
        let mut ignore_stack = Vec::new();
        push_gitignore(&mut ignore_stack, &self.root);
        self.walk_dir(&self.root, &mut ignore_stack, &mut files);
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    fn walk_dir(
        &self,
        dir: &Path,
        ignore_stack: &mut Vec<Gitignore>,
        out: &mut Vec<FileDescriptor>,
    ) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping entry");
                    continue;
                }
            };

            if file_type.is_dir() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if self.cfg.is_excluded_dir(&name) {
                    continue;
                }
                if is_ignored(ignore_stack, &path, true) {
                    continue;
                }
                let pushed = push_gitignore(ignore_stack, &path);
                self.walk_dir(&path, ignore_stack, out);
                if pushed {
                    ignore_stack.pop();
                }
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            if let Some(descriptor) = self.describe_file(&path, ignore_stack) {
                out.push(descriptor);
            }
        }
    }

    fn describe_file(&self, path: &Path, ignore_stack: &[Gitignore]) -> Option<FileDescriptor> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                return None;
            }
        };

        let size = metadata.len();
        if size == 0 || size > self.cfg.max_file_size {
            return None;
        }

        let ext = extension_of(path);
        if self.cfg.is_excluded_ext(&ext) || !self.cfg.should_include_ext(&ext) {
            return None;
        }

        if is_ignored(ignore_stack, path, false) {
            return None;
        }

        match is_binary_file(path) {
            Ok(true) => return None,
            Ok(false) => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                return None;
            }
        }

        let hash = match hash_file(path) {
            Ok(h) => h,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unhashable file");
                return None;
            }
        };

        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        Some(FileDescriptor {
            path: path.to_string_lossy().into_owned(),
            relative_path: relative,
            size,
            hash,
            language: detect_language(path).to_string(),
        })
    }
}

/// Load `dir/.gitignore` onto the stack if present. Returns whether an
/// ignorer was pushed so the caller can pop it on the way out.
fn push_gitignore(stack: &mut Vec<Gitignore>, dir: &Path) -> bool {
    let gitignore_path = dir.join(".gitignore");
    if !gitignore_path.is_file() {
        return false;
    }
    let mut builder = GitignoreBuilder::new(dir);
    if builder.add(&gitignore_path).is_some() {
        return false;
    }
    match builder.build() {
        Ok(ignorer) => {
            stack.push(ignorer);
            true
        }
        Err(err) => {
            warn!(path = %gitignore_path.display(), error = %err, "failed to parse .gitignore");
            false
        }
    }
}

/// A path is ignored when the nearest ignore file that has an opinion
/// says so; deeper files take precedence over ancestors.
fn is_ignored(stack: &[Gitignore], path: &Path, is_dir: bool) -> bool {
    for ignorer in stack.iter().rev() {
        let matched = ignorer.matched(path, is_dir);
        if matched.is_ignore() {
            return true;
        }
        if matched.is_whitelist() {
            return false;
        }
    }
    false
}

/// Null-byte probe on the first 512 bytes.
pub fn is_binary_file(path: &Path) -> std::io::Result<bool> {
    let mut file = fs::File::open(path)?;
    let mut buf = [0u8; 512];
    let n = file.read(&mut buf)?;
    Ok(buf[..n].contains(&0))
}

/// Read file content, returning `None` for binary files.
pub fn read_text_file(path: &Path) -> std::io::Result<Option<String>> {
    if is_binary_file(path)? {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Detect the language tag for a path: extension map first, then known
/// filenames, falling back to `text`.
pub fn detect_language(path: &Path) -> &'static str {
    let ext = extension_of(path);
    if let Some(lang) = language_for_extension(&ext) {
        return lang;
    }

    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match basename.as_str() {
        "Makefile" => "bash",
        "Dockerfile" => "dockerfile",
        "Jenkinsfile" => "groovy",
        "BUILD" | "WORKSPACE" => "python",
        ".bashrc" | ".zshrc" => "bash",
        ".gitignore" => "text",
        _ => "text",
    }
}

fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext {
        ".go" => "go",
        ".py" | ".pyw" | ".pyx" => "python",
        ".js" | ".jsx" | ".mjs" | ".cjs" => "javascript",
        ".ts" | ".tsx" => "typescript",
        ".html" | ".htm" | ".vue" | ".xml" => "html",
        ".css" | ".scss" | ".sass" | ".less" => "css",
        ".svelte" => "svelte",
        ".c" | ".h" | ".m" => "c",
        ".cpp" | ".cc" | ".cxx" | ".hpp" | ".hxx" | ".mm" => "cpp",
        ".cs" => "csharp",
        ".java" => "java",
        ".kt" | ".kts" => "kotlin",
        ".scala" => "scala",
        ".groovy" | ".gvy" | ".gy" | ".gsh" => "groovy",
        ".rb" | ".erb" | ".rake" => "ruby",
        ".rs" => "rust",
        ".swift" => "swift",
        ".php" | ".phtml" => "php",
        ".sh" | ".bash" | ".zsh" | ".ps1" | ".psm1" | ".bat" | ".cmd" | ".env" => "bash",
        ".json" => "json",
        ".yaml" | ".yml" => "yaml",
        ".toml" | ".ini" => "toml",
        ".md" | ".markdown" => "markdown",
        ".rst" | ".txt" => "text",
        ".sql" => "sql",
        ".lua" => "lua",
        ".pl" | ".pm" => "perl",
        ".hs" => "haskell",
        ".ml" | ".mli" => "ocaml",
        ".ex" | ".exs" => "elixir",
        ".erl" => "erlang",
        ".elm" => "elm",
        ".clj" | ".cljs" => "clojure",
        ".dart" => "dart",
        ".zig" => "zig",
        ".nim" => "nim",
        ".v" => "vlang",
        ".cue" => "cue",
        ".proto" => "protobuf",
        ".tf" | ".tfvars" | ".hcl" => "hcl",
        ".r" => "r",
        _ => return None,
    };
    Some(lang)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_finds_files_with_hashes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/main.rs", "fn main() {}");
        write(tmp.path(), "README.md", "# readme");

        let cfg = Config::default();
        let scanner = Scanner::new(&cfg, tmp.path()).unwrap();
        let files = scanner.scan();

        assert_eq!(files.len(), 2);
        for f in &files {
            assert_eq!(f.hash.len(), 64);
            assert!(Path::new(&f.path).is_absolute());
        }
        let rust = files.iter().find(|f| f.relative_path == "src/main.rs");
        assert_eq!(rust.unwrap().language, "rust");
    }

    #[test]
    fn test_scan_skips_excluded_dirs() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/lib.rs", "pub fn a() {}");
        write(tmp.path(), "node_modules/pkg/index.js", "module.exports = 1");
        write(tmp.path(), "target/debug/out.rs", "fn b() {}");

        let cfg = Config::default();
        let scanner = Scanner::new(&cfg, tmp.path()).unwrap();
        let files = scanner.scan();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "src/lib.rs");
    }

    #[test]
    fn test_scan_skips_empty_and_oversize() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "empty.rs", "");
        write(tmp.path(), "ok.rs", "fn ok() {}");
        let big = "x".repeat(64);
        write(tmp.path(), "big.rs", &big);

        let mut cfg = Config::default();
        cfg.max_file_size = 63;
        let scanner = Scanner::new(&cfg, tmp.path()).unwrap();
        let files = scanner.scan();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "ok.rs");
    }

    #[test]
    fn test_max_file_size_is_inclusive() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "exact.rs", &"y".repeat(64));
        write(tmp.path(), "over.rs", &"y".repeat(65));

        let mut cfg = Config::default();
        cfg.max_file_size = 64;
        let scanner = Scanner::new(&cfg, tmp.path()).unwrap();
        let files = scanner.scan();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "exact.rs");
    }

    #[test]
    fn test_scan_skips_binary() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("blob.rs"), b"fn a() {}\x00\x01\x02").unwrap();
        write(tmp.path(), "text.rs", "fn b() {}");

        let cfg = Config::default();
        let scanner = Scanner::new(&cfg, tmp.path()).unwrap();
        let files = scanner.scan();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "text.rs");
    }

    #[test]
    fn test_gitignore_honored() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".gitignore", "generated/\n*.log\n");
        write(tmp.path(), "src/lib.rs", "pub fn a() {}");
        write(tmp.path(), "generated/out.rs", "fn gen() {}");
        write(tmp.path(), "trace.log", "log line");

        let cfg = Config::default();
        let scanner = Scanner::new(&cfg, tmp.path()).unwrap();
        let files = scanner.scan();

        let rels: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert!(rels.contains(&"src/lib.rs"));
        assert!(!rels.iter().any(|r| r.starts_with("generated/")));
        assert!(!rels.contains(&"trace.log"));
    }

    #[test]
    fn test_nested_gitignore_overrides_ancestor() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".gitignore", "*.gen.rs\n");
        write(tmp.path(), "sub/.gitignore", "!keep.gen.rs\n");
        write(tmp.path(), "a.gen.rs", "fn a() {}");
        write(tmp.path(), "sub/keep.gen.rs", "fn keep() {}");
        write(tmp.path(), "sub/drop.gen.rs", "fn drop_me() {}");

        let cfg = Config::default();
        let scanner = Scanner::new(&cfg, tmp.path()).unwrap();
        let files = scanner.scan();

        let rels: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert!(!rels.contains(&"a.gen.rs"));
        assert!(rels.contains(&"sub/keep.gen.rs"));
        assert!(!rels.contains(&"sub/drop.gen.rs"));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("a/b/c.rs")), "rust");
        assert_eq!(detect_language(Path::new("x.py")), "python");
        assert_eq!(detect_language(Path::new("x.tsx")), "typescript");
        assert_eq!(detect_language(Path::new("Dockerfile")), "dockerfile");
        assert_eq!(detect_language(Path::new("Makefile")), "bash");
        assert_eq!(detect_language(Path::new("unknown.xyz")), "text");
    }
}
