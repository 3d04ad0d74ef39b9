use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded from TOML with every field defaulted
/// so an empty file (or no file at all) yields a working setup.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Location for all persistent state (database, caller index, lock).
    pub data_dir: PathBuf,

    /// Embedding provider base URL. The `OLLAMA_URL` environment
    /// variable overrides this.
    pub ollama_url: String,
    /// Embedding model name. The `EMBEDDING_MODEL` environment variable
    /// overrides this.
    pub embedding_model: String,
    /// Parallel embedding workers, clamped to `[1, 8]`.
    pub embedding_workers: usize,

    /// Auto-index the current directory on `cscout watch` startup.
    pub auto_index: bool,
    /// Enable the file-watcher subsystem.
    pub watch_enabled: bool,
    /// Quiescence period before flushing watcher events, in ms.
    pub debounce_ms: u64,
    /// Files larger than this many bytes are skipped.
    pub max_file_size: u64,
    /// Window size (lines) for fallback chunking and oversize splits.
    pub max_chunk_lines: usize,
    /// Overlap (lines) between consecutive windows.
    pub overlap_lines: usize,

    /// Directory basenames that are never scanned or watched.
    pub exclude_dirs: Vec<String>,
    /// File extensions that are never indexed (binary formats).
    pub exclude_exts: Vec<String>,
    /// When non-empty, only these extensions are indexed.
    pub include_exts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".codescout");

        Self {
            data_dir,
            ollama_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_workers: 4,
            auto_index: true,
            watch_enabled: true,
            debounce_ms: 500,
            max_file_size: 1024 * 1024,
            max_chunk_lines: 500,
            overlap_lines: 20,
            exclude_dirs: [
                ".git",
                ".hg",
                ".svn",
                "node_modules",
                "vendor",
                "__pycache__",
                ".venv",
                "venv",
                ".idea",
                ".vscode",
                "dist",
                "build",
                "target",
                ".next",
                ".nuxt",
                "coverage",
                ".pytest_cache",
                ".mypy_cache",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_exts: [
                // Binary / compiled
                ".exe", ".dll", ".so", ".dylib", ".a", ".o", ".obj", ".pyc", ".pyo", ".class",
                ".jar", ".war", // Archives
                ".zip", ".tar", ".gz", ".bz2", ".7z", ".rar", // Images
                ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".svg", ".webp",
                // Audio / video
                ".mp3", ".mp4", ".wav", ".avi", ".mov", ".mkv", // Documents
                ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", // Databases
                ".db", ".sqlite", ".sqlite3", // Lock files
                ".lock", // Other binary
                ".wasm", ".bin", ".dat",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            include_exts: Vec::new(),
        }
    }
}

impl Config {
    /// Path of the SQLite database holding chunks, vectors, hashes, and
    /// persisted config values.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("index.db")
    }

    /// Path of the binary caller-index snapshot.
    pub fn caller_index_path(&self) -> PathBuf {
        self.data_dir.join("caller_index.bin")
    }

    /// Path of the legacy JSON caller-index snapshot (discarded on load).
    pub fn legacy_caller_index_path(&self) -> PathBuf {
        self.data_dir.join("caller_index.json")
    }

    /// Path of the caller-index advisory lock file.
    pub fn caller_index_lock_path(&self) -> PathBuf {
        self.data_dir.join("caller_index.lock")
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }

    pub fn is_excluded_ext(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.exclude_exts.iter().any(|e| *e == ext)
    }

    pub fn should_include_ext(&self, ext: &str) -> bool {
        if self.include_exts.is_empty() {
            return true;
        }
        let ext = ext.to_lowercase();
        self.include_exts.iter().any(|e| *e == ext)
    }

    /// Embedding worker count clamped to the supported range.
    pub fn clamped_workers(&self) -> usize {
        self.embedding_workers.clamp(1, 8)
    }
}

/// Load configuration from a TOML file, apply environment overrides, and
/// validate.
///
/// A missing file is not an error; defaults are used so first-run
/// `cscout index` works with zero setup.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    if let Ok(url) = std::env::var("OLLAMA_URL") {
        if !url.is_empty() {
            config.ollama_url = url;
        }
    }
    if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
        if !model.is_empty() {
            config.embedding_model = model;
        }
    }

    if config.max_chunk_lines == 0 {
        anyhow::bail!("max_chunk_lines must be > 0");
    }
    if config.overlap_lines >= config.max_chunk_lines {
        anyhow::bail!("overlap_lines must be smaller than max_chunk_lines");
    }
    if config.max_file_size == 0 {
        anyhow::bail!("max_file_size must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.max_chunk_lines > cfg.overlap_lines);
        assert!(cfg.is_excluded_dir("node_modules"));
        assert!(cfg.is_excluded_dir(".git"));
        assert!(!cfg.is_excluded_dir("src"));
        assert!(cfg.is_excluded_ext(".PNG"));
        assert!(!cfg.is_excluded_ext(".rs"));
    }

    #[test]
    fn test_include_whitelist() {
        let mut cfg = Config::default();
        assert!(cfg.should_include_ext(".rs"));
        cfg.include_exts = vec![".go".into()];
        assert!(cfg.should_include_ext(".go"));
        assert!(!cfg.should_include_ext(".rs"));
    }

    #[test]
    fn test_worker_clamp() {
        let mut cfg = Config::default();
        cfg.embedding_workers = 0;
        assert_eq!(cfg.clamped_workers(), 1);
        cfg.embedding_workers = 99;
        assert_eq!(cfg.clamped_workers(), 8);
        cfg.embedding_workers = 3;
        assert_eq!(cfg.clamped_workers(), 3);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: Config = toml::from_str("debounce_ms = 100").unwrap();
        assert_eq!(cfg.debounce_ms, 100);
        assert_eq!(cfg.max_chunk_lines, 500);
        assert!(cfg.watch_enabled);
    }
}
