//! Inverted caller index: `called symbol → callers`, answering
//! "who calls X" in O(1 + result size) without touching the store.
//!
//! File paths repeat across thousands of entries, so callers are stored
//! compactly with an index into a shared path table. The whole structure
//! is persisted as a single bincode snapshot written atomically via
//! temp-file-plus-rename, guarded by a cross-process advisory lock file
//! (create-exclusive, owner PID inside, stale after 60 s). A legacy JSON
//! snapshot found at load time is discarded; the next indexing run
//! rebuilds the index (it is always rebuildable from the store).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{IndexError, Result};
use crate::models::{CallerInfo, Chunk};

const STALE_LOCK_AGE: Duration = Duration::from_secs(60);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const LOCK_MAX_RETRIES: u32 = 50;

/// Space-efficient caller record; `path_idx` points into the path table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CompactCaller {
    name: String,
    path_idx: usize,
    line: usize,
    language: String,
    is_test: bool,
    parent: String,
}

#[derive(Serialize, Deserialize, Default)]
struct SnapshotData {
    path_table: Vec<String>,
    callers: HashMap<String, Vec<CompactCaller>>,
}

#[derive(Default)]
struct Inner {
    callers: HashMap<String, Vec<CompactCaller>>,
    path_table: Vec<String>,
    path_lookup: HashMap<String, usize>,
}

impl Inner {
    fn get_or_add_path(&mut self, path: &str) -> usize {
        if let Some(&idx) = self.path_lookup.get(path) {
            return idx;
        }
        let idx = self.path_table.len();
        self.path_table.push(path.to_string());
        self.path_lookup.insert(path.to_string(), idx);
        idx
    }

    fn path(&self, idx: usize) -> &str {
        self.path_table.get(idx).map(String::as_str).unwrap_or("")
    }

    /// Drop path-table entries no caller references and remap indices.
    fn compact_path_table(&mut self) {
        let mut used: HashSet<usize> = HashSet::new();
        for list in self.callers.values() {
            for caller in list {
                used.insert(caller.path_idx);
            }
        }
        if used.len() == self.path_table.len() {
            return;
        }

        let mut old_to_new: HashMap<usize, usize> = HashMap::new();
        let mut new_table = Vec::with_capacity(used.len());
        let mut new_lookup = HashMap::with_capacity(used.len());
        for (old_idx, path) in self.path_table.iter().enumerate() {
            if used.contains(&old_idx) {
                let new_idx = new_table.len();
                old_to_new.insert(old_idx, new_idx);
                new_lookup.insert(path.clone(), new_idx);
                new_table.push(path.clone());
            }
        }
        for list in self.callers.values_mut() {
            for caller in list.iter_mut() {
                caller.path_idx = old_to_new[&caller.path_idx];
            }
        }
        self.path_table = new_table;
        self.path_lookup = new_lookup;
    }
}

pub struct CallerIndex {
    inner: RwLock<Inner>,
    snapshot_path: PathBuf,
    legacy_path: PathBuf,
    lock_path: PathBuf,
}

impl CallerIndex {
    /// Create an index bound to its on-disk paths and load any existing
    /// snapshot. Load problems degrade to an empty index; the next
    /// indexing run repopulates it.
    pub fn new(snapshot_path: PathBuf, legacy_path: PathBuf, lock_path: PathBuf) -> Self {
        let index = Self {
            inner: RwLock::new(Inner::default()),
            snapshot_path,
            legacy_path,
            lock_path,
        };
        index.load();
        index
    }

    fn load(&self) {
        let _lock = match FileLock::acquire(&self.lock_path) {
            Ok(lock) => Some(lock),
            Err(err) => {
                warn!(error = %err, "loading caller index without file lock");
                None
            }
        };

        // A legacy JSON snapshot is discarded, never converted.
        if self.legacy_path.exists() {
            info!(path = %self.legacy_path.display(), "discarding legacy caller index");
            let _ = fs::remove_file(&self.legacy_path);
        }

        let bytes = match fs::read(&self.snapshot_path) {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        let data: SnapshotData = match bincode::deserialize(&bytes) {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "failed to decode caller index snapshot, starting empty");
                return;
            }
        };

        let mut inner = self.inner.write().unwrap();
        inner.path_lookup = data
            .path_table
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();
        inner.path_table = data.path_table;
        inner.callers = data.callers;
    }

    /// Persist the index atomically. Unreferenced path entries are
    /// compacted first.
    pub fn save(&self) -> Result<()> {
        let _lock = FileLock::acquire(&self.lock_path)?;

        let mut inner = self.inner.write().unwrap();
        inner.compact_path_table();

        let data = SnapshotData {
            path_table: inner.path_table.clone(),
            callers: inner.callers.clone(),
        };
        drop(inner);

        let bytes =
            bincode::serialize(&data).map_err(|e| IndexError::Snapshot(e.to_string()))?;

        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }
        let tmp_path = self.snapshot_path.with_extension("bin.tmp");
        fs::write(&tmp_path, &bytes).map_err(|e| IndexError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.snapshot_path)
            .map_err(|e| IndexError::io(&self.snapshot_path, e))?;
        Ok(())
    }

    /// Record every call this chunk makes. Unnamed chunks (blocks, file
    /// windows) never appear as callers.
    pub fn add_chunk_calls(&self, chunk: &Chunk) {
        if chunk.calls.is_empty() || chunk.name.is_empty() {
            return;
        }

        let mut inner = self.inner.write().unwrap();
        let path_idx = inner.get_or_add_path(&chunk.file_path);
        let caller = CompactCaller {
            name: chunk.name.clone(),
            path_idx,
            line: chunk.start_line,
            language: chunk.language.clone(),
            is_test: chunk.is_test,
            parent: chunk.parent.clone(),
        };

        for called in &chunk.calls {
            let called = called.trim();
            if called.is_empty() {
                continue;
            }
            inner
                .callers
                .entry(called.to_string())
                .or_default()
                .push(caller.clone());
        }
    }

    /// Remove every caller entry contributed by a file. Called before a
    /// file is re-indexed and when it is deleted.
    pub fn remove_file_calls(&self, absolute_path: &str) {
        let mut inner = self.inner.write().unwrap();
        let Some(&path_idx) = inner.path_lookup.get(absolute_path) else {
            return;
        };

        inner.callers.retain(|_, list| {
            list.retain(|caller| caller.path_idx != path_idx);
            !list.is_empty()
        });
    }

    /// Direct callers of a symbol: exact key plus any dotted key ending
    /// in `.symbol`, deduplicated by caller name.
    pub fn find_callers(&self, symbol: &str, max: usize) -> Vec<CallerInfo> {
        let inner = self.inner.read().unwrap();

        let mut compact: Vec<&CompactCaller> = Vec::new();
        if let Some(list) = inner.callers.get(symbol) {
            compact.extend(list.iter());
        }
        let dotted = format!(".{}", symbol);
        for (key, list) in &inner.callers {
            if key != symbol && key.ends_with(&dotted) {
                compact.extend(list.iter());
            }
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for caller in compact {
            if !seen.insert(caller.name.clone()) {
                continue;
            }
            out.push(CallerInfo {
                name: caller.name.clone(),
                file_path: inner.path(caller.path_idx).to_string(),
                line: caller.line,
                language: caller.language.clone(),
                is_test: caller.is_test,
                parent: caller.parent.clone(),
            });
            if max > 0 && out.len() >= max {
                break;
            }
        }
        out
    }

    /// Breadth-first caller traversal up to `depth` levels. Each symbol
    /// is visited at most once across the whole traversal; each level's
    /// caller list is capped at `per_level_cap`.
    pub fn find_callers_deep(
        &self,
        symbol: &str,
        depth: usize,
        per_level_cap: usize,
    ) -> HashMap<usize, Vec<CallerInfo>> {
        let depth = if depth == 0 { 3 } else { depth };
        let per_level_cap = if per_level_cap == 0 { 10 } else { per_level_cap };

        let mut result = HashMap::new();
        let mut current: Vec<String> = vec![symbol.to_string()];
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(symbol.to_string());

        for level in 1..=depth {
            let mut level_callers = Vec::new();
            let mut next: Vec<String> = Vec::new();

            for sym in &current {
                for caller in self.find_callers(sym, per_level_cap) {
                    if !seen.insert(caller.name.clone()) {
                        continue;
                    }
                    next.push(caller.name.clone());
                    level_callers.push(caller);
                }
            }

            level_callers.truncate(per_level_cap);
            if !level_callers.is_empty() {
                result.insert(level, level_callers);
            }
            if next.is_empty() {
                break;
            }
            current = next;
        }

        result
    }

    pub fn has_callers(&self, symbol: &str) -> bool {
        !self.find_callers(symbol, 1).is_empty()
    }

    pub fn has_test_caller(&self, symbol: &str) -> bool {
        self.find_callers(symbol, 0).iter().any(|c| c.is_test)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = Inner::default();
    }

    /// `(distinct symbols, total caller entries)`.
    pub fn stats(&self) -> (usize, usize) {
        let inner = self.inner.read().unwrap();
        let total = inner.callers.values().map(Vec::len).sum();
        (inner.callers.len(), total)
    }

    /// Rebuild the whole index from stored chunks.
    pub fn rebuild(&self, chunks: &[Chunk]) {
        self.clear();
        for chunk in chunks {
            self.add_chunk_calls(chunk);
        }
    }
}

/// Cross-process advisory lock: a create-exclusive file containing the
/// owner PID, evicted when older than 60 s.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }

        for _ in 0..LOCK_MAX_RETRIES {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
            {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if let Ok(meta) = fs::metadata(path) {
                        let stale = meta
                            .modified()
                            .ok()
                            .and_then(|m| m.elapsed().ok())
                            .map(|age| age > STALE_LOCK_AGE)
                            .unwrap_or(false);
                        if stale {
                            warn!(path = %path.display(), "removing stale caller index lock");
                            let _ = fs::remove_file(path);
                            continue;
                        }
                    }
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(err) => return Err(IndexError::io(path, err)),
            }
        }

        Err(IndexError::LockTimeout {
            waited_ms: LOCK_MAX_RETRIES as u64 * LOCK_RETRY_INTERVAL.as_millis() as u64,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
