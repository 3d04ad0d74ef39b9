//! Durable hybrid vector + metadata store.
//!
//! One SQLite database holds everything the engine persists:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │   chunks     │──┐  │   vectors    │     │      hashes       │
//! │              │  │  │              │     │                   │
//! │ chunk_id(PK) │  └──│ chunk_id(PK) │     │ project_root (PK) │
//! │ absolute_path│     │ embedding    │     │ absolute_path(PK) │
//! │ kind, name   │     └──────────────┘     │ hash              │
//! │ language     │                          └───────────────────┘
//! │ lines        │     ┌──────────────┐
//! │ content      │     │    config    │
//! │ calls, refs  │     │  key / value │
//! │ flags, parent│     └──────────────┘
//! └──────────────┘
//! ```
//!
//! Keeping the file-hash table in the same database as the chunks and
//! vectors removes the consistency hazard of sidecar files diverging
//! from the index: a chunk for path `P` exists iff `hashes` records
//! `P`'s current content hash.
//!
//! The embedding dimension is discovered from the provider on open and
//! persisted under the `embedding_dimension` config key. When a restart
//! detects a different dimension (model change), vectors, chunks, and
//! hashes are all dropped so the next indexing run rebuilds the store
//! consistently.

use globset::{Glob, GlobSetBuilder};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::embedder::{embed_batch, Embedder};
use crate::error::{IndexError, Result};
use crate::models::{
    is_non_code_language, relative_to, CallerInfo, Chunk, ChunkKind, SearchOptions, SearchResult,
};

const DIMENSION_KEY: &str = "embedding_dimension";

pub struct Store {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    embedding_workers: usize,
    migrated: bool,
    write_lock: Mutex<()>,
}

impl Store {
    /// Open (or create) the store at `db_path`.
    ///
    /// Runs an integrity check (a corrupt database is destroyed and
    /// recreated empty), then probes the embedder to detect the vector
    /// dimension and migrates if it changed since the last run.
    pub async fn open(
        db_path: &Path,
        embedder: Arc<dyn Embedder>,
        embedding_workers: usize,
    ) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }

        let mut pool = connect(db_path).await?;

        let intact: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|_| "corrupt".to_string());
        if intact != "ok" {
            warn!(path = %db_path.display(), "integrity check failed, recreating store");
            pool.close().await;
            remove_database_files(db_path);
            pool = connect(db_path).await?;
        }

        init_schema(&pool).await?;

        // Dimension discovery: the provider decides, the store adapts.
        let probe = embedder.embed("test").await?;
        let dimension = probe.len();

        let mut store = Self {
            pool,
            embedder,
            dimension,
            embedding_workers,
            migrated: false,
            write_lock: Mutex::new(()),
        };

        match store.get_config(DIMENSION_KEY).await? {
            Some(stored) if stored.parse::<usize>().ok() == Some(dimension) => {}
            Some(stored) => {
                warn!(
                    old = %stored,
                    new = dimension,
                    "embedding dimension changed, rebuilding store"
                );
                store.clear_all().await?;
                store
                    .set_config(DIMENSION_KEY, &dimension.to_string())
                    .await?;
                store.migrated = true;
            }
            None => {
                info!(dimension, "first start, persisting embedding dimension");
                store
                    .set_config(DIMENSION_KEY, &dimension.to_string())
                    .await?;
            }
        }

        Ok(store)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// True when this open dropped all data due to a dimension change.
    /// Callers use this to invalidate derived state (the caller index).
    pub fn migrated(&self) -> bool {
        self.migrated
    }

    /// Embed and upsert a batch of chunks in one transaction.
    ///
    /// Embedding happens before the transaction opens (it is the slow
    /// part and must not hold the writer lock); the row writes are
    /// atomic: any failure rolls the whole batch back.
    pub async fn add_chunks(&self, chunks: &[Chunk], cancel: &CancellationToken) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.embedding_text()).collect();
        let vectors = embed_batch(
            Arc::clone(&self.embedder),
            texts,
            self.embedding_workers,
            cancel,
        )
        .await?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (chunk_id, absolute_path, kind, name, language,
                                    start_line, end_line, content, calls, refs,
                                    is_exported, is_test, parent)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    absolute_path = excluded.absolute_path,
                    kind = excluded.kind,
                    name = excluded.name,
                    language = excluded.language,
                    start_line = excluded.start_line,
                    end_line = excluded.end_line,
                    content = excluded.content,
                    calls = excluded.calls,
                    refs = excluded.refs,
                    is_exported = excluded.is_exported,
                    is_test = excluded.is_test,
                    parent = excluded.parent
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.file_path)
            .bind(chunk.kind.as_str())
            .bind(&chunk.name)
            .bind(&chunk.language)
            .bind(chunk.start_line as i64)
            .bind(chunk.end_line as i64)
            .bind(&chunk.content)
            .bind(chunk.calls.join(","))
            .bind(chunk.references.join(","))
            .bind(chunk.is_exported)
            .bind(chunk.is_test)
            .bind(&chunk.parent)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM vectors WHERE chunk_id = ?")
                .bind(&chunk.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(encode_vector(vector))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove all chunks and vectors for a file, atomically.
    pub async fn delete_file_chunks(&self, absolute_path: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM vectors WHERE chunk_id IN (SELECT chunk_id FROM chunks WHERE absolute_path = ?)",
        )
        .bind(absolute_path)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM chunks WHERE absolute_path = ?")
            .bind(absolute_path)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Semantic search: k-NN over the vector table with filter headroom,
    /// then metadata filters and a name boost before the final cut.
    pub async fn search(
        &self,
        query: &str,
        cwd: &Path,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(IndexError::InvalidQuery("query must not be empty".into()));
        }

        let limit = if opts.limit == 0 { 5 } else { opts.limit };
        let k = (limit * 5).max(50);

        let query_vec = self.embedder.embed(query).await?;

        // Brute-force scan: exact cosine ranking over every stored vector.
        let rows = sqlx::query("SELECT chunk_id, embedding FROM vectors")
            .fetch_all(&self.pool)
            .await?;
        let mut scored: Vec<(String, f32)> = rows
            .iter()
            .map(|row| {
                let id: String = row.get("chunk_id");
                let blob: Vec<u8> = row.get("embedding");
                (id, similarity(&query_vec, &decode_vector(&blob)))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        let path_filter = match &opts.path {
            Some(p) if !p.is_empty() => Some(PathFilter::new(p, cwd)?),
            _ => None,
        };
        let language_filter = opts.language.as_deref().map(|l| l.to_lowercase());
        let kind_filter = opts
            .kind
            .as_deref()
            .map(|k| k.to_lowercase())
            .filter(|k| !k.is_empty() && k != "all");

        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|t| t.to_string())
            .collect();

        let mut candidates = Vec::new();
        for (chunk_id, similarity) in scored {
            if opts.min_similarity > 0.0 && similarity < opts.min_similarity {
                continue;
            }

            let Some(chunk) = self.chunk_by_id(&chunk_id).await? else {
                continue;
            };

            if let Some(lang) = &language_filter {
                if chunk.language.to_lowercase() != *lang {
                    continue;
                }
            }
            if opts.code_only && is_non_code_language(&chunk.language.to_lowercase()) {
                continue;
            }
            if let Some(kind) = &kind_filter {
                if chunk.kind.as_str() != kind.as_str() {
                    continue;
                }
            }

            let relative = relative_to(cwd, &chunk.file_path);
            match &path_filter {
                Some(filter) => {
                    if !filter.matches(&chunk.file_path, relative.as_deref()) {
                        continue;
                    }
                }
                None => {
                    if relative.is_none() {
                        continue;
                    }
                }
            }

            let boosted = boost_by_name(similarity, &chunk.name, &terms);
            let file_path = relative.unwrap_or_else(|| chunk.file_path.clone());
            candidates.push(SearchResult {
                file_path,
                absolute_path: chunk.file_path.clone(),
                chunk_type: chunk.kind.as_str().to_string(),
                name: chunk.name.clone(),
                lines: format!("{}-{}", chunk.start_line, chunk.end_line),
                content: chunk.content.clone(),
                similarity: boosted,
                language: chunk.language.clone(),
                usage: None,
            });
        }

        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);
        Ok(candidates)
    }

    /// Exact name lookup; at most one chunk.
    pub async fn get_chunk_by_name(&self, name: &str) -> Result<Option<Chunk>> {
        let row = sqlx::query("SELECT * FROM chunks WHERE name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_chunk(&r)))
    }

    /// All chunks whose `calls` list contains `symbol` exactly or as a
    /// dotted suffix (`obj.symbol`), deduplicated by caller name.
    pub async fn find_callers(
        &self,
        symbol: &str,
        max: usize,
        path_prefix: Option<&str>,
    ) -> Result<Vec<CallerInfo>> {
        self.find_in_symbol_list("calls", symbol, max, path_prefix, false)
            .await
    }

    /// All chunks whose `refs` list names `symbol`, excluding the symbol
    /// itself.
    pub async fn find_referencers(
        &self,
        symbol: &str,
        max: usize,
        path_prefix: Option<&str>,
    ) -> Result<Vec<CallerInfo>> {
        self.find_in_symbol_list("refs", symbol, max, path_prefix, true)
            .await
    }

    async fn find_in_symbol_list(
        &self,
        column: &str,
        symbol: &str,
        max: usize,
        path_prefix: Option<&str>,
        exclude_self: bool,
    ) -> Result<Vec<CallerInfo>> {
        let max = if max == 0 { 50 } else { max };
        let sql = format!(
            "SELECT name, absolute_path, start_line, language, is_test, parent, {col} \
             FROM chunks WHERE {col} LIKE ?",
            col = column
        );
        let rows = sqlx::query(&sql)
            .bind(format!("%{}%", symbol))
            .fetch_all(&self.pool)
            .await?;

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in rows {
            let name: String = row.get("name");
            if exclude_self && (name == symbol || name.ends_with(&format!(".{}", symbol))) {
                continue;
            }

            let list: String = row.get(column);
            let matched = list.split(',').map(str::trim).any(|entry| {
                entry == symbol || entry.ends_with(&format!(".{}", symbol))
            });
            if !matched {
                continue;
            }

            let absolute_path: String = row.get("absolute_path");
            if let Some(prefix) = path_prefix {
                if !path_has_prefix(&absolute_path, prefix) {
                    continue;
                }
            }

            if !seen.insert(name.clone()) {
                continue;
            }
            out.push(CallerInfo {
                name,
                file_path: absolute_path,
                line: row.get::<i64, _>("start_line") as usize,
                language: row.get("language"),
                is_test: row.get("is_test"),
                parent: row.get("parent"),
            });
            if out.len() >= max {
                break;
            }
        }
        Ok(out)
    }

    async fn chunk_by_id(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let row = sqlx::query("SELECT * FROM chunks WHERE chunk_id = ?")
            .bind(chunk_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_chunk(&r)))
    }

    /// Every chunk currently stored. Used to rebuild the caller index.
    pub async fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let rows = sqlx::query("SELECT * FROM chunks")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    pub async fn chunk_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn vector_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Drop all chunks, vectors, and hashes. Config survives.
    pub async fn clear_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM vectors").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM hashes").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ---- file-hash table ----

    pub async fn get_file_hash(&self, root: &str, path: &str) -> Result<Option<String>> {
        let hash = sqlx::query_scalar(
            "SELECT hash FROM hashes WHERE project_root = ? AND absolute_path = ?",
        )
        .bind(root)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash)
    }

    pub async fn set_file_hash(&self, root: &str, path: &str, hash: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO hashes (project_root, absolute_path, hash) VALUES (?, ?, ?)",
        )
        .bind(root)
        .bind(path)
        .bind(hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_file_hash(&self, root: &str, path: &str) -> Result<()> {
        sqlx::query("DELETE FROM hashes WHERE project_root = ? AND absolute_path = ?")
            .bind(root)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_project_hashes(&self, root: &str) -> Result<()> {
        sqlx::query("DELETE FROM hashes WHERE project_root = ?")
            .bind(root)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Diff the stored hashes for `root` against a freshly scanned
    /// `current` map, yielding `(added, modified, deleted)` paths.
    pub async fn changed_files(
        &self,
        root: &str,
        current: &HashMap<String, String>,
    ) -> Result<(Vec<String>, Vec<String>, Vec<String>)> {
        let rows = sqlx::query("SELECT absolute_path, hash FROM hashes WHERE project_root = ?")
            .bind(root)
            .fetch_all(&self.pool)
            .await?;
        let stored: HashMap<String, String> = rows
            .iter()
            .map(|r| (r.get("absolute_path"), r.get("hash")))
            .collect();

        let mut added = Vec::new();
        let mut modified = Vec::new();
        for (path, hash) in current {
            match stored.get(path) {
                None => added.push(path.clone()),
                Some(old) if old != hash => modified.push(path.clone()),
                Some(_) => {}
            }
        }

        let mut deleted: Vec<String> = stored
            .keys()
            .filter(|path| !current.contains_key(*path))
            .cloned()
            .collect();

        added.sort();
        modified.sort();
        deleted.sort();
        Ok((added, modified, deleted))
    }

    /// All indexed file paths for a root.
    pub async fn project_paths(&self, root: &str) -> Result<Vec<String>> {
        let paths = sqlx::query_scalar("SELECT absolute_path FROM hashes WHERE project_root = ?")
            .bind(root)
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }

    /// All project roots known to the store. The hashes table is the
    /// single authority here.
    pub async fn indexed_roots(&self) -> Result<Vec<String>> {
        let roots = sqlx::query_scalar("SELECT DISTINCT project_root FROM hashes ORDER BY 1")
            .fetch_all(&self.pool)
            .await?;
        Ok(roots)
    }

    // ---- config table ----

    pub async fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(IndexError::Store)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

fn remove_database_files(db_path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut path = db_path.as_os_str().to_owned();
        path.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(path));
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            chunk_id      TEXT PRIMARY KEY,
            absolute_path TEXT NOT NULL,
            kind          TEXT NOT NULL,
            name          TEXT NOT NULL,
            language      TEXT NOT NULL,
            start_line    INTEGER NOT NULL,
            end_line      INTEGER NOT NULL,
            content       TEXT NOT NULL,
            calls         TEXT NOT NULL DEFAULT '',
            refs          TEXT NOT NULL DEFAULT '',
            is_exported   INTEGER NOT NULL DEFAULT 0,
            is_test       INTEGER NOT NULL DEFAULT 0,
            parent        TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(absolute_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_language ON chunks(language)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_kind ON chunks(kind)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_name ON chunks(name)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS vectors (chunk_id TEXT PRIMARY KEY, embedding BLOB NOT NULL)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hashes (
            project_root  TEXT NOT NULL,
            absolute_path TEXT NOT NULL,
            hash          TEXT NOT NULL,
            PRIMARY KEY (project_root, absolute_path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE TABLE IF NOT EXISTS config (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .execute(pool)
        .await?;

    Ok(())
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Chunk {
    let kind: String = row.get("kind");
    Chunk {
        id: row.get("chunk_id"),
        file_path: row.get("absolute_path"),
        kind: ChunkKind::parse(&kind).unwrap_or(ChunkKind::Block),
        name: row.get("name"),
        language: row.get("language"),
        start_line: row.get::<i64, _>("start_line") as usize,
        end_line: row.get::<i64, _>("end_line") as usize,
        content: row.get("content"),
        calls: split_list(row.get("calls")),
        references: split_list(row.get("refs")),
        is_exported: row.get("is_exported"),
        is_test: row.get("is_test"),
        parent: row.get("parent"),
    }
}

fn split_list(csv: String) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serialize a vector for the `vectors` BLOB column: packed
/// little-endian f32.
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`]. Trailing bytes that do not form a
/// whole f32 are dropped.
fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            f32::from_le_bytes(buf)
        })
        .collect()
}

/// Ranking score for a candidate. Query and stored vectors are both
/// unit length (the provider normalizes), so the dot product already is
/// the cosine similarity; a dimension mismatch scores zero.
fn similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() {
        return 0.0;
    }
    query.iter().zip(candidate).map(|(q, c)| q * c).sum()
}

/// Query-term substring boost: K of T lowercased query terms appearing
/// in the candidate name add `0.3 × K / T`, clamped to 1.0.
fn boost_by_name(similarity: f32, name: &str, terms: &[String]) -> f32 {
    if terms.is_empty() || name.is_empty() {
        return similarity;
    }
    let lower = name.to_lowercase();
    let matched = terms.iter().filter(|t| lower.contains(t.as_str())).count();
    if matched == 0 {
        return similarity;
    }
    (similarity + 0.3 * matched as f32 / terms.len() as f32).min(1.0)
}

/// Path filter: a glob when the pattern contains metacharacters,
/// otherwise a directory-prefix check against the absolute path.
struct PathFilter {
    glob: Option<globset::GlobSet>,
    prefix: Option<String>,
}

impl PathFilter {
    fn new(pattern: &str, cwd: &Path) -> Result<Self> {
        let normalized = pattern.replace('\\', "/");
        if normalized.contains('*') || normalized.contains('?') || normalized.contains('[') {
            let mut builder = GlobSetBuilder::new();
            builder.add(Glob::new(&normalized)?);
            Ok(Self {
                glob: Some(builder.build()?),
                prefix: None,
            })
        } else {
            let abs = if Path::new(&normalized).is_absolute() {
                PathBuf::from(&normalized)
            } else {
                cwd.join(&normalized)
            };
            Ok(Self {
                glob: None,
                prefix: Some(abs.to_string_lossy().replace('\\', "/")),
            })
        }
    }

    fn matches(&self, absolute_path: &str, relative_path: Option<&str>) -> bool {
        if let Some(glob) = &self.glob {
            // Globs are evaluated against the cwd-relative path.
            let Some(rel) = relative_path else {
                return false;
            };
            return glob.is_match(rel.trim_start_matches("./"));
        }
        if let Some(prefix) = &self.prefix {
            return path_has_prefix(absolute_path, prefix);
        }
        true
    }
}

/// Component-boundary prefix check on forward-slash paths.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let path = path.replace('\\', "/");
    let prefix = prefix.trim_end_matches('/');
    if !path.starts_with(prefix) {
        return false;
    }
    path.len() == prefix.len() || path.as_bytes()[prefix.len()] == b'/'
}
