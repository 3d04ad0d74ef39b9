//! Incremental index orchestration.
//!
//! The indexer is the sole mutator of the store and the caller index:
//! it drives full project indexing, watcher-triggered per-file updates,
//! and project removal. Full-project runs are single-flight (one
//! indexing operation at a time across all roots) while per-file
//! watcher updates only contend on the store's writer lock.
//!
//! Incremental behavior is hash-driven: the scan produces the current
//! `path → content hash` map, the store diffs it against the persisted
//! hash table, and only added, modified, and deleted paths are touched.
//! A file whose processing fails keeps its stale hash so the next run
//! retries it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::caller_index::CallerIndex;
use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::extractor::Extractor;
use crate::models::{chunk_id, Chunk, FileDescriptor, IndexSummary, ScanSummary};
use crate::progress::{ProgressEvent, ProgressKind, ProgressSink};
use crate::scanner::{read_text_file, Scanner};
use crate::store::Store;
use crate::watcher::{WatchController, WatchTarget};

pub struct Indexer {
    cfg: Arc<Config>,
    store: Arc<Store>,
    caller_index: Arc<CallerIndex>,
    extractor: Extractor,
    progress: Arc<dyn ProgressSink>,
    controller: StdMutex<Option<Arc<dyn WatchController>>>,
    single_flight: Mutex<()>,
}

impl Indexer {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<Store>,
        caller_index: Arc<CallerIndex>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let extractor = Extractor::new(cfg.max_chunk_lines, cfg.overlap_lines);
        Self {
            cfg,
            store,
            caller_index,
            extractor,
            progress,
            controller: StdMutex::new(None),
            single_flight: Mutex::new(()),
        }
    }

    /// Inject the watcher controller after construction; the watcher in
    /// turn receives this indexer as its [`WatchTarget`].
    pub fn set_watch_controller(&self, controller: Arc<dyn WatchController>) {
        *self.controller.lock().unwrap() = Some(controller);
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn caller_index(&self) -> &Arc<CallerIndex> {
        &self.caller_index
    }

    fn emit(&self, event: ProgressEvent) {
        self.progress.report(event);
    }

    /// Scan a root without indexing, reporting what a subsequent index
    /// run would do.
    pub async fn scan_project(&self, root: &Path) -> Result<ScanSummary> {
        let scanner = Scanner::new(&self.cfg, root).map_err(|e| IndexError::io(root, e))?;
        let root_key = scanner.root().to_string_lossy().into_owned();
        let files = scanner.scan();

        let mut current = HashMap::new();
        let mut by_language: HashMap<String, usize> = HashMap::new();
        let mut total_size = 0u64;
        for f in &files {
            current.insert(f.path.clone(), f.hash.clone());
            *by_language.entry(f.language.clone()).or_default() += 1;
            total_size += f.size;
        }

        let (added, modified, _) = self.store.changed_files(&root_key, &current).await?;
        Ok(ScanSummary {
            total_files: files.len(),
            total_size,
            new_files: added.len(),
            modified_files: modified.len(),
            unchanged_files: files.len() - added.len() - modified.len(),
            by_language,
        })
    }

    /// Full incremental index of a project root.
    pub async fn index_project(
        &self,
        root: &Path,
        enable_watch: bool,
        cancel: &CancellationToken,
    ) -> Result<IndexSummary> {
        let _flight = self.single_flight.lock().await;
        let started = Instant::now();

        let scanner = Scanner::new(&self.cfg, root).map_err(|e| IndexError::io(root, e))?;
        let root_path = scanner.root().to_path_buf();
        let root_key = root_path.to_string_lossy().into_owned();
        let project = project_name(&root_path);

        self.emit(ProgressEvent::new(
            ProgressKind::Scanning,
            &project,
            "Scanning folder for files...",
        ));

        let files = scanner.scan();
        let mut current = HashMap::new();
        let mut descriptors: HashMap<String, FileDescriptor> = HashMap::new();
        for f in files {
            current.insert(f.path.clone(), f.hash.clone());
            descriptors.insert(f.path.clone(), f);
        }

        let (added, modified, deleted) = self.store.changed_files(&root_key, &current).await?;
        let total_files = current.len();
        let unchanged = total_files - added.len() - modified.len();

        self.emit(
            ProgressEvent::new(
                ProgressKind::ScanComplete,
                &project,
                format!(
                    "Found {} files ({} new, {} modified, {} unchanged)",
                    total_files,
                    added.len(),
                    modified.len(),
                    unchanged
                ),
            )
            .with_counts(0, added.len() + modified.len()),
        );

        // Stale entries first: deleted files leave the index entirely,
        // modified files are cleared and re-added below.
        for path in &deleted {
            if let Err(err) = self.store.delete_file_chunks(path).await {
                warn!(%path, error = %err, "failed to delete chunks");
            }
            self.caller_index.remove_file_calls(path);
            self.store.remove_file_hash(&root_key, path).await?;
        }
        for path in &modified {
            if let Err(err) = self.store.delete_file_chunks(path).await {
                warn!(%path, error = %err, "failed to delete chunks");
            }
            self.caller_index.remove_file_calls(path);
        }

        let mut to_process: Vec<String> = Vec::with_capacity(added.len() + modified.len());
        to_process.extend(added.iter().cloned());
        to_process.extend(modified.iter().cloned());
        to_process.sort();
        let total = to_process.len();

        let mut files_indexed = 0usize;
        let mut chunks_stored = 0usize;

        for (i, path) in to_process.iter().enumerate() {
            if cancel.is_cancelled() {
                self.emit(
                    ProgressEvent::new(ProgressKind::Error, &project, "Indexing cancelled")
                        .with_error("cancelled"),
                );
                return Err(IndexError::Cancelled);
            }

            let descriptor = &descriptors[path];
            self.emit(
                ProgressEvent::new(
                    ProgressKind::Embedding,
                    &project,
                    format!("Embedding file {}/{}", i + 1, total),
                )
                .with_counts(i + 1, total)
                .with_file(&descriptor.relative_path),
            );

            match self.process_file(descriptor, cancel).await {
                Ok(chunks) => {
                    if !chunks.is_empty() {
                        for chunk in &chunks {
                            self.caller_index.add_chunk_calls(chunk);
                        }
                        chunks_stored += chunks.len();
                    }
                    self.store
                        .set_file_hash(&root_key, path, &descriptor.hash)
                        .await?;
                    files_indexed += 1;
                }
                Err(IndexError::Cancelled) => {
                    self.emit(
                        ProgressEvent::new(ProgressKind::Error, &project, "Indexing cancelled")
                            .with_error("cancelled"),
                    );
                    return Err(IndexError::Cancelled);
                }
                Err(err) => {
                    // Hash deliberately left stale so the next run retries.
                    warn!(%path, error = %err, "failed to process file");
                }
            }
        }

        if let Err(err) = self.caller_index.save() {
            warn!(error = %err, "failed to save caller index");
        }

        if enable_watch && self.cfg.watch_enabled {
            self.start_watcher(&root_path);
        }

        let elapsed = started.elapsed().as_millis();
        self.emit(
            ProgressEvent::new(
                ProgressKind::Complete,
                &project,
                format!(
                    "Indexing complete: {} files, {} chunks in {}ms",
                    files_indexed, chunks_stored, elapsed
                ),
            )
            .with_counts(total, total),
        );

        Ok(IndexSummary {
            project,
            files_indexed,
            chunks_stored,
            skipped: total_files - files_indexed,
            deleted: deleted.len(),
            time_taken_ms: elapsed,
        })
    }

    /// Read, extract, embed, and store one file. Empty and binary files
    /// yield no chunks.
    async fn process_file(
        &self,
        descriptor: &FileDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        let path = Path::new(&descriptor.path);
        let content = read_text_file(path)
            .map_err(|e| IndexError::io(path, e))?
            .unwrap_or_default();
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = self.extractor.extract(
            &content,
            &descriptor.language,
            &descriptor.path,
            &descriptor.relative_path,
        );
        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.id = chunk_id(&descriptor.path, i);
        }

        self.store.add_chunks(&chunks, cancel).await?;
        Ok(chunks)
    }

    /// Force a full rebuild of a root: stop its watcher, forget its
    /// hashes, and index from scratch.
    pub async fn reindex_project(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<IndexSummary> {
        let root_path = canonical(root);
        self.stop_watcher(&root_path);
        self.store
            .delete_project_hashes(&root_path.to_string_lossy())
            .await?;
        self.index_project(root, true, cancel).await
    }

    /// Remove every trace of a root from the index.
    pub async fn remove_project(&self, root: &Path) -> Result<()> {
        let root_path = canonical(root);
        let root_key = root_path.to_string_lossy().into_owned();
        self.stop_watcher(&root_path);

        for path in self.store.project_paths(&root_key).await? {
            if let Err(err) = self.store.delete_file_chunks(&path).await {
                warn!(%path, error = %err, "failed to delete chunks");
            }
            self.caller_index.remove_file_calls(&path);
        }
        self.store.delete_project_hashes(&root_key).await?;

        if let Err(err) = self.caller_index.save() {
            warn!(error = %err, "failed to save caller index");
        }
        Ok(())
    }

    /// Re-index one file after a watcher event. Old chunks are removed
    /// and new ones inserted; the store transaction keeps readers from
    /// seeing a partial state.
    pub async fn update_single_file(&self, root: &Path, file: &Path) -> Result<()> {
        let root_path = canonical(root);
        let file_path = canonical(file);
        let root_key = root_path.to_string_lossy().into_owned();
        let abs = file_path.to_string_lossy().into_owned();
        let relative = file_path
            .strip_prefix(&root_path)
            .unwrap_or(&file_path)
            .to_string_lossy()
            .replace('\\', "/");
        let project = project_name(&root_path);

        self.emit(
            ProgressEvent::new(
                ProgressKind::FileUpdate,
                &project,
                format!("Re-indexing: {}", relative),
            )
            .with_file(&relative),
        );

        self.store.delete_file_chunks(&abs).await?;
        self.caller_index.remove_file_calls(&abs);

        let content = match read_text_file(&file_path) {
            Ok(Some(content)) if !content.is_empty() => content,
            Ok(_) => return Ok(()), // empty or binary: chunks stay deleted
            Err(err) => return Err(IndexError::io(&file_path, err)),
        };

        let language = crate::scanner::detect_language(&file_path).to_string();
        let mut chunks = self.extractor.extract(&content, &language, &abs, &relative);
        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.id = chunk_id(&abs, i);
        }

        let cancel = CancellationToken::new();
        match self.store.add_chunks(&chunks, &cancel).await {
            Ok(()) => {}
            Err(err) => {
                self.emit(
                    ProgressEvent::new(
                        ProgressKind::FileUpdateError,
                        &project,
                        format!("Failed to re-index: {}", relative),
                    )
                    .with_file(&relative)
                    .with_error(err.to_string()),
                );
                return Err(err);
            }
        }

        for chunk in &chunks {
            self.caller_index.add_chunk_calls(chunk);
        }
        self.store
            .set_file_hash(&root_key, &abs, &crate::models::content_hash(content.as_bytes()))
            .await?;
        if let Err(err) = self.caller_index.save() {
            warn!(error = %err, "failed to save caller index");
        }

        self.emit(
            ProgressEvent::new(
                ProgressKind::FileUpdateComplete,
                &project,
                format!("Re-indexed: {} ({} chunks)", relative, chunks.len()),
            )
            .with_file(&relative),
        );
        Ok(())
    }

    /// Drop one file from the index after a watcher delete event.
    pub async fn delete_single_file(&self, file: &Path) -> Result<()> {
        let abs = file.to_string_lossy().into_owned();

        self.store.delete_file_chunks(&abs).await?;
        self.caller_index.remove_file_calls(&abs);

        for root in self.store.indexed_roots().await? {
            if !path_under(&abs, &root) {
                continue;
            }
            self.store.remove_file_hash(&root, &abs).await?;
            let prefix = format!("{}/", root.trim_end_matches('/'));
            let relative = abs.strip_prefix(prefix.as_str()).unwrap_or(&abs).to_string();
            self.emit(
                ProgressEvent::new(
                    ProgressKind::FileDeleted,
                    project_name(Path::new(&root)),
                    format!("Removed from index: {}", relative),
                )
                .with_file(&relative),
            );
            break;
        }
        Ok(())
    }

    /// Drop a whole subtree from the index after a directory removal.
    pub async fn delete_single_folder(&self, folder: &Path) -> Result<()> {
        let folder_key = folder.to_string_lossy().into_owned();

        for root in self.store.indexed_roots().await? {
            if !path_under(&folder_key, &root) {
                continue;
            }

            let mut removed = 0usize;
            for path in self.store.project_paths(&root).await? {
                if !path_under(&path, &folder_key) {
                    continue;
                }
                if let Err(err) = self.store.delete_file_chunks(&path).await {
                    warn!(%path, error = %err, "failed to delete chunks");
                }
                self.caller_index.remove_file_calls(&path);
                self.store.remove_file_hash(&root, &path).await?;
                removed += 1;
            }

            self.emit(
                ProgressEvent::new(
                    ProgressKind::FolderDeleted,
                    project_name(Path::new(&root)),
                    format!("Removed folder: {} ({} files)", folder_key, removed),
                )
                .with_file(&folder_key),
            );
            break;
        }
        Ok(())
    }

    /// Start watching a root without indexing it first.
    pub fn watch_project(&self, root: &Path) {
        self.start_watcher(&canonical(root));
    }

    fn start_watcher(&self, root: &Path) {
        let controller = self.controller.lock().unwrap().clone();
        match controller {
            Some(controller) => {
                if let Err(err) = controller.start(root) {
                    warn!(root = %root.display(), error = %err, "failed to start watcher");
                }
            }
            None => warn!(root = %root.display(), "no watch controller configured"),
        }
    }

    fn stop_watcher(&self, root: &Path) {
        if let Some(controller) = self.controller.lock().unwrap().clone() {
            controller.stop(root);
        }
    }
}

#[async_trait]
impl WatchTarget for Indexer {
    async fn update_file(&self, root: &Path, path: &Path) {
        if let Err(err) = self.update_single_file(root, path).await {
            warn!(path = %path.display(), error = %err, "watcher update failed");
        }
    }

    async fn delete_file(&self, path: &Path) {
        if let Err(err) = self.delete_single_file(path).await {
            warn!(path = %path.display(), error = %err, "watcher delete failed");
        }
    }

    async fn delete_folder(&self, path: &Path) {
        if let Err(err) = self.delete_single_folder(path).await {
            warn!(path = %path.display(), error = %err, "watcher folder delete failed");
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string_lossy().into_owned())
}

/// Component-boundary containment check on string paths.
fn path_under(path: &str, ancestor: &str) -> bool {
    let path = path.trim_end_matches('/');
    let ancestor = ancestor.trim_end_matches('/');
    if !path.starts_with(ancestor) {
        return false;
    }
    path.len() == ancestor.len() || path.as_bytes()[ancestor.len()] == b'/'
}
