//! Live filesystem watching.
//!
//! A [`Watcher`] subscribes to every directory under a project root
//! (excluded and ignored directories are skipped) and translates raw
//! filesystem events into indexer operations with debouncing: events
//! accumulate per path and flush after `debounce_ms` of quiescence. For
//! a given path the final event wins, with one exception: a write
//! followed by a delete (or vice versa) collapses to delete, so a burst
//! never leaves stale chunks behind.
//!
//! The watcher and the indexer each depend only on a trait the other
//! implements: the watcher drives a [`WatchTarget`] (the indexer) and
//! the indexer drives a [`WatchController`] (the manager), so neither
//! holds a concrete reference to the other.
//!
//! Directory deletions need special care: after a path is gone the
//! event no longer says whether it was a file or a directory, so the
//! watcher keeps the set of directories it subscribed to and consults
//! it when a removal arrives.

use async_trait::async_trait;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;

/// Operations the watcher invokes on the indexer.
#[async_trait]
pub trait WatchTarget: Send + Sync {
    async fn update_file(&self, root: &Path, path: &Path);
    async fn delete_file(&self, path: &Path);
    async fn delete_folder(&self, path: &Path);
}

/// Watcher lifecycle operations the indexer invokes.
pub trait WatchController: Send + Sync {
    fn start(&self, root: &Path) -> Result<()>;
    fn stop(&self, root: &Path);
    fn stop_all(&self);
    fn is_watching(&self, root: &Path) -> bool;
}

/// Net effect of an event burst for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingOp {
    Write,
    RemoveFile,
    RemoveDir,
}

struct WatcherState {
    root: PathBuf,
    cfg: Arc<Config>,
    ignorer: Option<Gitignore>,
    watched_dirs: StdMutex<HashSet<PathBuf>>,
}

impl WatcherState {
    fn should_exclude_dir(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.cfg.is_excluded_dir(&name) {
            return true;
        }
        if let Some(ignorer) = &self.ignorer {
            if ignorer.matched(path, true).is_ignore() {
                return true;
            }
        }
        false
    }

    fn should_process_file(&self, path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        if metadata.is_dir() || metadata.len() > self.cfg.max_file_size {
            return false;
        }

        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if self.cfg.is_excluded_ext(&ext) || !self.cfg.should_include_ext(&ext) {
            return false;
        }

        if let Some(ignorer) = &self.ignorer {
            if ignorer.matched(path, false).is_ignore() {
                return false;
            }
        }
        true
    }
}

/// A running watcher for one project root.
pub struct ProjectWatcher {
    cancel: CancellationToken,
    // Kept alive for the subscription; dropping it stops event delivery.
    _notify: Arc<StdMutex<RecommendedWatcher>>,
}

impl ProjectWatcher {
    /// Subscribe to `root` and start the debounce loop.
    pub fn start(
        root: PathBuf,
        cfg: Arc<Config>,
        target: Arc<dyn WatchTarget>,
    ) -> Result<Self> {
        let ignorer = load_root_gitignore(&root);
        let state = Arc::new(WatcherState {
            root: root.clone(),
            cfg,
            ignorer,
            watched_dirs: StdMutex::new(HashSet::new()),
        });

        let (tx, rx) = mpsc::unbounded_channel::<notify::Event>();
        let mut notify_watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                match result {
                    Ok(event) => {
                        let _ = tx.send(event);
                    }
                    Err(err) => warn!(error = %err, "filesystem event source error"),
                }
            })?;

        add_watches_recursive(&mut notify_watcher, &state, &root);
        let notify_watcher = Arc::new(StdMutex::new(notify_watcher));

        let cancel = CancellationToken::new();
        tokio::spawn(event_loop(
            rx,
            Arc::clone(&state),
            Arc::clone(&notify_watcher),
            target,
            cancel.clone(),
        ));

        Ok(Self {
            cancel,
            _notify: notify_watcher,
        })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ProjectWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn load_root_gitignore(root: &Path) -> Option<Gitignore> {
    let path = root.join(".gitignore");
    if !path.is_file() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(root);
    builder.add(&path);
    builder.build().ok()
}

fn add_watches_recursive(
    watcher: &mut RecommendedWatcher,
    state: &Arc<WatcherState>,
    dir: &Path,
) {
    let walker = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| {
            !entry.file_type().is_dir()
                || entry.path() == state.root
                || entry.path() == dir
                || !state.should_exclude_dir(entry.path())
        });

    for entry in walker.flatten() {
        if !entry.file_type().is_dir() {
            continue;
        }
        match watcher.watch(entry.path(), RecursiveMode::NonRecursive) {
            Ok(()) => {
                state
                    .watched_dirs
                    .lock()
                    .unwrap()
                    .insert(entry.path().to_path_buf());
            }
            Err(err) => {
                warn!(dir = %entry.path().display(), error = %err, "failed to watch directory");
            }
        }
    }
}

/// Debounced event pump: accumulate per-path operations, flush after
/// `debounce_ms` of quiescence.
async fn event_loop(
    mut rx: mpsc::UnboundedReceiver<notify::Event>,
    state: Arc<WatcherState>,
    notify_watcher: Arc<StdMutex<RecommendedWatcher>>,
    target: Arc<dyn WatchTarget>,
    cancel: CancellationToken,
) {
    let debounce = Duration::from_millis(state.cfg.debounce_ms.max(1));
    let mut pending: HashMap<PathBuf, PendingOp> = HashMap::new();

    loop {
        let timeout = tokio::time::sleep(debounce);
        tokio::pin!(timeout);

        tokio::select! {
            _ = cancel.cancelled() => return,
            event = rx.recv() => {
                match event {
                    Some(event) => queue_event(event, &state, &notify_watcher, &mut pending),
                    None => return,
                }
            }
            _ = &mut timeout, if !pending.is_empty() => {
                let batch = std::mem::take(&mut pending);
                flush(batch, &state, target.as_ref()).await;
            }
        }
    }
}

fn queue_event(
    event: notify::Event,
    state: &Arc<WatcherState>,
    notify_watcher: &Arc<StdMutex<RecommendedWatcher>>,
    pending: &mut HashMap<PathBuf, PendingOp>,
) {
    match event.kind {
        EventKind::Create(kind) => {
            for path in event.paths {
                if matches!(kind, CreateKind::Folder) || path.is_dir() {
                    // New directory: start watching it, nothing to index.
                    track_new_dir(state, notify_watcher, &path);
                    continue;
                }
                if state.should_process_file(&path) {
                    merge(pending, path, PendingOp::Write);
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => {
                for path in event.paths {
                    merge(pending, path.clone(), removal_op(state, &path));
                }
            }
            RenameMode::To => {
                for path in event.paths {
                    if path.is_dir() {
                        track_new_dir(state, notify_watcher, &path);
                    } else if state.should_process_file(&path) {
                        merge(pending, path, PendingOp::Write);
                    }
                }
            }
            RenameMode::Both => {
                if let [from, to] = event.paths.as_slice() {
                    merge(pending, from.clone(), removal_op(state, from));
                    if to.is_dir() {
                        track_new_dir(state, notify_watcher, to);
                    } else if state.should_process_file(to) {
                        merge(pending, to.clone(), PendingOp::Write);
                    }
                }
            }
            _ => {
                for path in event.paths {
                    if path.exists() {
                        if state.should_process_file(&path) {
                            merge(pending, path, PendingOp::Write);
                        }
                    } else {
                        merge(pending, path.clone(), removal_op(state, &path));
                    }
                }
            }
        },
        EventKind::Modify(_) => {
            for path in event.paths {
                if state.should_process_file(&path) {
                    merge(pending, path, PendingOp::Write);
                }
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths {
                merge(pending, path.clone(), removal_op(state, &path));
            }
        }
        _ => {}
    }
}

fn track_new_dir(
    state: &Arc<WatcherState>,
    notify_watcher: &Arc<StdMutex<RecommendedWatcher>>,
    path: &Path,
) {
    if state.should_exclude_dir(path) {
        return;
    }
    let mut watcher = notify_watcher.lock().unwrap();
    add_watches_recursive(&mut watcher, state, path);
}

fn removal_op(state: &Arc<WatcherState>, path: &Path) -> PendingOp {
    let mut dirs = state.watched_dirs.lock().unwrap();
    if dirs.remove(path) {
        PendingOp::RemoveDir
    } else {
        PendingOp::RemoveFile
    }
}

/// Merge an operation into the pending map: last writer wins, except
/// that a delete always beats a write.
fn merge(pending: &mut HashMap<PathBuf, PendingOp>, path: PathBuf, op: PendingOp) {
    match pending.get(&path) {
        Some(PendingOp::RemoveFile) | Some(PendingOp::RemoveDir) if op == PendingOp::Write => {
            // Delete wins over a subsequent write notification.
        }
        _ => {
            pending.insert(path, op);
        }
    }
}

async fn flush(
    batch: HashMap<PathBuf, PendingOp>,
    state: &Arc<WatcherState>,
    target: &dyn WatchTarget,
) {
    for (path, op) in batch {
        match op {
            PendingOp::Write => {
                debug!(path = %path.display(), "file changed");
                target.update_file(&state.root, &path).await;
            }
            PendingOp::RemoveFile => {
                debug!(path = %path.display(), "file removed");
                target.delete_file(&path).await;
            }
            PendingOp::RemoveDir => {
                debug!(path = %path.display(), "folder removed");
                target.delete_folder(&path).await;
            }
        }
    }
}

/// Owns one watcher per project root. Starting a root that is already
/// watched replaces the old watcher.
pub struct WatcherManager {
    cfg: Arc<Config>,
    target: Arc<dyn WatchTarget>,
    watchers: StdMutex<HashMap<PathBuf, ProjectWatcher>>,
}

impl WatcherManager {
    pub fn new(cfg: Arc<Config>, target: Arc<dyn WatchTarget>) -> Self {
        Self {
            cfg,
            target,
            watchers: StdMutex::new(HashMap::new()),
        }
    }
}

impl WatchController for WatcherManager {
    fn start(&self, root: &Path) -> Result<()> {
        let watcher = ProjectWatcher::start(
            root.to_path_buf(),
            Arc::clone(&self.cfg),
            Arc::clone(&self.target),
        )?;

        let mut watchers = self.watchers.lock().unwrap();
        if let Some(old) = watchers.insert(root.to_path_buf(), watcher) {
            old.stop();
        }
        Ok(())
    }

    fn stop(&self, root: &Path) {
        let mut watchers = self.watchers.lock().unwrap();
        if let Some(watcher) = watchers.remove(root) {
            watcher.stop();
        }
    }

    fn stop_all(&self) {
        let mut watchers = self.watchers.lock().unwrap();
        for (_, watcher) in watchers.drain() {
            watcher.stop();
        }
    }

    fn is_watching(&self, root: &Path) -> bool {
        self.watchers.lock().unwrap().contains_key(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_last_writer_wins() {
        let mut pending = HashMap::new();
        merge(&mut pending, PathBuf::from("/a"), PendingOp::Write);
        merge(&mut pending, PathBuf::from("/a"), PendingOp::Write);
        assert_eq!(pending[&PathBuf::from("/a")], PendingOp::Write);
    }

    #[test]
    fn test_merge_delete_wins_over_write() {
        let mut pending = HashMap::new();
        merge(&mut pending, PathBuf::from("/a"), PendingOp::Write);
        merge(&mut pending, PathBuf::from("/a"), PendingOp::RemoveFile);
        assert_eq!(pending[&PathBuf::from("/a")], PendingOp::RemoveFile);

        // And the write arriving after the delete does not resurrect it.
        merge(&mut pending, PathBuf::from("/a"), PendingOp::Write);
        assert_eq!(pending[&PathBuf::from("/a")], PendingOp::RemoveFile);
    }

    #[test]
    fn test_merge_tracks_paths_independently() {
        let mut pending = HashMap::new();
        merge(&mut pending, PathBuf::from("/a"), PendingOp::Write);
        merge(&mut pending, PathBuf::from("/b"), PendingOp::RemoveDir);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[&PathBuf::from("/b")], PendingOp::RemoveDir);
    }
}
