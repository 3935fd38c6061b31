//! Live filesystem watcher feeding the store.
//!
//! Subscribes to a directory with the same ignore rules as the walker and
//! turns raw notify events into debounced store operations:
//!
//! - Events for a path reset that path's 300 ms debounce timer; only the
//!   last event within the window fires.
//! - Before indexing, the file is polled every 100 ms until its size and
//!   mtime have held still for a continuous 500 ms, so half-written files
//!   are not embedded.
//! - Removals delete the path from the store.
//!
//! Distinct paths may be processed concurrently; per-path ordering comes
//! from the debounce map replacing any in-flight timer for the same path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::WatcherError;
use crate::hash::hash_content;
use crate::store::VectorStore;
use crate::walker::IgnoreRules;

/// Debounce window per path.
const DEBOUNCE: Duration = Duration::from_millis(300);
/// Continuous unchanged span required before a write counts as finished.
const WRITE_SETTLE: Duration = Duration::from_millis(500);
/// Poll interval while waiting for a write to settle.
const WRITE_POLL: Duration = Duration::from_millis(100);

/// A change observed on disk, relative to the watched root.
#[derive(Debug, Clone)]
enum FileEvent {
    /// Created or modified: re-read and upsert.
    Changed(PathBuf),
    /// Removed: delete from the store.
    Removed(PathBuf),
}

/// Watches a directory and mirrors changes into the store.
pub struct FileWatcher {
    root: PathBuf,
    store: Arc<VectorStore>,
    // Kept alive for the duration of the watch; dropping it unsubscribes.
    _watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(root: impl Into<PathBuf>, store: Arc<VectorStore>) -> Self {
        Self {
            root: root.into(),
            store,
            _watcher: None,
        }
    }

    /// Start watching and processing events until `shutdown` resolves.
    ///
    /// Pending debounce timers are dropped on shutdown; no further store
    /// mutations are issued after this returns.
    pub async fn run(mut self, shutdown: impl std::future::Future<Output = ()>) -> Result<(), WatcherError> {
        let (tx, mut rx) = mpsc::channel::<FileEvent>(256);

        let watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for file_event in convert_event(event) {
                        // Best-effort send; a full channel drops the event.
                        let _ = tx.blocking_send(file_event);
                    }
                }
                Err(e) => warn!("watch event error: {}", e),
            }
        })
        .map_err(|e| WatcherError::Create(e.to_string()))?;

        self._watcher = Some(watcher);
        if let Some(watcher) = self._watcher.as_mut() {
            watcher
                .watch(&self.root, RecursiveMode::Recursive)
                .map_err(|e| WatcherError::Watch(e.to_string()))?;
        }
        info!("watching {} for changes", self.root.display());

        let rules = IgnoreRules::load(&self.root);
        let mut pending: HashMap<String, JoinHandle<()>> = HashMap::new();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    self.dispatch(event, &rules, &mut pending);
                }
            }
        }

        for (_, handle) in pending.drain() {
            handle.abort();
        }
        info!("stopped watching {}", self.root.display());
        Ok(())
    }

    /// Debounce by relative path: a new event cancels the pending timer for
    /// the same path and schedules a fresh one.
    fn dispatch(
        &self,
        event: FileEvent,
        rules: &IgnoreRules,
        pending: &mut HashMap<String, JoinHandle<()>>,
    ) {
        let absolute = match &event {
            FileEvent::Changed(p) | FileEvent::Removed(p) => p.clone(),
        };
        if rules.is_ignored(&absolute) {
            return;
        }
        let relative = rules.relative(&absolute);
        if relative.is_empty() {
            return;
        }

        if let Some(prior) = pending.remove(&relative) {
            prior.abort();
        }

        let store = self.store.clone();
        let key = relative.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE).await;
            match event {
                FileEvent::Removed(_) => {
                    if let Err(e) = store.delete_file(&key).await {
                        warn!("failed to remove {}: {}", key, e);
                    }
                }
                FileEvent::Changed(path) => {
                    settle_write(&path).await;
                    let Ok(metadata) = std::fs::metadata(&path) else {
                        // Gone between the event and the timer; treat as removal.
                        if let Err(e) = store.delete_file(&key).await {
                            warn!("failed to remove {}: {}", key, e);
                        }
                        return;
                    };
                    let content = match std::fs::read_to_string(&path) {
                        Ok(c) => c,
                        Err(e) => {
                            debug!("skipping {} (unreadable): {}", key, e);
                            return;
                        }
                    };
                    let hash = hash_content(&content);
                    let mtime = metadata
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
                        .map(|d| d.as_millis() as i64)
                        .unwrap_or(0);
                    if let Err(e) = store
                        .upsert_file(&key, &content, &hash, metadata.len(), mtime)
                        .await
                    {
                        warn!("failed to index {}: {}", key, e);
                    }
                }
            }
        });
        pending.insert(relative, handle);
    }
}

/// Poll until the file's size and mtime have held still for a continuous
/// [`WRITE_SETTLE`] span. Any observed change restarts the window, so a
/// file written in bursts is never picked up mid-write.
async fn settle_write(path: &std::path::Path) {
    let stat = |p: &std::path::Path| {
        std::fs::metadata(p)
            .ok()
            .map(|m| (m.len(), m.modified().ok()))
    };

    let mut last = stat(path);
    let mut stable = Duration::ZERO;
    while stable < WRITE_SETTLE {
        tokio::time::sleep(WRITE_POLL).await;
        let current = stat(path);
        if current == last {
            stable += WRITE_POLL;
        } else {
            stable = Duration::ZERO;
            last = current;
        }
    }
}

fn convert_event(event: Event) -> Vec<FileEvent> {
    let kind = event.kind;
    event
        .paths
        .into_iter()
        .filter_map(|path| match &kind {
            EventKind::Create(_) | EventKind::Modify(_) => Some(FileEvent::Changed(path)),
            EventKind::Remove(_) => Some(FileEvent::Removed(path)),
            _ => None,
        })
        .collect()
}
