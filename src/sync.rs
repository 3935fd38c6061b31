//! Synchronizer: three-way diff between the filesystem and the store.
//!
//! # Pipeline
//!
//! 1. **Scanning** — drain the walker into a local snapshot.
//! 2. **Comparing** — hash every local file and diff against the indexed
//!    `path → hash` map: equal hash → skip, differing or missing → upload;
//!    indexed paths absent locally → delete.
//! 3. **Uploading** — fan upserts out under a bounded semaphore
//!    (default width 10). Per-file failures are recorded and never abort
//!    the batch; every successful upsert persists, so partial progress
//!    survives interruption.
//! 4. **Deleting** — sequential removals with the same error policy.
//! 5. **Done** — emit the final report.
//!
//! Dry-run performs the scan and diff but skips all mutations, reporting
//! the counts that a real run would produce.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::hash::hash_content;
use crate::models::WalkedFile;
use crate::progress::{NoProgress, SyncPhase, SyncProgress, SyncProgressEvent};
use crate::runtime::Clock;
use crate::store::{Upsert, VectorStore};
use crate::walker::FileWalker;

/// Default number of concurrent upserts.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Options for one sync run.
#[derive(Clone)]
pub struct SyncOptions {
    /// Diff and report without mutating the store.
    pub dry_run: bool,
    /// Width of the upload semaphore.
    pub concurrency: usize,
    /// Progress sink.
    pub progress: Arc<dyn SyncProgress>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: DEFAULT_CONCURRENCY,
            progress: Arc::new(NoProgress),
        }
    }
}

/// A per-file failure captured during sync.
#[derive(Debug, Clone)]
pub struct SyncFileError {
    pub path: String,
    pub message: String,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub uploaded: u64,
    pub deleted: u64,
    pub skipped: u64,
    pub errors: Vec<SyncFileError>,
    pub duration_ms: i64,
}

/// Diff the walker's view of the tree against the store and reconcile.
///
/// Never aborts on a per-file error; failures are collected in the report.
pub async fn sync(
    store: Arc<VectorStore>,
    walker: &FileWalker,
    clock: &dyn Clock,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let started = clock.now_millis();
    let progress = &options.progress;

    progress.report(&SyncProgressEvent {
        phase: SyncPhase::Scanning,
        processed: 0,
        total: 0,
        current: None,
    });
    let local = walker.walk()?;
    progress.report(&SyncProgressEvent {
        phase: SyncPhase::Scanning,
        processed: local.len() as u64,
        total: local.len() as u64,
        current: None,
    });

    progress.report(&SyncProgressEvent {
        phase: SyncPhase::Comparing,
        processed: 0,
        total: local.len() as u64,
        current: None,
    });
    let indexed: HashMap<String, String> = store
        .list_files()
        .await
        .into_iter()
        .map(|f| (f.path, f.hash))
        .collect();

    let local_paths: HashSet<String> = local.iter().map(|f| f.path.clone()).collect();
    let mut uploads: Vec<(WalkedFile, String)> = Vec::new();
    let mut skipped = 0u64;

    for file in local {
        let hash = hash_content(&file.content);
        match indexed.get(&file.path) {
            Some(existing) if *existing == hash => skipped += 1,
            _ => uploads.push((file, hash)),
        }
    }

    let deletions: Vec<String> = indexed
        .keys()
        .filter(|path| !local_paths.contains(path.as_str()))
        .cloned()
        .collect();

    if options.dry_run {
        let report = SyncReport {
            uploaded: uploads.len() as u64,
            deleted: deletions.len() as u64,
            skipped,
            errors: Vec::new(),
            duration_ms: clock.now_millis() - started,
        };
        progress.report(&SyncProgressEvent {
            phase: SyncPhase::Done,
            processed: report.uploaded + report.deleted + report.skipped,
            total: report.uploaded + report.deleted + report.skipped,
            current: None,
        });
        return Ok(report);
    }

    // Uploading: bounded fan-out, errors captured per file.
    let upload_total = uploads.len() as u64;
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks: JoinSet<(String, Result<Upsert, String>)> = JoinSet::new();

    for (file, hash) in uploads {
        let store = store.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let outcome = store
                .upsert_file(&file.path, &file.content, &hash, file.size, file.last_modified)
                .await
                .map_err(|e| e.to_string());
            (file.path, outcome)
        });
    }

    let mut uploaded = 0u64;
    let mut errors: Vec<SyncFileError> = Vec::new();
    let mut upload_done = 0u64;

    while let Some(joined) = tasks.join_next().await {
        upload_done += 1;
        match joined {
            Ok((path, Ok(outcome))) => {
                match outcome {
                    Upsert::Updated => uploaded += 1,
                    Upsert::Unchanged => skipped += 1,
                }
                progress.report(&SyncProgressEvent {
                    phase: SyncPhase::Uploading,
                    processed: upload_done,
                    total: upload_total,
                    current: Some(path),
                });
            }
            Ok((path, Err(message))) => {
                warn!("failed to index {}: {}", path, message);
                errors.push(SyncFileError { path, message });
            }
            Err(join_err) => {
                errors.push(SyncFileError {
                    path: String::new(),
                    message: format!("upload task panicked: {}", join_err),
                });
            }
        }
    }

    // Deleting: sequential, same error policy.
    let delete_total = deletions.len() as u64;
    let mut deleted = 0u64;
    for (i, path) in deletions.into_iter().enumerate() {
        match store.delete_file(&path).await {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("failed to delete {}: {}", path, e);
                errors.push(SyncFileError {
                    path: path.clone(),
                    message: e.to_string(),
                });
            }
        }
        progress.report(&SyncProgressEvent {
            phase: SyncPhase::Deleting,
            processed: i as u64 + 1,
            total: delete_total,
            current: Some(path),
        });
    }

    let report = SyncReport {
        uploaded,
        deleted,
        skipped,
        errors,
        duration_ms: clock.now_millis() - started,
    };

    info!(
        "sync finished: {} uploaded, {} deleted, {} skipped, {} errors in {} ms",
        report.uploaded,
        report.deleted,
        report.skipped,
        report.errors.len(),
        report.duration_ms
    );
    progress.report(&SyncProgressEvent {
        phase: SyncPhase::Done,
        processed: report.uploaded + report.deleted + report.skipped,
        total: report.uploaded + report.deleted + report.skipped,
        current: None,
    });

    Ok(report)
}
