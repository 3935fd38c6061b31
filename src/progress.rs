//! Sync progress reporting.
//!
//! The synchronizer emits one event per phase transition plus per-file
//! ticks while uploading and deleting. Progress goes to **stderr** so
//! stdout stays parseable for scripts.

use std::io::Write;

/// Phase of the sync pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncPhase {
    /// Walking the filesystem; total unknown.
    Scanning,
    /// Hashing local files and diffing against the index.
    Comparing,
    /// Upserting changed files.
    Uploading,
    /// Removing files no longer on disk.
    Deleting,
    /// Final summary.
    Done,
}

impl SyncPhase {
    fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Scanning => "scanning",
            SyncPhase::Comparing => "comparing",
            SyncPhase::Uploading => "uploading",
            SyncPhase::Deleting => "deleting",
            SyncPhase::Done => "done",
        }
    }
}

/// A single progress event.
#[derive(Clone, Debug)]
pub struct SyncProgressEvent {
    pub phase: SyncPhase,
    /// Items completed in this phase.
    pub processed: u64,
    /// Items this phase will handle (0 while unknown).
    pub total: u64,
    /// Path currently being processed, when applicable.
    pub current: Option<String>,
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait SyncProgress: Send + Sync {
    fn report(&self, event: &SyncProgressEvent);
}

/// Human-friendly progress: `sync  uploading  12 / 40  src/lib.rs`.
pub struct HumanProgress;

impl SyncProgress for HumanProgress {
    fn report(&self, event: &SyncProgressEvent) {
        let mut line = format!("sync  {}", event.phase.as_str());
        if event.total > 0 {
            line.push_str(&format!("  {} / {}", event.processed, event.total));
        }
        if let Some(current) = &event.current {
            line.push_str("  ");
            line.push_str(current);
        }
        line.push('\n');
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgress for JsonProgress {
    fn report(&self, event: &SyncProgressEvent) {
        let obj = serde_json::json!({
            "event": "progress",
            "phase": event.phase.as_str(),
            "processed": event.processed,
            "total": event.total,
            "current": event.current,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgress for NoProgress {
    fn report(&self, _event: &SyncProgressEvent) {}
}
