//! Core data models used throughout searchgrep.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the indexing and retrieval pipeline. The data lifecycle is:
//!
//! ```text
//! FileWalker → WalkedFile → upsert_file() → Document → chunk() → Chunk
//!                                                          ↓
//!                                                     embed() → Vec<f32>
//!                                                          ↓
//!                                                    search() → SearchResult
//! ```
//!
//! # Type Relationships
//!
//! - A **[`WalkedFile`]** is produced by the file walker before hashing or
//!   storage.
//! - A **[`Document`]** is the stored representation of one indexed file,
//!   carrying a content hash and its ordered chunks.
//! - A **[`Chunk`]** is a contiguous line range of a document with its own
//!   embedding vector.
//! - A **[`SearchResult`]** is returned by the retriever with a fused
//!   relevance score and line provenance.
//!
//! On-disk field names are camelCase so the persisted store file matches the
//! documented JSON schema.

use serde::{Deserialize, Serialize};

/// A file yielded by the walker before hashing and storage.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Repo-relative, POSIX-normalized path (unique key within a store).
    pub path: String,
    /// Full file text.
    pub content: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, epoch milliseconds.
    pub last_modified: i64,
}

/// A contiguous line range of a document with its own embedding.
///
/// `line_start` / `line_end` are 1-based inclusive indices into the parent
/// document; chunks are stored ordered by `line_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Substring of the parent document, newlines preserved.
    pub content: String,
    /// Dense vector over `"File: {path}\n\n{content}"`.
    pub embedding: Vec<f32>,
    /// First line of the chunk (1-based, inclusive).
    pub line_start: usize,
    /// Last line of the chunk (1-based, inclusive).
    pub line_end: usize,
}

/// One indexed file: full text, content hash, and its ordered chunks.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `id` | `"{path}-{hash}"`, unique per store |
/// | `path` | repo-relative POSIX path, unique key |
/// | `hash` | tagged fingerprint, e.g. `xxh64:…` or `sha256:…` |
/// | `embedding` | whole-file vector (first 2 KB, `File:` prefixed) |
/// | `chunks` | ordered by `line_start` |
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// `"{path}-{hash}"`.
    pub id: String,
    /// Repo-relative path, unique within a store.
    pub path: String,
    /// Tagged content fingerprint. A tag change (algorithm switch) reads as
    /// a content change and forces re-embedding.
    pub hash: String,
    /// Full file text.
    pub content: String,
    /// Coarse whole-file embedding (reserved; retrieval scores chunks).
    pub embedding: Vec<f32>,
    /// Number of lines in `content`.
    pub line_count: usize,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, epoch milliseconds.
    pub last_modified: i64,
    /// Chunks ordered by `line_start`.
    pub chunks: Vec<Chunk>,
}

/// Store-level metadata persisted alongside the documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetadata {
    /// Logical store name (also the file stem under the data dir).
    pub name: String,
    /// Creation time, epoch milliseconds.
    pub created: i64,
    /// Last successful mutation, epoch milliseconds. Monotonically
    /// non-decreasing.
    pub updated: i64,
}

/// The persisted store file: `{dataDir}/{storeName}.json`.
///
/// `schema_version` gates loading: files with a greater version are refused
/// rather than silently misread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFile {
    pub schema_version: u32,
    pub documents: Vec<Document>,
    pub metadata: StoreMetadata,
}

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Lightweight projection of a [`Document`] — no content, no embeddings.
///
/// Returned by `list_files` so the synchronizer can diff hashes without
/// paying for full documents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub path: String,
    pub hash: String,
    pub size: u64,
    pub last_modified: i64,
    pub chunk_count: usize,
}

/// Store summary for the `info` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    pub name: String,
    pub file_count: usize,
    pub total_size: u64,
    pub last_updated: i64,
}

/// A ranked retrieval hit: one chunk of one file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Path of the parent document.
    pub path: String,
    /// Fused relevance score: the RRF sum of the chunk's rank contributions.
    pub score: f64,
    /// Chunk text.
    pub chunk: String,
    /// First line of the chunk (1-based).
    pub line_start: usize,
    /// Last line of the chunk (1-based).
    pub line_end: usize,
    /// Full parent document text, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Document {
    /// Count lines the way the chunker does: `lines()` over the content.
    pub fn count_lines(content: &str) -> usize {
        content.lines().count()
    }
}
