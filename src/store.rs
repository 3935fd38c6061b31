//! Durable vector store: documents, chunks, embeddings, content hashes.
//!
//! One [`VectorStore`] owns one JSON file at `{dataDir}/{storeName}.json`
//! and a full in-memory image of it. Mutations (`upsert_file`,
//! `delete_file`, `clear`) rewrite the file atomically (temp + rename);
//! reads (`list_files`, `info`, retrieval) never touch disk.
//!
//! Loading is forgiving: a missing file is an empty store, and an
//! unreadable or invalid file is treated as empty with a warning — the
//! damaged file is left in place until the first successful mutation
//! persists a fresh image. A file with a newer `schemaVersion` is refused
//! outright so it cannot be silently rewritten by an older build.
//!
//! Concurrent upserts (the synchronizer fans out) embed outside the lock;
//! the in-memory image and the file write are serialized behind a single
//! write lock, so a store never interleaves two mutations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::chunk;
use crate::embedding::{EmbedKind, Embedder};
use crate::error::StoreError;
use crate::models::{
    Chunk, Document, FileMetadata, StoreFile, StoreInfo, StoreMetadata, SCHEMA_VERSION,
};
use crate::runtime::Clock;

/// Bytes of the document prefix used for the whole-file embedding.
const FILE_EMBED_PREFIX_BYTES: usize = 2048;

/// Outcome of an upsert: whether anything changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The stored hash matched; nothing was embedded or written.
    Unchanged,
    /// The document was (re)indexed and persisted.
    Updated,
}

/// A persistent collection of documents for one logical index.
pub struct VectorStore {
    path: PathBuf,
    inner: RwLock<StoreFile>,
    embedder: Arc<dyn Embedder>,
    clock: Arc<dyn Clock>,
}

impl VectorStore {
    /// Open (or create) the store named `name` under `data_dir`.
    pub fn open(
        data_dir: &Path,
        name: &str,
        embedder: Arc<dyn Embedder>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let path = data_dir.join(format!("{}.json", name));
        let inner = load_store_file(&path, name, clock.as_ref())?;
        Ok(Self {
            path,
            inner: RwLock::new(inner),
            embedder,
            clock,
        })
    }

    /// Path of the persisted store file.
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the document for `path`.
    ///
    /// If the stored hash equals `hash` this is a no-op: no embedding call,
    /// no write, `metadata.updated` untouched. Otherwise the content is
    /// chunked, all chunk texts are embedded in one batched call, the
    /// whole-file prefix is embedded separately, and the assembled document
    /// atomically replaces any prior entry for the path.
    pub async fn upsert_file(
        &self,
        path: &str,
        content: &str,
        hash: &str,
        size: u64,
        last_modified: i64,
    ) -> Result<Upsert, StoreError> {
        let expected_dims = {
            let store = self.inner.read().await;
            if let Some(existing) = store.documents.iter().find(|d| d.path == path) {
                if existing.hash == hash {
                    debug!("{}: unchanged, skipping", path);
                    return Ok(Upsert::Unchanged);
                }
            }
            store_dims(&store)
        };

        let spans = chunk::chunk(content);
        let chunk_texts: Vec<String> = spans
            .iter()
            .map(|s| format!("File: {}\n\n{}", path, s.content))
            .collect();

        let chunk_vectors = self
            .embedder
            .embed(&chunk_texts, EmbedKind::Document)
            .await?;

        let mut prefix = String::new();
        for c in content.chars() {
            if prefix.len() + c.len_utf8() > FILE_EMBED_PREFIX_BYTES {
                break;
            }
            prefix.push(c);
        }
        let file_text = format!("File: {}\n\n{}", path, prefix);
        let file_vectors = self
            .embedder
            .embed(&[file_text], EmbedKind::Document)
            .await?;
        let file_embedding = file_vectors.into_iter().next().unwrap_or_default();

        if let Some(expected) = expected_dims {
            for v in chunk_vectors.iter().chain(std::iter::once(&file_embedding)) {
                if !v.is_empty() && v.len() != expected {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        got: v.len(),
                    });
                }
            }
        }

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .zip(chunk_vectors)
            .map(|(span, embedding)| Chunk {
                content: span.content,
                embedding,
                line_start: span.line_start,
                line_end: span.line_end,
            })
            .collect();

        let document = Document {
            id: format!("{}-{}", path, hash),
            path: path.to_string(),
            hash: hash.to_string(),
            content: content.to_string(),
            embedding: file_embedding,
            line_count: Document::count_lines(content),
            size,
            last_modified,
            chunks,
        };

        let mut store = self.inner.write().await;
        store.documents.retain(|d| d.path != path);
        store.documents.push(document);
        bump_updated(&mut store.metadata, self.clock.as_ref());
        self.persist(&store)?;
        debug!("{}: indexed", path);
        Ok(Upsert::Updated)
    }

    /// Remove the document for `path`, if present.
    pub async fn delete_file(&self, path: &str) -> Result<bool, StoreError> {
        let mut store = self.inner.write().await;
        let before = store.documents.len();
        store.documents.retain(|d| d.path != path);
        if store.documents.len() == before {
            return Ok(false);
        }
        bump_updated(&mut store.metadata, self.clock.as_ref());
        self.persist(&store)?;
        debug!("{}: removed from index", path);
        Ok(true)
    }

    /// Lightweight projection of every document — no content, no vectors.
    pub async fn list_files(&self) -> Vec<FileMetadata> {
        let store = self.inner.read().await;
        store
            .documents
            .iter()
            .map(|d| FileMetadata {
                path: d.path.clone(),
                hash: d.hash.clone(),
                size: d.size,
                last_modified: d.last_modified,
                chunk_count: d.chunks.len(),
            })
            .collect()
    }

    /// Store summary.
    pub async fn info(&self) -> StoreInfo {
        let store = self.inner.read().await;
        StoreInfo {
            name: store.metadata.name.clone(),
            file_count: store.documents.len(),
            total_size: store.documents.iter().map(|d| d.size).sum(),
            last_updated: store.metadata.updated,
        }
    }

    /// Reset to an empty store and delete the persisted file.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut store = self.inner.write().await;
        store.documents.clear();
        bump_updated(&mut store.metadata, self.clock.as_ref());
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("removed store file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }
        Ok(())
    }

    /// Run `f` over a consistent snapshot of the document list.
    ///
    /// The read guard is held for the duration of `f`, so retrieval never
    /// observes a half-applied mutation.
    pub async fn with_documents<R>(&self, f: impl FnOnce(&[Document]) -> R) -> R {
        let store = self.inner.read().await;
        f(&store.documents)
    }

    fn persist(&self, store: &StoreFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(store)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Dimensionality already present in the store, from any chunk or file
/// embedding. `None` for an empty or vector-less store.
fn store_dims(store: &StoreFile) -> Option<usize> {
    store
        .documents
        .iter()
        .flat_map(|d| {
            d.chunks
                .iter()
                .map(|c| c.embedding.len())
                .chain(std::iter::once(d.embedding.len()))
        })
        .find(|len| *len > 0)
}

fn bump_updated(metadata: &mut StoreMetadata, clock: &dyn Clock) {
    let now = clock.now_millis();
    if now > metadata.updated {
        metadata.updated = now;
    }
}

fn load_store_file(path: &Path, name: &str, clock: &dyn Clock) -> Result<StoreFile, StoreError> {
    let empty = |clock: &dyn Clock| {
        let now = clock.now_millis();
        StoreFile {
            schema_version: SCHEMA_VERSION,
            documents: Vec::new(),
            metadata: StoreMetadata {
                name: name.to_string(),
                created: now,
                updated: now,
            },
        }
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(empty(clock)),
        Err(e) => return Err(StoreError::Io(e)),
    };

    match serde_json::from_str::<StoreFile>(&content) {
        Ok(store) if store.schema_version > SCHEMA_VERSION => Err(StoreError::UnsupportedSchema {
            path: path.display().to_string(),
            found: store.schema_version,
            supported: SCHEMA_VERSION,
        }),
        Ok(store) => Ok(store),
        Err(e) => {
            // Distinguish a future schema from plain corruption before
            // falling back to an empty store.
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
                if let Some(version) = value.get("schemaVersion").and_then(|v| v.as_u64()) {
                    if version as u32 > SCHEMA_VERSION {
                        return Err(StoreError::UnsupportedSchema {
                            path: path.display().to_string(),
                            found: version as u32,
                            supported: SCHEMA_VERSION,
                        });
                    }
                }
            }
            warn!(
                "store file {} is unreadable ({}); starting empty, file kept until next write",
                path.display(),
                e
            );
            Ok(empty(clock))
        }
    }
}
