//! Typed error kinds surfaced by the core.
//!
//! Orchestration paths use `anyhow`; these enums exist where callers need
//! to branch on the failure class (missing credentials vs. transient
//! embedder failure vs. corrupt store) instead of matching on message text.

use thiserror::Error;

/// Errors from the vector store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store file {path} has schema version {found}, this build supports {supported}")]
    UnsupportedSchema {
        path: String,
        found: u32,
        supported: u32,
    },

    #[error("embedding dimension mismatch: store has {expected}, new vector has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("failed to persist store: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Errors from embedding and chat providers.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding provider is not configured: {0}")]
    NotConfigured(String),

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding vectors have unequal dimensions ({first} vs {other})")]
    UnequalDimensions { first: usize, other: usize },
}

/// Errors from the filesystem watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("failed to create watcher: {0}")]
    Create(String),

    #[error("failed to watch path: {0}")]
    Watch(String),
}
