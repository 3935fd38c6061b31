//! # searchgrep
//!
//! **Local semantic code search over a durable JSON vector store.**
//!
//! searchgrep ingests a source tree, splits files into code-aware chunks
//! with line provenance, embeds them through a pluggable provider, and
//! answers natural-language queries with a fusion of dense (cosine) and
//! sparse (BM25) retrieval — grep-style recall over *intent* rather than
//! literal tokens.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ FileWalker │──▶│  Synchronizer │──▶│ VectorStore │
//! │  + Hasher  │   │ (diff + fan-  │   │  JSON file  │
//! └────────────┘   │  out embeds)  │   └──────┬──────┘
//! ┌────────────┐   └──────────────┘          │
//! │  Watcher   │──────────┘                  ▼
//! │ (debounced)│                     ┌─────────────┐   ┌──────────┐
//! └────────────┘                     │  Retriever  │──▶│ Answerer │
//!                                    │ dense + BM25│   │ (chat)   │
//!                                    │    + RRF    │   └──────────┘
//!                                    └─────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The **walker** ([`walker`]) yields files honoring `.gitignore` and
//!    `.searchgrepignore` plus size/count caps.
//! 2. The **synchronizer** ([`sync`]) hashes content ([`hash`]) and diffs
//!    against the store: unchanged files are skipped, changed ones are
//!    re-embedded under a bounded concurrency permit, vanished ones are
//!    deleted.
//! 3. The **chunker** ([`chunk`]) cuts files at function/class boundaries,
//!    falling back to line windows with overlap.
//! 4. The **store** ([`store`]) persists documents, chunks, and embeddings
//!    as one JSON file per logical index, rewritten atomically.
//! 5. The **retriever** ([`search`]) fuses cosine and BM25 rankings with
//!    RRF and returns one best chunk per file.
//! 6. The **answerer** ([`answer`]) assembles the top chunks into a prompt
//!    for the optional chat provider.
//! 7. The **watcher** ([`watch`]) debounces filesystem events into the
//!    same store operations.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | YAML + environment configuration with validation |
//! | [`models`] | Core data types: `Document`, `Chunk`, `SearchResult` |
//! | [`hash`] | Tagged content fingerprints (xxh64 / sha256) |
//! | [`walker`] | Ignore-aware filesystem walking |
//! | [`chunk`] | Code-aware chunking with line fallback |
//! | [`embedding`] | `Embedder` trait, OpenAI and local providers, cosine |
//! | [`chat`] | Optional chat-completion client |
//! | [`store`] | Durable document/chunk/vector store |
//! | [`search`] | Hybrid retrieval: dense + BM25 + RRF + dedup |
//! | [`sync`] | Filesystem ↔ store reconciliation |
//! | [`watch`] | Debounced live re-indexing |
//! | [`answer`] | Question answering over retrieved chunks |
//! | [`progress`] | Sync progress reporting |
//! | [`runtime`] | Dependency wiring: config, providers, clock |
//! | [`error`] | Typed error kinds |

pub mod answer;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod hash;
pub mod models;
pub mod progress;
pub mod runtime;
pub mod search;
pub mod store;
pub mod sync;
pub mod walker;
pub mod watch;
