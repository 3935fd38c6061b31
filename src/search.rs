//! Hybrid retriever: dense cosine scan + BM25 + Reciprocal Rank Fusion.
//!
//! # Pipeline
//!
//! 1. Filter documents by file type (extension, case-insensitive).
//! 2. **Dense** — cosine similarity between the query embedding and every
//!    chunk embedding; keep the top `3 × top_k`.
//! 3. **Sparse** — BM25 (`k1 = 1.5`, `b = 0.75`) over the same chunks;
//!    keep the top `3 × top_k`. Skipped when hybrid is off or the query
//!    tokenizes to nothing.
//! 4. **Fusion** — RRF: each list contributes `1 / (k + rank + 1)` with
//!    `k = 60`, keyed by `(path, line_start)`.
//! 5. **Dedup** — one best chunk per file, collecting at most `2 × top_k`
//!    unique paths, then truncate to `top_k`.
//!
//! Both scans are brute-force over all chunks, which is adequate at the
//! target scale (≤10⁴ files); posting lists are the upgrade path beyond
//! that. Ties rank in insertion order (stable sorts throughout).

use std::collections::{HashMap, HashSet};

use crate::embedding::{cosine_similarity, EmbedKind, Embedder};
use crate::error::EmbeddingError;
use crate::models::{Document, SearchResult};
use crate::store::VectorStore;

/// BM25 term-frequency saturation.
const BM25_K1: f64 = 1.5;
/// BM25 length normalization.
const BM25_B: f64 = 0.75;
/// RRF rank constant.
const RRF_K: f64 = 60.0;

/// Retrieval options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results (one per file).
    pub top_k: usize,
    /// Fuse BM25 with dense scores; pure dense ranking when off.
    pub hybrid: bool,
    /// Restrict to these file extensions (leading dot optional,
    /// case-insensitive). Empty means all files.
    pub file_types: Vec<String>,
    /// Attach the parent document's full content to each result.
    pub include_content: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            hybrid: true,
            file_types: Vec::new(),
            include_content: false,
        }
    }
}

/// Embed the query and rank the store's chunks.
pub async fn search(
    store: &VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, EmbeddingError> {
    let vectors = embedder
        .embed(&[query.to_string()], EmbedKind::Query)
        .await?;
    let query_vec = vectors.into_iter().next().unwrap_or_default();

    Ok(store
        .with_documents(|docs| rank_chunks(docs, &query_vec, query, options))
        .await)
}

/// Identifies one chunk of one document within the filtered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ChunkRef {
    doc: usize,
    chunk: usize,
}

/// Rank chunks against a query over an in-memory document snapshot.
///
/// Pure function: all scoring, fusion, and dedup logic lives here so it can
/// be exercised without a store or an embedder.
pub fn rank_chunks(
    documents: &[Document],
    query_vec: &[f32],
    query: &str,
    options: &SearchOptions,
) -> Vec<SearchResult> {
    let filtered: Vec<&Document> = documents
        .iter()
        .filter(|d| matches_file_type(&d.path, &options.file_types))
        .collect();
    if filtered.is_empty() {
        return Vec::new();
    }

    let candidate_limit = options.top_k.saturating_mul(3).max(1);

    // Dense scan.
    let mut dense: Vec<(ChunkRef, f32)> = Vec::new();
    for (di, doc) in filtered.iter().enumerate() {
        for (ci, chunk) in doc.chunks.iter().enumerate() {
            let score = cosine_similarity(query_vec, &chunk.embedding);
            dense.push((ChunkRef { doc: di, chunk: ci }, score));
        }
    }
    dense.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    dense.truncate(candidate_limit);

    // Sparse scan.
    let sparse: Vec<(ChunkRef, f64)> = if options.hybrid {
        let mut ranked = bm25_scores(&filtered, query);
        ranked.truncate(candidate_limit);
        ranked
    } else {
        Vec::new()
    };

    // Reciprocal rank fusion keyed by (path, line_start).
    let dense_refs: Vec<ChunkRef> = dense.iter().map(|(r, _)| *r).collect();
    let sparse_refs: Vec<ChunkRef> = sparse.iter().map(|(r, _)| *r).collect();
    let fused = fuse_ranked(&filtered, &dense_refs, &sparse_refs);

    // One best chunk per file, at most 2 × top_k unique paths.
    let mut seen_paths: HashSet<&str> = HashSet::new();
    let mut results: Vec<SearchResult> = Vec::new();
    for (chunk_ref, score) in &fused {
        let doc = filtered[chunk_ref.doc];
        if !seen_paths.insert(doc.path.as_str()) {
            continue;
        }
        let chunk = &doc.chunks[chunk_ref.chunk];
        results.push(SearchResult {
            path: doc.path.clone(),
            score: *score,
            chunk: chunk.content.clone(),
            line_start: chunk.line_start,
            line_end: chunk.line_end,
            content: options.include_content.then(|| doc.content.clone()),
        });
        if seen_paths.len() >= options.top_k.saturating_mul(2) {
            break;
        }
    }

    results.truncate(options.top_k);
    results
}

/// Sum `1 / (k + rank + 1)` contributions from both rank lists.
///
/// Entries are keyed by `(path, line_start)` and returned sorted by fused
/// score, descending; ties keep first-seen order.
fn fuse_ranked(
    documents: &[&Document],
    dense: &[ChunkRef],
    sparse: &[ChunkRef],
) -> Vec<(ChunkRef, f64)> {
    // Key by (document, line_start): within one filtered snapshot this is
    // equivalent to (path, line_start) since paths are unique.
    let mut order: Vec<(ChunkRef, f64)> = Vec::new();
    let mut index: HashMap<(usize, usize), usize> = HashMap::new();

    for ranked in [dense, sparse] {
        for (rank, chunk_ref) in ranked.iter().enumerate() {
            let doc = documents[chunk_ref.doc];
            let key = (chunk_ref.doc, doc.chunks[chunk_ref.chunk].line_start);
            let contribution = 1.0 / (RRF_K + rank as f64 + 1.0);
            match index.get(&key) {
                Some(&i) => order[i].1 += contribution,
                None => {
                    index.insert(key, order.len());
                    order.push((*chunk_ref, contribution));
                }
            }
        }
    }

    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    order
}

/// BM25 over every chunk of the filtered documents.
///
/// Every chunk is scored and returned sorted descending — zero-scoring
/// chunks keep their stable-order slots so the caller's truncation, not a
/// score cutoff, decides the candidate set. Empty only when the query
/// yields no tokens or the corpus has no token mass.
fn bm25_scores(documents: &[&Document], query: &str) -> Vec<(ChunkRef, f64)> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() {
        return Vec::new();
    }

    struct TokenizedChunk {
        chunk_ref: ChunkRef,
        term_freqs: HashMap<String, usize>,
        len: usize,
    }

    let mut chunks: Vec<TokenizedChunk> = Vec::new();
    for (di, doc) in documents.iter().enumerate() {
        for (ci, chunk) in doc.chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.content);
            let mut term_freqs: HashMap<String, usize> = HashMap::new();
            for t in &tokens {
                *term_freqs.entry(t.clone()).or_insert(0) += 1;
            }
            chunks.push(TokenizedChunk {
                chunk_ref: ChunkRef { doc: di, chunk: ci },
                len: tokens.len(),
                term_freqs,
            });
        }
    }
    if chunks.is_empty() {
        return Vec::new();
    }

    let n = chunks.len() as f64;
    let avg_len = chunks.iter().map(|c| c.len).sum::<usize>() as f64 / n;
    if avg_len == 0.0 {
        return Vec::new();
    }

    // Document frequency per query term.
    let mut df: HashMap<&str, f64> = HashMap::new();
    for term in &query_terms {
        let count = chunks
            .iter()
            .filter(|c| c.term_freqs.contains_key(term))
            .count() as f64;
        df.insert(term.as_str(), count);
    }

    let mut scored: Vec<(ChunkRef, f64)> = chunks
        .iter()
        .map(|c| {
            let mut score = 0.0;
            for term in &query_terms {
                let tf = c.term_freqs.get(term).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    continue;
                }
                let d = df[term.as_str()];
                let idf = ((n - d + 0.5) / (d + 0.5) + 1.0).ln();
                let numerator = tf * (BM25_K1 + 1.0);
                let denominator =
                    tf + BM25_K1 * (1.0 - BM25_B + BM25_B * (c.len as f64 / avg_len));
                score += idf * (numerator / denominator);
            }
            (c.chunk_ref, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Lowercase, replace non-word/non-space characters with spaces, split on
/// whitespace, keep tokens of at least two characters.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|s| s.chars().count() >= 2)
        .map(String::from)
        .collect()
}

fn matches_file_type(path: &str, file_types: &[String]) -> bool {
    if file_types.is_empty() {
        return true;
    }
    let ext = path.rsplit('.').next().unwrap_or("");
    file_types
        .iter()
        .any(|t| t.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
