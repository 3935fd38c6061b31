//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and two concrete providers:
//! - **[`OpenAiEmbedder`]** — calls an OpenAI-compatible `/embeddings`
//!   endpoint with batching, retry, and backoff.
//! - **[`LocalEmbedder`]** — calls a local embedding server's `/api/embed`
//!   endpoint (Ollama-compatible).
//!
//! Inputs are truncated to [`MAX_EMBED_CHARS`] characters before the call.
//! All vectors in one response must share a dimensionality; a mismatch is
//! rejected rather than stored.
//!
//! # Retry Strategy
//!
//! Transient failures use exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s (capped)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, EmbeddingProvider};
use crate::error::EmbeddingError;

/// Maximum characters per embedded text; longer inputs are truncated.
pub const MAX_EMBED_CHARS: usize = 8000;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Whether a text is indexed content or a search query.
///
/// Providers that distinguish document and query encodings can branch on
/// this; both built-in providers embed them identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Document,
    Query,
}

/// Capability interface for dense text embedding.
///
/// `output[i]` corresponds to `input[i]`; no other ordering is promised.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Returned vectors all share one dimensionality.
    async fn embed(
        &self,
        texts: &[String],
        kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
}

/// Build the provider selected by configuration.
///
/// # Errors
///
/// [`EmbeddingError::NotConfigured`] when the OpenAI provider is selected
/// without an API key.
pub fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>, EmbeddingError> {
    match config.embedding_provider {
        EmbeddingProvider::Openai => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        EmbeddingProvider::Local => Ok(Box::new(LocalEmbedder::new(config)?)),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

fn check_dimensions(vectors: &[Vec<f32>]) -> Result<(), EmbeddingError> {
    if let Some(first) = vectors.first() {
        for v in &vectors[1..] {
            if v.len() != first.len() {
                return Err(EmbeddingError::UnequalDimensions {
                    first: first.len(),
                    other: v.len(),
                });
            }
        }
    }
    Ok(())
}

fn build_client() -> Result<reqwest::Client, EmbeddingError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| EmbeddingError::Request(e.to_string()))
}

// ============ OpenAI Provider ============

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints.
///
/// Missing credentials surface on the first `embed` call, not at
/// construction, so store operations that never embed (info, clear) work
/// without an API key.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &Config) -> Result<Self, EmbeddingError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        Ok(Self {
            client: build_client()?,
            api_key: config.openai_api_key.clone(),
            model: config.embedding_model.clone(),
            base_url,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        _kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EmbeddingError::NotConfigured(
                "OpenAI API key missing; set OPENAI_API_KEY or openaiApiKey in config".to_string(),
            )
        })?;
        let input: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t, MAX_EMBED_CHARS))
            .collect();
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = OpenAiRequest {
            model: &self.model,
            input,
        };

        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!("retrying embedding request in {:?}", delay);
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: OpenAiResponse = response
                            .json()
                            .await
                            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                        let mut data = parsed.data;
                        data.sort_by_key(|d| d.index);
                        let vectors: Vec<Vec<f32>> =
                            data.into_iter().map(|d| d.embedding).collect();
                        if vectors.len() != texts.len() {
                            return Err(EmbeddingError::InvalidResponse(format!(
                                "expected {} vectors, got {}",
                                texts.len(),
                                vectors.len()
                            )));
                        }
                        check_dimensions(&vectors)?;
                        return Ok(vectors);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(EmbeddingError::Request(format!(
                            "embeddings API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }
                    if status.as_u16() == 401 {
                        return Err(EmbeddingError::NotConfigured(format!(
                            "embeddings API rejected credentials: {}",
                            body_text
                        )));
                    }
                    return Err(EmbeddingError::Request(format!(
                        "embeddings API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(EmbeddingError::Request(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EmbeddingError::Request("embedding failed after retries".into())))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============ Local Provider ============

#[derive(Serialize)]
struct LocalRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct LocalResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding provider for a local Ollama-compatible server.
///
/// Calls `POST {url}/api/embed`. Requires the server to be running with an
/// embedding model pulled (e.g. `ollama pull nomic-embed-text`).
pub struct LocalEmbedder {
    client: reqwest::Client,
    model: String,
    url: String,
}

impl LocalEmbedder {
    pub fn new(config: &Config) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: build_client()?,
            model: config.embedding_model.clone(),
            url: config.local_embedding_url.clone(),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        _kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let input: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t, MAX_EMBED_CHARS))
            .collect();
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let body = LocalRequest {
            model: &self.model,
            input,
        };

        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: LocalResponse = response
                            .json()
                            .await
                            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                        if parsed.embeddings.len() != texts.len() {
                            return Err(EmbeddingError::InvalidResponse(format!(
                                "expected {} vectors, got {}",
                                texts.len(),
                                parsed.embeddings.len()
                            )));
                        }
                        check_dimensions(&parsed.embeddings)?;
                        return Ok(parsed.embeddings);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(EmbeddingError::Request(format!(
                            "local embedding error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }
                    return Err(EmbeddingError::Request(format!(
                        "local embedding error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(EmbeddingError::Request(format!(
                        "local embedding server unreachable at {} ({})",
                        self.url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EmbeddingError::Request("embedding failed after retries".into())))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors, zero-norm vectors, or vectors of
/// different lengths — never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero_not_nan() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        let sim = cosine_similarity(&a, &b);
        assert_eq!(sim, 0.0);
        assert!(!sim.is_nan());
    }

    #[test]
    fn cosine_dimension_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(9000);
        let cut = truncate_chars(&text, MAX_EMBED_CHARS);
        assert_eq!(cut.chars().count(), MAX_EMBED_CHARS);

        let short = truncate_chars("abc", MAX_EMBED_CHARS);
        assert_eq!(short, "abc");
    }

    #[test]
    fn unequal_dimensions_rejected() {
        let ok = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert!(check_dimensions(&ok).is_ok());

        let bad = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            check_dimensions(&bad),
            Err(EmbeddingError::UnequalDimensions { first: 2, other: 1 })
        ));
    }

    #[tokio::test]
    async fn openai_without_key_fails_on_first_embed() {
        let mut config = Config::default();
        config.openai_api_key = None;
        let embedder = OpenAiEmbedder::new(&config).unwrap();
        let result = embedder
            .embed(&["text".to_string()], EmbedKind::Document)
            .await;
        assert!(matches!(result, Err(EmbeddingError::NotConfigured(_))));
    }
}
