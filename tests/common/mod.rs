//! Shared fixtures: a deterministic embedder, a settable clock, and a
//! scripted chat client.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use searchgrep::embedding::{EmbedKind, Embedder};
use searchgrep::error::EmbeddingError;
use searchgrep::runtime::Clock;

pub const STUB_DIMS: usize = 16;

/// Bag-of-words embedder: each token lands in a hashed bucket, so texts
/// sharing tokens get similar vectors. Deterministic and offline.
pub struct StubEmbedder {
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn embed_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn token_bucket(token: &str) -> usize {
    let mut h: u64 = 1469598103934665603;
    for b in token.bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(1099511628211);
    }
    (h % STUB_DIMS as u64) as usize
}

pub fn stub_vector(text: &str) -> Vec<f32> {
    let mut vec = vec![0.0f32; STUB_DIMS];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2)
    {
        vec[token_bucket(token)] += 1.0;
    }
    vec
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        _kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| stub_vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "stub-bag-of-words"
    }
}

/// Clock that advances one millisecond per reading.
pub struct TickClock(AtomicI64);

impl TickClock {
    pub fn starting_at(ms: i64) -> Self {
        Self(AtomicI64::new(ms))
    }
}

impl Clock for TickClock {
    fn now_millis(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Chat client that records prompts and replies with a canned answer.
pub struct ScriptedChat {
    pub reply: String,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl searchgrep::chat::ChatClient for ScriptedChat {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        _max_tokens: u32,
    ) -> Result<String, EmbeddingError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        Ok(self.reply.clone())
    }
}
