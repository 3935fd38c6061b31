//! Runtime wiring: configuration, providers, clock, store.
//!
//! Rather than global singletons, the capabilities the engine depends on
//! (embedder, chat client, clock) are constructed once and threaded
//! through explicitly. Tests instantiate a [`Runtime`] with stub providers
//! and a temp-dir store.

use std::path::Path;
use std::sync::Arc;

use crate::chat::{ChatClient, OpenAiChat};
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{EmbeddingError, StoreError};
use crate::store::VectorStore;

/// Injectable time source (epoch milliseconds).
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Bundles the engine's capabilities for one working directory.
///
/// The embedder and chat client are created once here (single-flight by
/// construction); every component receives its dependencies from this
/// container instead of reaching for globals.
pub struct Runtime {
    pub config: Config,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Option<Arc<dyn ChatClient>>,
    pub clock: Arc<dyn Clock>,
}

impl Runtime {
    /// Build a runtime from resolved configuration.
    ///
    /// The chat client is optional: it exists only when credentials are
    /// configured, and `ask` fails with a configuration error without it.
    pub fn new(config: Config) -> Result<Self, EmbeddingError> {
        let embedder: Arc<dyn Embedder> = create_embedder(&config)?.into();
        let chat: Option<Arc<dyn ChatClient>> = OpenAiChat::from_config(&config)
            .map(|c| Arc::new(c) as Arc<dyn ChatClient>);
        Ok(Self {
            config,
            embedder,
            chat,
            clock: Arc::new(SystemClock),
        })
    }

    /// Assemble a runtime from explicit parts (used by tests).
    pub fn with_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        chat: Option<Arc<dyn ChatClient>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            embedder,
            chat,
            clock,
        }
    }

    /// Open the named store under the configured data directory.
    pub fn open_store(&self, name: &str) -> Result<Arc<VectorStore>, StoreError> {
        self.open_store_in(&self.config.data_dir, name)
    }

    /// Open the named store under an explicit directory.
    pub fn open_store_in(&self, data_dir: &Path, name: &str) -> Result<Arc<VectorStore>, StoreError> {
        Ok(Arc::new(VectorStore::open(
            data_dir,
            name,
            self.embedder.clone(),
            self.clock.clone(),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000, "epoch millis expected");
    }
}
