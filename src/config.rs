//! Configuration loading and validation.
//!
//! Settings are merged from four layers, lowest to highest precedence:
//!
//! 1. Built-in defaults.
//! 2. Global YAML at `~/.config/searchgrep/config.yaml`.
//! 3. Local YAML at `{cwd}/.searchgreprc.yaml`.
//! 4. Environment variables.
//!
//! YAML keys are camelCase (`maxFileSize`, `embeddingProvider`, …) to match
//! the documented config schema. A missing file is not an error; a file
//! that fails to parse is.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote OpenAI-compatible embeddings API.
    Openai,
    /// Local HTTP embedding server (Ollama-style `/api/embed`).
    Local,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Files larger than this are skipped with a diagnostic.
    pub max_file_size: u64,
    /// Cap on the number of files indexed per walk.
    pub max_file_count: usize,
    /// Which embedding backend to use.
    pub embedding_provider: EmbeddingProvider,
    /// Remote embedding model id.
    pub embedding_model: String,
    /// API key for the remote provider.
    pub openai_api_key: Option<String>,
    /// Override for the remote endpoint base URL.
    pub base_url: Option<String>,
    /// Endpoint of the local embedding server.
    pub local_embedding_url: String,
    /// Directory holding persisted store files.
    pub data_dir: PathBuf,
}

/// One YAML layer: every field optional so absent keys fall through to the
/// layer below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigLayer {
    max_file_size: Option<u64>,
    max_file_count: Option<usize>,
    embedding_provider: Option<EmbeddingProvider>,
    embedding_model: Option<String>,
    openai_api_key: Option<String>,
    base_url: Option<String>,
    local_embedding_url: Option<String>,
    data_dir: Option<PathBuf>,
}

const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_FILE_COUNT: usize = 10_000;
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_LOCAL_EMBEDDING_URL: &str = "http://127.0.0.1:11434";

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
            embedding_provider: EmbeddingProvider::Openai,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            openai_api_key: None,
            base_url: None,
            local_embedding_url: DEFAULT_LOCAL_EMBEDDING_URL.to_string(),
            data_dir: default_data_dir(),
        }
    }
}

/// Default store location: `~/.searchgrep`.
fn default_data_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".searchgrep")
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Path of the global config file: `~/.config/searchgrep/config.yaml`.
fn global_config_path() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".config").join("searchgrep").join("config.yaml"))
}

/// Load configuration for a working directory: defaults, then global and
/// local YAML files, then environment variables.
pub fn load_config(cwd: &Path) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global) = global_config_path() {
        if let Some(layer) = read_layer(&global)? {
            apply_layer(&mut config, layer);
        }
    }

    let local = cwd.join(".searchgreprc.yaml");
    if let Some(layer) = read_layer(&local)? {
        apply_layer(&mut config, layer);
    }

    apply_env(&mut config)?;
    validate(&config)?;
    Ok(config)
}

fn read_layer(path: &Path) -> Result<Option<ConfigLayer>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let layer: ConfigLayer = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(Some(layer))
}

fn apply_layer(config: &mut Config, layer: ConfigLayer) {
    if let Some(v) = layer.max_file_size {
        config.max_file_size = v;
    }
    if let Some(v) = layer.max_file_count {
        config.max_file_count = v;
    }
    if let Some(v) = layer.embedding_provider {
        config.embedding_provider = v;
    }
    if let Some(v) = layer.embedding_model {
        config.embedding_model = v;
    }
    if let Some(v) = layer.openai_api_key {
        config.openai_api_key = Some(v);
    }
    if let Some(v) = layer.base_url {
        config.base_url = Some(v);
    }
    if let Some(v) = layer.local_embedding_url {
        config.local_embedding_url = v;
    }
    if let Some(v) = layer.data_dir {
        config.data_dir = v;
    }
}

/// Environment variables override every file layer.
fn apply_env(config: &mut Config) -> Result<()> {
    if let Ok(v) = std::env::var("OPENAI_API_KEY") {
        if !v.is_empty() {
            config.openai_api_key = Some(v);
        }
    }
    if let Ok(v) = std::env::var("OPENAI_BASE_URL") {
        if !v.is_empty() {
            config.base_url = Some(v);
        }
    }
    if let Ok(v) = std::env::var("SEARCHGREP_MAX_FILE_SIZE") {
        config.max_file_size = v
            .parse()
            .with_context(|| format!("SEARCHGREP_MAX_FILE_SIZE is not a number: '{}'", v))?;
    }
    if let Ok(v) = std::env::var("SEARCHGREP_MAX_FILE_COUNT") {
        config.max_file_count = v
            .parse()
            .with_context(|| format!("SEARCHGREP_MAX_FILE_COUNT is not a number: '{}'", v))?;
    }
    if let Ok(v) = std::env::var("SEARCHGREP_EMBEDDING_MODEL") {
        if !v.is_empty() {
            config.embedding_model = v;
        }
    }
    if let Ok(v) = std::env::var("SEARCHGREP_EMBEDDING_PROVIDER") {
        config.embedding_provider = match v.as_str() {
            "openai" => EmbeddingProvider::Openai,
            "local" => EmbeddingProvider::Local,
            other => bail!(
                "Unknown embedding provider: '{}'. Must be openai or local.",
                other
            ),
        };
    }
    if let Ok(v) = std::env::var("SEARCHGREP_LOCAL_EMBEDDING_URL") {
        if !v.is_empty() {
            config.local_embedding_url = v;
        }
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    if config.max_file_size == 0 {
        bail!("maxFileSize must be > 0");
    }
    if config.max_file_count == 0 {
        bail!("maxFileCount must be > 0");
    }
    if config.embedding_model.is_empty() {
        bail!("embeddingModel must not be empty");
    }
    Ok(())
}
