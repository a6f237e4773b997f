//! TOML configuration parsing and validation.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration that embeds locally with
//! `all-minilm-l6-v2`.
//!
//! ```toml
//! [segmentation]
//! chapter_keyword = "CHAPTER"
//! article_keyword = "Article"
//!
//! [retrieval]
//! default_top_k = 3
//! max_top_k = 10
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use lexrag_core::segment::{Segmenter, DEFAULT_ARTICLE_KEYWORD, DEFAULT_CHAPTER_KEYWORD};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationConfig {
    #[serde(default = "default_chapter_keyword")]
    pub chapter_keyword: String,
    #[serde(default = "default_article_keyword")]
    pub article_keyword: String,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            chapter_keyword: default_chapter_keyword(),
            article_keyword: default_article_keyword(),
        }
    }
}

impl SegmentationConfig {
    pub fn segmenter(&self) -> Segmenter {
        Segmenter::new(&self.chapter_keyword, &self.article_keyword)
    }
}

fn default_chapter_keyword() -> String {
    DEFAULT_CHAPTER_KEYWORD.to_string()
}
fn default_article_keyword() -> String {
    DEFAULT_ARTICLE_KEYWORD.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Chunks returned when a request does not specify `top_k`.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Upper bound applied to requested `top_k` values.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

impl RetrievalConfig {
    /// Resolve a requested `top_k`: default when absent, capped at
    /// `max_top_k`. Zero passes through so the index can reject it.
    pub fn resolve_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_top_k)
            .min(self.max_top_k)
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_top_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted document upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Allowed CORS origins. `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

impl Config {
    /// Check cross-field invariants. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        for (name, keyword) in [
            ("segmentation.chapter_keyword", &self.segmentation.chapter_keyword),
            ("segmentation.article_keyword", &self.segmentation.article_keyword),
        ] {
            if keyword.is_empty() || keyword.chars().any(char::is_whitespace) {
                bail!("{} must be a single non-empty word", name);
            }
        }

        if self.retrieval.default_top_k < 1 {
            bail!("retrieval.default_top_k must be >= 1");
        }
        if self.retrieval.max_top_k < self.retrieval.default_top_k {
            bail!("retrieval.max_top_k must be >= retrieval.default_top_k");
        }

        let embedding = &self.embedding;
        match embedding.provider.as_str() {
            "disabled" | "local" => {}
            "hash" | "openai" | "ollama" => {
                if embedding.dims.is_none() || embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        embedding.provider
                    );
                }
                if embedding.provider != "hash" && embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
                other
            ),
        }
        if embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
