//! TOML configuration parsing and validation.
//!
//! Every section is optional; missing keys fall back to the defaults below
//! (gpt-4o-mini at temperature 0, 512/128 token chunks, top-3 retrieval).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// System instruction sent with every language-model call.
pub const DEFAULT_SYSTEM_PROMPT: &str = "
You are an exceptional reader that gently answers questions.

Your task is to answer questions from customers in a concise and informative way.
";

/// First assistant turn of every session.
pub const DEFAULT_GREETING: &str = "How can I help you?";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
}

impl Config {
    /// All-defaults configuration for commands that need no config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Which variant of the prompt pipeline is active.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// The whole document text is sent with every query.
    #[default]
    WholeDocument,
    /// Only the top-k nearest chunks are sent.
    Retrieval,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::WholeDocument => "whole_document",
            ChatMode::Retrieval => "retrieval",
        }
    }
}

impl std::str::FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "whole_document" | "whole-document" | "whole" => Ok(ChatMode::WholeDocument),
            "retrieval" | "rag" => Ok(ChatMode::Retrieval),
            other => Err(format!(
                "unknown chat mode '{}': use whole_document or retrieval",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default)]
    pub mode: ChatMode,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mode: ChatMode::WholeDocument,
            greeting: default_greeting(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: default_llm_api_key_env(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
    #[serde(default = "default_min_sentences")]
    pub min_sentences: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap(),
            min_sentences: default_min_sentences(),
        }
    }
}

fn default_max_tokens() -> usize {
    512
}
fn default_overlap() -> usize {
    128
}
fn default_min_sentences() -> usize {
    1
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
    /// Environment variable holding the OpenAI provider's API key.
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
            api_key_env: default_llm_api_key_env(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
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

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// What to do when the similarity query fails during a retrieval-mode turn.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexErrorPolicy {
    /// Log a warning and call the model with an empty context.
    #[default]
    Degrade,
    /// Abort the turn with an index error.
    Fail,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub on_query_error: IndexErrorPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            top_k: default_top_k(),
            on_query_error: IndexErrorPolicy::Degrade,
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/docchat.sqlite")
}
fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct SentimentConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_sentiment_model")]
    pub model: String,
    #[serde(default = "default_sentiment_url")]
    pub url: String,
    #[serde(default = "default_sentiment_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_sentiment_model(),
            url: default_sentiment_url(),
            api_key_env: default_sentiment_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SentimentConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_sentiment_model() -> String {
    "distilbert/distilbert-base-uncased-finetuned-sst-2-english".to_string()
}
fn default_sentiment_url() -> String {
    "https://api-inference.huggingface.co".to_string()
}
fn default_sentiment_api_key_env() -> String {
    "HF_API_TOKEN".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Checks cross-field constraints that serde defaults cannot express.
pub fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.max_tokens {
        anyhow::bail!("chunking.overlap_tokens must be < chunking.max_tokens");
    }
    if config.chunking.min_sentences == 0 {
        anyhow::bail!("chunking.min_sentences must be >= 1");
    }

    // Retrieval
    if config.index.top_k == 0 {
        anyhow::bail!("index.top_k must be >= 1");
    }

    // LLM
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.provider != "openai" {
        anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai (any OpenAI-compatible endpoint).",
            config.llm.provider
        );
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.chat.mode == ChatMode::Retrieval && !config.embedding.is_enabled() {
        anyhow::bail!("chat.mode = \"retrieval\" requires an [embedding] provider");
    }

    match config.sentiment.provider.as_str() {
        "disabled" | "huggingface" => {}
        other => anyhow::bail!(
            "Unknown sentiment provider: '{}'. Must be disabled or huggingface.",
            other
        ),
    }

    Ok(())
}
