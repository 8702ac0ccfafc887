// Configuration management for the ingestion pipeline and the query path.
// Settings live in a TOML file under the application directory.


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub sanitizer: SanitizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub chat_model: String,
    pub embed_batch_size: u32,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of CSV rows read per chunk during ingestion.
    pub chunk_size: usize,
    /// Expected embedding dimension; every vector returned by the model
    /// must match this or ingestion aborts.
    pub embedding_dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Number of inverted-list partitions scanned per search.
    pub nprobe: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Reasoning-removal patterns, applied globally in order.
    pub reasoning_patterns: Vec<String>,
    /// Answer-start markers, tried in priority order.
    pub answer_markers: Vec<String>,
    /// Answers shorter than this get the fallback wrapper.
    pub min_answer_chars: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Invalid embedding dimension: {0} (must be greater than 0)")]
    InvalidDimension(usize),
    #[error("Invalid top_k: {0} (must be greater than 0)")]
    InvalidTopK(usize),
    #[error("Invalid sampling parameter {name}: {value}")]
    InvalidSampling { name: &'static str, value: f32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "all-minilm:latest".to_string(),
            chat_model: "qwen3:4b".to_string(),
            embed_batch_size: 32,
            max_tokens: 2048,
            temperature: 0.1,
            top_p: 0.75,
        }
    }
}

impl Default for IngestConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            embedding_dimension: 384,
        }
    }
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self { top_k: 3, nprobe: 8 }
    }
}

impl Default for SanitizerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            reasoning_patterns: default_reasoning_patterns(),
            answer_markers: default_answer_markers(),
            min_answer_chars: 50,
        }
    }
}

/// Known internal-monologue phrasings the chat model leaks into answers.
/// Each entry is a regex applied globally, in order, with dotall and
/// case-insensitive flags inline.
fn default_reasoning_patterns() -> Vec<String> {
    [
        // Detailed parsing explanations
        r"(?is)First, the question is:.*?I need to look for.*?\n\n",
        r"(?is)The question is about.*?That's exact\.\n\n",
        r"(?is)Let me confirm.*?\n\n",
        r"(?is)So, for.*?exact match\.\n\n",
        // Field parsing explanations
        r"(?is)The data structure is:.*?\n\n",
        r"(?is)In the context data, it's listed as:.*?\n\n",
        r"(?is)I should parse this carefully\..*?\n\n",
        r"(?is)Let me write it out:.*?\n\n",
        r"(?is)The description says:.*?\n\n",
        // Step-by-step reasoning
        r"(?is)Let me list.*?\n\n",
        r"(?is)I think the fields are:.*?\n\n",
        r"(?is)Similarly.*?\n\n",
        r"(?is)The string is:.*?\n\n",
        // Uncertainty and validation thoughts
        r"(?is)The \[Other\] field is.*?I'm not sure.*?\n\n",
        r"(?is)But for the answer.*?\n\n",
        r"(?is)To be precise.*?\n\n",
        r"(?is)I think for conciseness.*?\n\n",
        // Format explanations
        r"(?is)The context data has dates in.*?\n\n",
        r"(?is)In the data, it's listed as.*?\n\n",
        // Numbered lists of thinking
        r"(?i)\d+\.\s+.*?:\s+\d+.*?\n",
        // Validation statements
        r"(?is)Now, I need to extract.*?\n\n",
        r"(?is)Since the date is exact.*?\n\n",
        r"(?is)The question asks for.*?\n\n",
    ]
    .iter()
    .map(|p| (*p).to_string())
    .collect()
}

/// Phrasings that mark the start of the actual answer.
fn default_answer_markers() -> Vec<String> {
    [
        r"(?i)For \d+/\d+/\d+.*?:",
        r"(?i)For \d{4}-\d{2}-\d{2}.*?:",
        r"(?i)Measurements:",
        r"(?i)Details for",
        r"(?i)The data for",
        r"(?i)On \d+/\d+/\d+",
    ]
    .iter()
    .map(|p| (*p).to_string())
    .collect()
}

impl From<ConfigError> for crate::FloatError {
    #[inline]
    fn from(error: ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl Config {
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".floatchat"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("floatchat"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory holding the persisted index bundle (ANN structure,
    /// docstore, slot-map, metadata).
    #[inline]
    pub fn index_bundle_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("index"))
    }

    /// Standalone copy of the raw ANN structure, kept next to the bundle
    /// for recovery and inspection.
    #[inline]
    pub fn raw_index_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("index.ivf"))
    }

    #[inline]
    pub fn load() -> Result<Self> {
        let config_path =
            Self::config_file_path().context("Failed to determine config file path")?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = Self::config_dir().context("Failed to determine config directory")?;

        fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;

        if self.ingest.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.ingest.chunk_size));
        }
        if self.ingest.embedding_dimension == 0 {
            return Err(ConfigError::InvalidDimension(self.ingest.embedding_dimension));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("http://{}:{}", self.ollama.host, self.ollama.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.embed_batch_size == 0 || self.embed_batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.embed_batch_size));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidSampling {
                name: "temperature",
                value: self.temperature,
            });
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::InvalidSampling {
                name: "top_p",
                value: self.top_p,
            });
        }

        let url_str = format!("http://{}:{}", self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        Ok(())
    }
}
