use thiserror::Error;

pub type Result<T> = std::result::Result<T, FloatError>;

#[derive(Error, Debug)]
pub enum FloatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Answer generation failed: {0}")]
    Synthesis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod ollama;
pub mod retriever;
pub mod sanitizer;
pub mod synthesis;
