use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Query was empty or blank. Raised before any embedding or index call.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The embedding provider failed or returned no usable vector.
    #[error("Embedding provider error (model '{model}'): {source}")]
    EmbeddingProvider {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Search index not ready: {0}")]
    IndexNotReady(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pass-through failure from a storage or network backend.
    #[error("Backend failure: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn provider(model: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::EmbeddingProvider { model: model.into(), source: source.into() }
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
