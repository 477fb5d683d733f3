//! Error types for TableFuse.

use thiserror::Error;

/// Core error type for TableFuse operations.
#[derive(Error, Debug)]
pub enum TableFuseError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] crate::embedding::EmbeddingError),

    #[error("Clustering error: {0}")]
    Clustering(#[from] crate::clustering::ClusteringError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for TableFuse operations.
pub type Result<T> = std::result::Result<T, TableFuseError>;
