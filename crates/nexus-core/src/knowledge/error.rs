//! Knowledge graph error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the knowledge graph.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Database connection, write or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// Embedding generation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// IO error.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No file of the run could be extracted.
    #[error("No source files could be extracted ({skipped} skipped)")]
    NothingExtracted { skipped: usize },

    /// The store holds no graph yet.
    #[error("Knowledge graph not initialized. Run 'nexus analyze' first.")]
    NotInitialized,

    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// One keyword or semantic index failed.
    #[error("Index {index} failed: {message}")]
    IndexQuery { index: String, message: String },

    /// An index did not answer in time.
    #[error("Index {0} timed out")]
    Timeout(String),

    /// The store does not support the operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for KnowledgeError {
    fn from(err: std::io::Error) -> Self {
        KnowledgeError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<surrealdb::Error> for KnowledgeError {
    fn from(err: surrealdb::Error) -> Self {
        KnowledgeError::Database(err.to_string())
    }
}

impl From<crate::config::ConfigError> for KnowledgeError {
    fn from(err: crate::config::ConfigError) -> Self {
        KnowledgeError::Config(err.to_string())
    }
}
