//! Error types for meshslim

use thiserror::Error;

/// Main error type for meshslim operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Empty mesh: {0}")]
    EmptyMesh(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Degenerate geometry: {0}")]
    Degenerate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Deadline exceeded: {0}")]
    Timeout(String),
}

/// Result type alias for meshslim operations
pub type Result<T> = std::result::Result<T, Error>;
