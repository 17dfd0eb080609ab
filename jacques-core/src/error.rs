//! Error types for jacques-core

use thiserror::Error;

/// Main error type for the jacques-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Catalog database error
    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transcript parse error
    #[error("transcript error in {path}: {message}")]
    Transcript { path: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for jacques-core
pub type Result<T> = std::result::Result<T, Error>;
