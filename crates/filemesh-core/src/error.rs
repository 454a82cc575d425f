//! Error types for filemesh core.

use thiserror::Error;

/// Errors raised while parsing or validating core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("invalid file name {name:?}: {reason}")]
    InvalidFileName { name: String, reason: &'static str },

    #[error("block size must be non-zero")]
    ZeroBlockSize,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
