//! Error types for token persistence.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, TokenError>;

/// Errors that can occur while reading or writing session tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The username cannot be used as a storage key.
    #[error("Invalid username '{0}'")]
    InvalidUsername(String),

    /// Filesystem error.
    #[error("Token file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store refused the write (used by test stores).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
