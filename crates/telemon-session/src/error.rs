//! Error types for the user cache.

/// Errors raised when building or maintaining the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The configuration cannot produce a working cache.
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// The maintenance task ended abnormally.
    #[error("Maintenance task failed: {0}")]
    Maintenance(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
