//! Error types for entity resolution

use thiserror::Error;

/// Errors that can occur while resolving an entity's remote state.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// HTTP request failed (connect, timeout, or non-success status).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Any other resolution failure.
    #[error("Resolution failed: {0}")]
    Other(String),
}

/// Result type alias for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
