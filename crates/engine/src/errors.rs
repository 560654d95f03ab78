//! Engine error types.

use thiserror::Error;

/// Errors from watch-file persistence.
///
/// None of these are fatal to the process: a failed load starts the
/// watch set empty, a failed save only loses that save attempt.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read watch file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Watch file {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Failed to write watch file {path}: {reason}")]
    Write { path: String, reason: String },
}

/// Errors surfaced by the watch service.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Registration-time resolution failed; nothing was added.
    #[error("{0}")]
    Resolution(#[from] resolver::ResolveError),

    /// Persistence failed.
    #[error("{0}")]
    Store(#[from] StoreError),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
