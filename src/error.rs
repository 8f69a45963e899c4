//! Error taxonomy shared across the pipeline and storage backends.
//!
//! Validation problems never appear here: the request normalizer degrades
//! bad parameters to defaults by design. Everything else propagates
//! unmodified from the failing component to the serving boundary, which
//! maps it to a status code via [`StoreError::status_code`]. No retries
//! happen inside the crate.

use thiserror::Error;

/// Failure modes of the transform engine capability.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The probe could not decode the bytes as an image.
    #[error("undecodable image data")]
    InvalidImage,
    /// The engine rejected the parameters or failed internally.
    #[error("transform failed: {0}")]
    Failed(String),
    /// The transform exceeded the configured deadline.
    #[error("transform timed out")]
    Timeout,
}

/// Errors surfaced by the store to its serving boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unknown source hash or variant reference.
    #[error("not found")]
    NotFound,
    /// Upload bytes the probe could not decode (or an empty payload).
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// A validated format with no MIME mapping. Should be unreachable given
    /// allow-list enforcement, but fails closed.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
    /// Transform engine failure, including timeouts.
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),
    /// Backend persistence failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Backend out of space.
    #[error("storage full")]
    StorageFull,
    /// Backend disabled or misconfigured.
    #[error("storage backend unavailable")]
    Unavailable,
}

impl StoreError {
    /// HTTP status the serving boundary should answer with.
    ///
    /// A not-modified outcome is not an error and never reaches this
    /// mapping; see [`Resolution`](crate::pipeline::Resolution).
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::NotFound => 404,
            StoreError::InvalidImage(_) => 400,
            StoreError::UnsupportedFormat(_) => 403,
            StoreError::Engine(_) => 500,
            StoreError::Io(_) => 500,
            StoreError::StorageFull => 507,
            StoreError::Unavailable => 503,
        }
    }
}
