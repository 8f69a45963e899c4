//! # pixvault
//!
//! A content-addressable image store with on-demand, parameter-driven
//! transformations. Uploads are deduplicated by the SHA-256 of their bytes;
//! originals are served through a resolution pipeline that resizes, crops,
//! rotates, grayscales, re-encodes, and format-converts per request, and
//! optionally persists the derived variant for reuse.
//!
//! # Architecture: Resolve, Don't Render Ahead
//!
//! Nothing is pre-generated. Every request flows through one pipeline:
//!
//! ```text
//! hash + raw params
//!   → load ImageRecord          (storage backend)
//!   → normalize TransformRequest (permissive defaulting, never errors)
//!   → VariantKey                 (canonical digest of source + params)
//!   → variant cache check        (persist=true only)
//!   → transform on miss          (engine, deadline-bounded)
//!   → best-effort cache write    (failure logged, never surfaced)
//!   → bytes + content type (+ ETag)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`hashing`] | Content addressing — `ContentHash` over raw bytes, also used for ETags |
//! | [`engine`] | Transform engine capability: trait, spec types, and the `image`-crate implementation |
//! | [`storage`] | `StorageBackend` contract + file, key-value, and null backends |
//! | [`request`] | Raw-parameter normalization and variant cache keys |
//! | [`pipeline`] | The resolution pipeline: `ImageStore` |
//! | [`config`] | Immutable process configuration from `pixvault.toml` |
//! | [`error`] | Error taxonomy and boundary status mapping |
//!
//! # Design Decisions
//!
//! ## Permissive Parameter Boundary
//!
//! The normalizer never rejects a request. Unparsable numbers become zero,
//! oversized dimensions fall back to the original, unknown formats fall
//! back to the configured default. Callers that send garbage get the
//! original image, not an error page. Strictness lives at exactly two
//! places: hash tokens ([`hashing::ContentHash::parse`]) and uploads (the
//! probe).
//!
//! ## Backend Behind a Trait
//!
//! Storage is selected once at startup from configuration and consumed
//! through [`storage::StorageBackend`] everywhere else. The pipeline cannot
//! tell a local directory tree from a key-value store, which keeps the
//! cache semantics (miss is `None`, cache writes best-effort) uniform.
//!
//! ## Races Cost Work, Not Correctness
//!
//! The variant cache is checked and written without locks. Two identical
//! concurrent requests may both transform and both write — under the same
//! canonical key, with identical bytes. Accepting that duplicated work
//! buys a pipeline with no cross-request synchronization at all.

pub mod config;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod pipeline;
pub mod request;
pub mod storage;

pub use config::{StorageMode, StoreConfig};
pub use error::{EngineError, StoreError};
pub use hashing::ContentHash;
pub use pipeline::{ImageStore, Resolution, Resolved};
pub use request::{RawParams, TransformRequest, VariantKey};
pub use storage::{ImageRecord, StorageBackend};

#[cfg(test)]
pub(crate) mod test_helpers;
