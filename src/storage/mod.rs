//! Storage backends — originals, their metadata records, and the variant
//! cache.
//!
//! Every backend implements the same five-operation [`StorageBackend`]
//! contract, so the resolution pipeline never knows which one is running.
//! The implementation is chosen once at startup from
//! [`StorageMode`](crate::config::StorageMode) via [`from_config`]; there is
//! no run-time backend inspection anywhere else.
//!
//! | Backend | Keyed by |
//! |---------|----------|
//! | [`FileBackend`] | hash-prefix-sharded directories on the local file system |
//! | [`KeyValueBackend`] | flat `meta:` / `orig:` / `var:` keys in a [`KvStore`](kv::KvStore) |
//! | [`NullBackend`] | nothing — storage disabled, every call is `Unavailable` |
//!
//! Backends own the records exclusively: `ImageRecord`s are written once at
//! upload and never mutated, and originals are never evicted. Variant cache
//! writes are best-effort and idempotent; concurrent writers for the same
//! key settle on identical content.

pub mod file;
pub mod kv;
pub mod null;

pub use file::FileBackend;
pub use kv::{KeyValueBackend, KvStore, MemoryKv};
pub use null::NullBackend;

use crate::config::{StorageMode, StoreConfig};
use crate::engine::{Probe, TransformEngine};
use crate::error::{EngineError, StoreError};
use crate::hashing::ContentHash;
use crate::request::VariantKey;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted metadata for an original image.
///
/// Created once at upload time from the engine's probe, immutable
/// thereafter. Serialized as JSON both on disk and over the `/info`-style
/// metadata surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub hash: ContentHash,
    pub width: u32,
    pub height: u32,
    /// Canonical lowercase extension of the detected format.
    pub format: String,
    pub byte_size: u64,
    /// Unix timestamp (seconds) of the upload.
    pub created_at: u64,
}

impl ImageRecord {
    /// Build a record for a freshly probed upload.
    pub fn new(hash: ContentHash, probe: Probe, byte_size: u64) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            hash,
            width: probe.width,
            height: probe.height,
            format: probe.format,
            byte_size,
            created_at,
        }
    }
}

/// Uniform persistence contract for originals and cached variants.
///
/// Implementations must be independently safe under concurrent invocation.
/// Concurrent `save_original` calls for identical bytes may race; they must
/// converge to a single record (content-keyed writes are idempotent).
pub trait StorageBackend: Send + Sync {
    /// Store an original, deduplicating by content hash.
    ///
    /// If a record already exists for the hash, returns it without
    /// re-writing bytes. Otherwise probes the bytes (failing with
    /// `InvalidImage` when undecodable), persists bytes + record, and
    /// returns the hash.
    fn save_original(&self, bytes: &[u8]) -> Result<ContentHash, StoreError>;

    /// Fetch the metadata record for an original. `NotFound` if unknown.
    fn load_info(&self, hash: &ContentHash) -> Result<ImageRecord, StoreError>;

    /// Fetch an original's bytes. `NotFound` if unknown.
    fn load_original(&self, hash: &ContentHash) -> Result<Vec<u8>, StoreError>;

    /// Look up a cached variant. Absence is `Ok(None)`, not an error.
    fn load_variant(&self, key: &VariantKey) -> Result<Option<Vec<u8>>, StoreError>;

    /// Cache a computed variant. Best-effort: callers swallow and log
    /// failures, so a broken cache degrades to recompute-next-time.
    fn save_variant(&self, key: &VariantKey, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Construct the configured backend. Called once at startup.
pub fn from_config(
    config: &StoreConfig,
    engine: Arc<dyn TransformEngine>,
) -> Arc<dyn StorageBackend> {
    match config.storage.mode {
        StorageMode::File => Arc::new(FileBackend::new(
            PathBuf::from(&config.storage.root),
            engine,
        )),
        StorageMode::Kv => Arc::new(KeyValueBackend::new(Box::new(MemoryKv::new()), engine)),
        StorageMode::None => Arc::new(NullBackend),
    }
}

/// Probe upload bytes, mapping an undecodable payload to the store-level
/// `InvalidImage` error. Shared by the writable backends.
pub(crate) fn probe_upload(
    engine: &dyn TransformEngine,
    bytes: &[u8],
) -> Result<Probe, StoreError> {
    engine.probe(bytes).map_err(|e| match e {
        EngineError::InvalidImage => {
            StoreError::InvalidImage("upload is not a decodable image".into())
        }
        other => StoreError::Engine(other),
    })
}
