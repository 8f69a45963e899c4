//! File-system backend.
//!
//! Layout under the configured root, sharded by the first two hex
//! characters of the content hash so no single directory grows unbounded:
//!
//! ```text
//! <root>/originals/ab/abcd...ef        # original bytes
//! <root>/originals/ab/abcd...ef.json   # ImageRecord
//! <root>/variants/ab/abcd...ef.<params-digest>
//! ```
//!
//! All writes go through a temp file in the destination directory followed
//! by a rename, so concurrent writers for the same content-derived path
//! settle on one complete file and readers never observe partial bytes.
//! The rename also makes `save_original` races converge: last write wins
//! with identical content.

use super::{ImageRecord, StorageBackend, probe_upload};
use crate::engine::TransformEngine;
use crate::error::StoreError;
use crate::hashing::ContentHash;
use crate::request::VariantKey;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub struct FileBackend {
    root: PathBuf,
    engine: Arc<dyn TransformEngine>,
}

impl FileBackend {
    pub fn new(root: PathBuf, engine: Arc<dyn TransformEngine>) -> Self {
        Self { root, engine }
    }

    fn original_dir(&self, hash: &ContentHash) -> PathBuf {
        self.root.join("originals").join(hash.prefix())
    }

    fn original_path(&self, hash: &ContentHash) -> PathBuf {
        self.original_dir(hash).join(hash.as_str())
    }

    fn record_path(&self, hash: &ContentHash) -> PathBuf {
        self.original_dir(hash).join(format!("{hash}.json"))
    }

    fn variant_path(&self, key: &VariantKey) -> PathBuf {
        self.root
            .join("variants")
            .join(key.source().prefix())
            .join(format!("{}.{}", key.source(), key.digest()))
    }
}

/// Write bytes to `path` atomically: temp file in the same directory, then
/// rename over the destination.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().ok_or_else(|| {
        StoreError::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("no parent directory for {}", path.display()),
        ))
    })?;
    fs::create_dir_all(dir).map_err(map_io)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(map_io)?;
    tmp.write_all(bytes).map_err(map_io)?;
    tmp.persist(path).map_err(|e| map_io(e.error))?;
    Ok(())
}

/// Translate persistence failures, distinguishing a full disk from general
/// I/O trouble.
fn map_io(err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::StorageFull | ErrorKind::QuotaExceeded => StoreError::StorageFull,
        _ => StoreError::Io(err),
    }
}

impl StorageBackend for FileBackend {
    fn save_original(&self, bytes: &[u8]) -> Result<ContentHash, StoreError> {
        let hash = ContentHash::of(bytes);
        if self.record_path(&hash).exists() {
            debug!(hash = %hash, "original already stored, deduplicating");
            return Ok(hash);
        }

        let probe = probe_upload(self.engine.as_ref(), bytes)?;
        let record = ImageRecord::new(hash.clone(), probe, bytes.len() as u64);

        write_atomic(&self.original_path(&hash), bytes)?;
        let json = serde_json::to_vec(&record).map_err(|e| {
            StoreError::Io(std::io::Error::new(ErrorKind::InvalidData, e))
        })?;
        // Record lands last: a record on disk implies its bytes are there.
        write_atomic(&self.record_path(&hash), &json)?;
        debug!(hash = %hash, size = bytes.len(), "stored new original");
        Ok(hash)
    }

    fn load_info(&self, hash: &ContentHash) -> Result<ImageRecord, StoreError> {
        let content = match fs::read(self.record_path(hash)) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(map_io(e)),
        };
        serde_json::from_slice(&content)
            .map_err(|e| StoreError::Io(std::io::Error::new(ErrorKind::InvalidData, e)))
    }

    fn load_original(&self, hash: &ContentHash) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.original_path(hash)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(map_io(e)),
        }
    }

    fn load_variant(&self, key: &VariantKey) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.variant_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io(e)),
        }
    }

    fn save_variant(&self, key: &VariantKey, bytes: &[u8]) -> Result<(), StoreError> {
        write_atomic(&self.variant_path(key), bytes)
    }
}
