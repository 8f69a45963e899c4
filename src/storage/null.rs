//! Disabled-storage backend.
//!
//! Selected by `mode = "none"`: the process runs, but every storage
//! operation answers `Unavailable`. Keeps misconfiguration loud without a
//! special case in the pipeline.

use super::{ImageRecord, StorageBackend};
use crate::error::StoreError;
use crate::hashing::ContentHash;
use crate::request::VariantKey;

pub struct NullBackend;

impl StorageBackend for NullBackend {
    fn save_original(&self, _bytes: &[u8]) -> Result<ContentHash, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn load_info(&self, _hash: &ContentHash) -> Result<ImageRecord, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn load_original(&self, _hash: &ContentHash) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn load_variant(&self, _key: &VariantKey) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn save_variant(&self, _key: &VariantKey, _bytes: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }
}
