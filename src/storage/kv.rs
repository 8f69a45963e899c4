//! Key-value backend.
//!
//! Originals, records, and variants live in one flat key namespace:
//!
//! ```text
//! meta:<hash>            # ImageRecord, JSON
//! orig:<hash>            # original bytes
//! var:<hash>:<digest>    # cached variant bytes
//! ```
//!
//! The store itself sits behind the [`KvStore`] seam so the backend logic
//! is independent of the concrete store — an external server client and the
//! in-process [`MemoryKv`] plug in identically. Puts must be atomic per
//! key; the backend relies on nothing stronger, so concurrent uploads of
//! identical bytes just overwrite each other with identical values.

use super::{ImageRecord, StorageBackend, probe_upload};
use crate::engine::TransformEngine;
use crate::error::StoreError;
use crate::hashing::ContentHash;
use crate::request::VariantKey;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Minimal contract a key-value store must offer the backend.
///
/// Implementations map their own transport failures to
/// [`StoreError::Unavailable`] or [`StoreError::Io`].
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn contains(&self, key: &str) -> Result<bool, StoreError>;
}

/// In-process store: a `HashMap` behind an `RwLock`.
#[derive(Default)]
pub struct MemoryKv {
    map: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, exposed for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.contains_key(key))
    }
}

pub struct KeyValueBackend {
    store: Box<dyn KvStore>,
    engine: Arc<dyn TransformEngine>,
}

impl KeyValueBackend {
    pub fn new(store: Box<dyn KvStore>, engine: Arc<dyn TransformEngine>) -> Self {
        Self { store, engine }
    }
}

fn meta_key(hash: &ContentHash) -> String {
    format!("meta:{hash}")
}

fn orig_key(hash: &ContentHash) -> String {
    format!("orig:{hash}")
}

fn var_key(key: &VariantKey) -> String {
    format!("var:{key}")
}

impl StorageBackend for KeyValueBackend {
    fn save_original(&self, bytes: &[u8]) -> Result<ContentHash, StoreError> {
        let hash = ContentHash::of(bytes);
        if self.store.contains(&meta_key(&hash))? {
            debug!(hash = %hash, "original already stored, deduplicating");
            return Ok(hash);
        }

        let probe = probe_upload(self.engine.as_ref(), bytes)?;
        let record = ImageRecord::new(hash.clone(), probe, bytes.len() as u64);
        let json = serde_json::to_vec(&record)
            .map_err(|e| StoreError::Io(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        // Bytes before record: a readable record implies readable bytes.
        self.store.put(&orig_key(&hash), bytes)?;
        self.store.put(&meta_key(&hash), &json)?;
        debug!(hash = %hash, size = bytes.len(), "stored new original");
        Ok(hash)
    }

    fn load_info(&self, hash: &ContentHash) -> Result<ImageRecord, StoreError> {
        let value = self
            .store
            .get(&meta_key(hash))?
            .ok_or(StoreError::NotFound)?;
        serde_json::from_slice(&value)
            .map_err(|e| StoreError::Io(std::io::Error::new(ErrorKind::InvalidData, e)))
    }

    fn load_original(&self, hash: &ContentHash) -> Result<Vec<u8>, StoreError> {
        self.store.get(&orig_key(hash))?.ok_or(StoreError::NotFound)
    }

    fn load_variant(&self, key: &VariantKey) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(&var_key(key))
    }

    fn save_variant(&self, key: &VariantKey, bytes: &[u8]) -> Result<(), StoreError> {
        self.store.put(&var_key(key), bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Probe;
    use crate::engine::capability::tests::MockEngine;
    use crate::test_helpers::variant_key_for;

    fn backend_with_probes(probes: Vec<Probe>) -> KeyValueBackend {
        KeyValueBackend::new(
            Box::new(MemoryKv::new()),
            Arc::new(MockEngine::with_probes(probes)),
        )
    }

    fn probe(width: u32, height: u32) -> Probe {
        Probe {
            width,
            height,
            format: "png".into(),
        }
    }

    #[test]
    fn save_then_load_roundtrip() {
        let backend = backend_with_probes(vec![probe(320, 200)]);
        let hash = backend.save_original(b"png payload").unwrap();

        let info = backend.load_info(&hash).unwrap();
        assert_eq!((info.width, info.height), (320, 200));
        assert_eq!(info.format, "png");
        assert_eq!(backend.load_original(&hash).unwrap(), b"png payload");
    }

    #[test]
    fn save_is_idempotent_by_content() {
        let store = Box::new(MemoryKv::new());
        let backend = KeyValueBackend::new(
            store,
            Arc::new(MockEngine::with_probes(vec![probe(1, 1)])),
        );
        let first = backend.save_original(b"payload").unwrap();
        // Second save dedups on the meta key; the single queued probe is
        // already consumed, so reaching the probe would fail the test.
        let second = backend.save_original(b"payload").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn undecodable_upload_is_invalid_image() {
        let backend = backend_with_probes(vec![]);
        assert!(matches!(
            backend.save_original(b"junk").unwrap_err(),
            StoreError::InvalidImage(_)
        ));
    }

    #[test]
    fn unknown_hash_is_not_found() {
        let backend = backend_with_probes(vec![]);
        let hash = ContentHash::of(b"missing");
        assert!(matches!(backend.load_info(&hash), Err(StoreError::NotFound)));
        assert!(matches!(
            backend.load_original(&hash),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn variant_miss_then_roundtrip() {
        let backend = backend_with_probes(vec![]);
        let key = variant_key_for(b"src", 64, 64);
        assert!(backend.load_variant(&key).unwrap().is_none());

        backend.save_variant(&key, b"derived").unwrap();
        assert_eq!(
            backend.load_variant(&key).unwrap().as_deref(),
            Some(b"derived".as_slice())
        );
    }

    #[test]
    fn keys_are_namespaced() {
        let kv = MemoryKv::new();
        let hash = ContentHash::of(b"x");
        kv.put(&meta_key(&hash), b"m").unwrap();
        kv.put(&orig_key(&hash), b"o").unwrap();
        assert_eq!(kv.len(), 2);
        assert_eq!(kv.get(&format!("meta:{hash}")).unwrap().as_deref(), Some(b"m".as_slice()));
    }

    #[test]
    fn memory_kv_overwrites_in_place() {
        let kv = MemoryKv::new();
        kv.put("k", b"one").unwrap();
        kv.put("k", b"two").unwrap();
        assert_eq!(kv.len(), 1);
        assert_eq!(kv.get("k").unwrap().as_deref(), Some(b"two".as_slice()));
    }
}
