//! Request-to-variant resolution pipeline.
//!
//! [`ImageStore`] orchestrates one request: load the original's record,
//! normalize the raw parameters, compute the variant key, serve from the
//! variant cache when the request persists, otherwise transform and
//! (best-effort) cache. It owns no persistent state itself — records and
//! variants belong to the backend, and the store only holds transient
//! references for the duration of a call.
//!
//! The cache check / compute / cache write sequence is deliberately
//! lock-free. Concurrent identical requests may both compute and both
//! write; the writes are idempotent under the same key, so the race costs
//! duplicated work, never correctness.

use crate::config::StoreConfig;
use crate::engine::{TransformEngine, TransformSpec};
use crate::error::{EngineError, StoreError};
use crate::hashing::ContentHash;
use crate::request::{RawParams, TransformRequest};
use crate::storage::{ImageRecord, StorageBackend};
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{debug, warn};

/// Static format → MIME mapping.
///
/// Anything the allow-list admits must map here; a miss after validation
/// means the allow-list was configured with a format we cannot serve, and
/// the request fails closed with `UnsupportedFormat`.
pub fn content_type_for(format: &str) -> Option<&'static str> {
    match format {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// A fully resolved response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// Hash of `bytes`; present when ETag support is enabled.
    pub etag: Option<String>,
}

/// Outcome of a conditional resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Full(Resolved),
    /// The caller's conditional token matched; send no body.
    NotModified { etag: String },
}

/// The resolution pipeline, shared across request workers.
///
/// Construction happens once at startup; afterwards every field is
/// read-only or internally synchronized, so requests need no locking here.
pub struct ImageStore {
    backend: Arc<dyn StorageBackend>,
    engine: Arc<dyn TransformEngine>,
    config: StoreConfig,
}

impl ImageStore {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        engine: Arc<dyn TransformEngine>,
        config: StoreConfig,
    ) -> Self {
        Self {
            backend,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Store an upload, deduplicating by content.
    ///
    /// Empty payloads never reach the hasher or the backend.
    pub fn save_original(&self, bytes: &[u8]) -> Result<ContentHash, StoreError> {
        if bytes.is_empty() {
            return Err(StoreError::InvalidImage("empty upload".into()));
        }
        self.backend.save_original(bytes)
    }

    /// Metadata for a stored original.
    pub fn info(&self, hash: &ContentHash) -> Result<ImageRecord, StoreError> {
        self.backend.load_info(hash)
    }

    /// Resolve a request to response bytes and a content type.
    pub fn resolve(&self, hash: &ContentHash, raw: &RawParams) -> Result<Resolved, StoreError> {
        let record = self.backend.load_info(hash)?;
        let request = TransformRequest::from_raw(raw, &record, &self.config);

        // Allow-list validation should make a miss impossible; fail closed
        // rather than serving bytes without a content type.
        let content_type = content_type_for(&request.format)
            .ok_or_else(|| StoreError::UnsupportedFormat(request.format.clone()))?;

        let key = request.variant_key();
        let bytes = if request.persist {
            match self.backend.load_variant(&key)? {
                Some(cached) => {
                    debug!(key = %key, "variant cache hit");
                    cached
                }
                None => {
                    let computed = self.compute(&record, &request)?;
                    if let Err(e) = self.backend.save_variant(&key, &computed) {
                        warn!(key = %key, error = %e, "variant cache write failed");
                    }
                    computed
                }
            }
        } else {
            self.compute(&record, &request)?
        };

        let etag = self
            .config
            .system
            .etag
            .then(|| ContentHash::of(&bytes).to_string());
        Ok(Resolved {
            bytes,
            content_type,
            etag,
        })
    }

    /// Resolve with conditional-match support.
    ///
    /// When ETags are enabled and the caller's token equals the hash of the
    /// resolved bytes, the body is withheld. The ETag hashes final
    /// post-transform bytes, never the source hash.
    pub fn resolve_conditional(
        &self,
        hash: &ContentHash,
        raw: &RawParams,
        if_none_match: Option<&str>,
    ) -> Result<Resolution, StoreError> {
        let resolved = self.resolve(hash, raw)?;
        if let (Some(etag), Some(token)) = (resolved.etag.as_deref(), if_none_match)
            && etag == token
        {
            debug!(etag, "conditional match, not modified");
            return Ok(Resolution::NotModified {
                etag: etag.to_string(),
            });
        }
        Ok(Resolution::Full(resolved))
    }

    /// Cache-miss path: fetch original bytes and run the engine.
    fn compute(
        &self,
        record: &ImageRecord,
        request: &TransformRequest,
    ) -> Result<Vec<u8>, StoreError> {
        let original = self.backend.load_original(&record.hash)?;
        self.transform_bounded(original, request.spec())
    }

    /// Run the engine, bounded by the configured deadline.
    ///
    /// On expiry the request fails with a timeout while the worker thread
    /// runs the transform to completion — no cancellation is propagated
    /// into the engine.
    fn transform_bounded(
        &self,
        bytes: Vec<u8>,
        spec: TransformSpec,
    ) -> Result<Vec<u8>, StoreError> {
        let Some(deadline) = self.config.engine.timeout() else {
            return self
                .engine
                .transform(&bytes, &spec)
                .map_err(StoreError::from);
        };

        let engine = Arc::clone(&self.engine);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(engine.transform(&bytes, &spec));
        });
        match rx.recv_timeout(deadline) {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Engine(EngineError::Timeout)),
        }
    }
}
