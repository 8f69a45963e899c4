//! Content addressing.
//!
//! Every original image is identified by the SHA-256 digest of its raw
//! bytes, hex-encoded. The hash doubles as the deduplication key at upload
//! time and as the first half of every variant cache key. The same digest
//! function produces ETag values over post-transform bytes, so a client-side
//! conditional match and a stored original are never hashed differently.
//!
//! Hashing is content-based rather than path- or mtime-based: two uploads of
//! identical bytes always settle on one stored original, no matter where
//! they came from.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a hex-encoded SHA-256 digest.
const HEX_LEN: usize = 64;

/// Hex-encoded SHA-256 digest of an original image's bytes.
///
/// The canonical identifier for an original: storage primary key, URL path
/// token, and variant-key prefix. Constructed either by hashing bytes
/// ([`ContentHash::of`]) or by validating an untrusted token
/// ([`ContentHash::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash raw bytes. Total and deterministic — any byte sequence,
    /// including empty, produces a digest. Callers reject empty uploads
    /// upstream.
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Validate an untrusted hash token (e.g. a URL path segment).
    ///
    /// Accepts exactly 64 lowercase-normalized hex characters; anything
    /// else is `None`, which boundaries map to a not-found response rather
    /// than passing junk into storage lookups.
    pub fn parse(token: &str) -> Option<Self> {
        if token.len() != HEX_LEN || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(token.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First two hex characters, used by backends to shard directories.
    pub fn prefix(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
