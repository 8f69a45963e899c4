//! Engine trait and the parameter types it consumes.
//!
//! [`TransformSpec`] describes *what* to produce, not *how*. It is the
//! interface between the resolution pipeline (which decides what variant a
//! request maps to) and the engine (which does the pixel work), so tests
//! can swap in a recording mock without touching pipeline logic.

use crate::error::EngineError;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Result of probing an upload: enough metadata to build an image record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub width: u32,
    pub height: u32,
    /// Canonical lowercase extension of the detected format (`jpg`, `png`, ...).
    pub format: String,
}

/// Full description of one transformation.
///
/// Width and height are already bounded against the original by the request
/// normalizer. Crop origins use `-1` as the "unset" sentinel and are
/// deliberately not bounded — the engine rejects out-of-range origins
/// itself. Rotation arrives unvalidated for the same reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSpec {
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    pub crop_x: i32,
    pub crop_y: i32,
    pub rotate: i32,
    pub quality: Quality,
    /// Target output format, already validated against the allow-list.
    pub format: String,
}

impl TransformSpec {
    /// Whether a crop region is requested (both origins set).
    pub fn has_crop(&self) -> bool {
        self.crop_x >= 0 && self.crop_y >= 0
    }
}

/// Decode-probe and pixel-transformation capability.
///
/// Implementations must be shareable across request workers; every call is
/// independent and side-effect free on the engine itself.
pub trait TransformEngine: Send + Sync {
    /// Inspect image bytes without transforming them.
    ///
    /// Fails with [`EngineError::InvalidImage`] when the bytes are not a
    /// decodable image.
    fn probe(&self, bytes: &[u8]) -> Result<Probe, EngineError>;

    /// Produce the variant described by `spec` from original bytes.
    fn transform(&self, bytes: &[u8], spec: &TransformSpec) -> Result<Vec<u8>, EngineError>;
}
