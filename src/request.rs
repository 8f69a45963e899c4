//! Request normalization and variant cache keys.
//!
//! Raw query parameters are untrusted strings. [`TransformRequest::from_raw`]
//! turns them into a fully-defaulted, clamped request — and it never fails:
//! unparsable, missing, or out-of-policy values degrade to safe defaults
//! instead of erroring. That permissive boundary is the contract, not an
//! accident; strict rejection would break existing callers that rely on
//! sloppy parameters resolving to the original image.
//!
//! The normalized request also yields the [`VariantKey`] that addresses its
//! cached output. Two semantically identical requests must produce the same
//! key no matter how their parameters arrived, so the key is a digest over
//! unambiguously framed fields rather than a naive string concatenation.

use crate::config::StoreConfig;
use crate::engine::{Quality, TransformSpec};
use crate::hashing::ContentHash;
use crate::storage::ImageRecord;
use sha2::{Digest, Sha256};
use std::fmt;

/// Raw, untrusted transformation parameters as extracted by the serving
/// boundary from the query string (`w`, `h`, `g`, `x`, `y`, `r`, `q`, `s`,
/// `f`). `None` and unparsable values normalize identically, except for the
/// persist flag where absence falls back to the configured default policy.
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    pub width: Option<String>,
    pub height: Option<String>,
    pub grayscale: Option<String>,
    pub crop_x: Option<String>,
    pub crop_y: Option<String>,
    pub rotate: Option<String>,
    pub quality: Option<String>,
    pub persist: Option<String>,
    pub format: Option<String>,
}

/// A normalized, fully-defaulted description of a desired variant.
///
/// Constructed fresh per request; never persisted. Its field set (minus
/// `persist`) determines the [`VariantKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub source: ContentHash,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    /// Crop origin; `-1` means unset. Non-negative values pass through
    /// without upper-bound clamping (see the crate docs on the crop gap).
    pub crop_x: i32,
    pub crop_y: i32,
    /// Passed through unvalidated; the engine decides what it accepts.
    pub rotate: i32,
    pub quality: Quality,
    pub persist: bool,
    /// Lowercased, allow-list-validated output format.
    pub format: String,
}

/// Parse an integer parameter the permissive way: trim, parse, and treat
/// absence or garbage as zero.
fn int_param(value: Option<&str>) -> i32 {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

impl TransformRequest {
    /// Normalize raw parameters against the referenced original.
    ///
    /// Total by design — every branch lands on a usable value:
    /// - width/height `<= 0` or `>=` the original dimension → the original
    ///   dimension (never upscale)
    /// - grayscale: the value `1` enables, anything else disables
    /// - crop origins: negative → `-1` sentinel, non-negative pass through
    /// - rotate: any integer accepted
    /// - quality: `<= 0` → configured default, `> 100` → 100
    /// - persist: absent → configured default, else `1` is true
    /// - format: empty → configured default; unknown → configured default
    pub fn from_raw(raw: &RawParams, record: &ImageRecord, config: &StoreConfig) -> Self {
        let w = int_param(raw.width.as_deref());
        let width = if w <= 0 || w as u32 >= record.width {
            record.width
        } else {
            w as u32
        };

        let h = int_param(raw.height.as_deref());
        let height = if h <= 0 || h as u32 >= record.height {
            record.height
        } else {
            h as u32
        };

        let grayscale = int_param(raw.grayscale.as_deref()) == 1;

        let crop_x = int_param(raw.crop_x.as_deref()).max(-1);
        let crop_y = int_param(raw.crop_y.as_deref()).max(-1);

        let rotate = int_param(raw.rotate.as_deref());

        let q = int_param(raw.quality.as_deref());
        let quality = if q <= 0 {
            Quality::new(config.system.quality)
        } else {
            Quality::new(q.min(100) as u32)
        };

        let persist = match raw.persist.as_deref().map(str::trim) {
            None | Some("") => config.storage.save_new,
            Some(value) => value == "1",
        };

        let format = match raw.format.as_deref().map(str::trim) {
            None | Some("") => config.system.format.to_ascii_lowercase(),
            Some(value) => {
                let requested = value.to_ascii_lowercase();
                if config.storage.allowed_formats.contains(&requested) {
                    requested
                } else {
                    config.system.format.to_ascii_lowercase()
                }
            }
        };

        Self {
            source: record.hash.clone(),
            width,
            height,
            grayscale,
            crop_x,
            crop_y,
            rotate,
            quality,
            persist,
            format,
        }
    }

    /// The engine-facing slice of this request.
    pub fn spec(&self) -> TransformSpec {
        TransformSpec {
            width: self.width,
            height: self.height,
            grayscale: self.grayscale,
            crop_x: self.crop_x,
            crop_y: self.crop_y,
            rotate: self.rotate,
            quality: self.quality,
            format: self.format.clone(),
        }
    }

    /// Canonical cache key for this request's output.
    pub fn variant_key(&self) -> VariantKey {
        VariantKey::for_request(self)
    }
}

/// Deterministic cache address of a derived variant:
/// `{source_hash}:{params_digest}`.
///
/// The params digest hashes a domain tag, the fixed-width little-endian
/// encodings of every numeric field, and the length-framed format string, so
/// field boundaries can never be confused. `persist` is deliberately
/// excluded — it controls caching behavior, not variant identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    source: ContentHash,
    digest: String,
}

impl VariantKey {
    fn for_request(request: &TransformRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"variant\0");
        hasher.update(request.source.as_str().as_bytes());
        hasher.update(request.width.to_le_bytes());
        hasher.update(request.height.to_le_bytes());
        hasher.update([request.grayscale as u8]);
        hasher.update(request.crop_x.to_le_bytes());
        hasher.update(request.crop_y.to_le_bytes());
        hasher.update(request.rotate.to_le_bytes());
        hasher.update(request.quality.value().to_le_bytes());
        hasher.update((request.format.len() as u32).to_le_bytes());
        hasher.update(request.format.as_bytes());
        Self {
            source: request.source.clone(),
            digest: format!("{:x}", hasher.finalize()),
        }
    }

    /// Hash of the source original this variant derives from.
    pub fn source(&self) -> &ContentHash {
        &self.source
    }

    /// Digest of the transform parameters.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{record, some};

    fn config() -> StoreConfig {
        StoreConfig::default()
    }

    // =========================================================================
    // Defaulting
    // =========================================================================

    #[test]
    fn empty_params_default_to_original() {
        let rec = record(800, 600, "jpg");
        let req = TransformRequest::from_raw(&RawParams::default(), &rec, &config());
        assert_eq!(req.width, 800);
        assert_eq!(req.height, 600);
        assert!(!req.grayscale);
        assert_eq!(req.crop_x, -1);
        assert_eq!(req.crop_y, -1);
        assert_eq!(req.rotate, 0);
        assert_eq!(req.quality.value(), 90);
        assert!(req.persist); // save_new default
        assert_eq!(req.format, "jpg");
        assert_eq!(req.source, rec.hash);
    }

    #[test]
    fn unparsable_numbers_degrade_to_defaults() {
        let rec = record(800, 600, "jpg");
        let raw = RawParams {
            width: some("banana"),
            height: some(" "),
            quality: some("???"),
            rotate: some("12.5"),
            ..Default::default()
        };
        let req = TransformRequest::from_raw(&raw, &rec, &config());
        assert_eq!(req.width, 800);
        assert_eq!(req.height, 600);
        assert_eq!(req.quality.value(), 90);
        assert_eq!(req.rotate, 0);
    }

    // =========================================================================
    // Width / height
    // =========================================================================

    #[test]
    fn never_upscales() {
        let rec = record(800, 600, "jpg");
        let raw = RawParams {
            width: some("1600"),
            height: some("601"),
            ..Default::default()
        };
        let req = TransformRequest::from_raw(&raw, &rec, &config());
        assert_eq!(req.width, 800);
        assert_eq!(req.height, 600);
    }

    #[test]
    fn requested_original_dimension_stays_original() {
        let rec = record(800, 600, "jpg");
        let raw = RawParams {
            width: some("800"),
            ..Default::default()
        };
        assert_eq!(TransformRequest::from_raw(&raw, &rec, &config()).width, 800);
    }

    #[test]
    fn downscale_passes_through() {
        let rec = record(800, 600, "jpg");
        let raw = RawParams {
            width: some("50"),
            height: some("40"),
            ..Default::default()
        };
        let req = TransformRequest::from_raw(&raw, &rec, &config());
        assert_eq!((req.width, req.height), (50, 40));
    }

    #[test]
    fn negative_dimensions_fall_back_to_original() {
        let rec = record(800, 600, "jpg");
        let raw = RawParams {
            width: some("-5"),
            ..Default::default()
        };
        assert_eq!(TransformRequest::from_raw(&raw, &rec, &config()).width, 800);
    }

    // =========================================================================
    // Flags and crop
    // =========================================================================

    #[test]
    fn grayscale_only_on_literal_one() {
        let rec = record(100, 100, "jpg");
        for (value, expected) in [("1", true), (" 1 ", true), ("true", false), ("2", false), ("0", false)] {
            let raw = RawParams {
                grayscale: some(value),
                ..Default::default()
            };
            let req = TransformRequest::from_raw(&raw, &rec, &config());
            assert_eq!(req.grayscale, expected, "g={value:?}");
        }
    }

    #[test]
    fn negative_crop_normalizes_to_sentinel() {
        let rec = record(100, 100, "jpg");
        let raw = RawParams {
            crop_x: some("-42"),
            crop_y: some("-1"),
            ..Default::default()
        };
        let req = TransformRequest::from_raw(&raw, &rec, &config());
        assert_eq!((req.crop_x, req.crop_y), (-1, -1));
    }

    #[test]
    fn crop_beyond_bounds_passes_through_unclamped() {
        // Upper-bound clamping is deliberately absent; the engine rejects
        // out-of-range origins at transform time.
        let rec = record(100, 100, "jpg");
        let raw = RawParams {
            crop_x: some("5000"),
            crop_y: some("10"),
            ..Default::default()
        };
        let req = TransformRequest::from_raw(&raw, &rec, &config());
        assert_eq!((req.crop_x, req.crop_y), (5000, 10));
    }

    #[test]
    fn rotate_accepts_any_integer() {
        let rec = record(100, 100, "jpg");
        let raw = RawParams {
            rotate: some("-273"),
            ..Default::default()
        };
        assert_eq!(TransformRequest::from_raw(&raw, &rec, &config()).rotate, -273);
    }

    // =========================================================================
    // Quality / persist / format
    // =========================================================================

    #[test]
    fn quality_clamps_high_and_defaults_low() {
        let rec = record(100, 100, "jpg");
        for (value, expected) in [("150", 100), ("100", 100), ("55", 55), ("0", 90), ("-3", 90)] {
            let raw = RawParams {
                quality: some(value),
                ..Default::default()
            };
            let req = TransformRequest::from_raw(&raw, &rec, &config());
            assert_eq!(req.quality.value(), expected, "q={value:?}");
        }
    }

    #[test]
    fn persist_absent_uses_policy_default() {
        let rec = record(100, 100, "jpg");
        let mut cfg = config();
        cfg.storage.save_new = false;
        let req = TransformRequest::from_raw(&RawParams::default(), &rec, &cfg);
        assert!(!req.persist);

        let raw = RawParams {
            persist: some("  "),
            ..Default::default()
        };
        assert!(!TransformRequest::from_raw(&raw, &rec, &cfg).persist);
    }

    #[test]
    fn persist_explicit_overrides_policy() {
        let rec = record(100, 100, "jpg");
        let mut cfg = config();
        cfg.storage.save_new = false;
        let raw = RawParams {
            persist: some("1"),
            ..Default::default()
        };
        assert!(TransformRequest::from_raw(&raw, &rec, &cfg).persist);

        let raw = RawParams {
            persist: some("yes"),
            ..Default::default()
        };
        assert!(!TransformRequest::from_raw(&raw, &rec, &config()).persist);
    }

    #[test]
    fn format_lowercased_and_validated() {
        let rec = record(100, 100, "jpg");
        let raw = RawParams {
            format: some("PNG"),
            ..Default::default()
        };
        assert_eq!(TransformRequest::from_raw(&raw, &rec, &config()).format, "png");
    }

    #[test]
    fn unknown_format_falls_back_silently() {
        let rec = record(100, 100, "jpg");
        let raw = RawParams {
            format: some("bogus-format"),
            ..Default::default()
        };
        assert_eq!(TransformRequest::from_raw(&raw, &rec, &config()).format, "jpg");
    }

    // =========================================================================
    // Variant keys
    // =========================================================================

    fn base_request() -> TransformRequest {
        TransformRequest::from_raw(&RawParams::default(), &record(800, 600, "jpg"), &config())
    }

    #[test]
    fn equal_requests_yield_equal_keys() {
        assert_eq!(base_request().variant_key(), base_request().variant_key());
    }

    #[test]
    fn every_field_is_key_significant() {
        let base = base_request();
        let base_key = base.variant_key();

        let mutations: Vec<TransformRequest> = vec![
            TransformRequest { width: base.width - 1, ..base.clone() },
            TransformRequest { height: base.height - 1, ..base.clone() },
            TransformRequest { grayscale: true, ..base.clone() },
            TransformRequest { crop_x: 0, ..base.clone() },
            TransformRequest { crop_y: 0, ..base.clone() },
            TransformRequest { rotate: 90, ..base.clone() },
            TransformRequest { quality: Quality::new(50), ..base.clone() },
            TransformRequest { format: "png".into(), ..base.clone() },
            TransformRequest { source: ContentHash::of(b"other"), ..base.clone() },
        ];
        for (i, m) in mutations.iter().enumerate() {
            assert_ne!(m.variant_key(), base_key, "mutation {i} did not change key");
        }
    }

    #[test]
    fn persist_flag_does_not_change_key() {
        let base = base_request();
        let flipped = TransformRequest {
            persist: !base.persist,
            ..base.clone()
        };
        assert_eq!(base.variant_key(), flipped.variant_key());
    }

    #[test]
    fn field_framing_is_unambiguous() {
        // "jp" + "g..." style concatenation collisions must be impossible:
        // differing format strings always produce differing digests even
        // when their concatenation with neighbors would match.
        let a = TransformRequest { format: "jpg".into(), ..base_request() };
        let b = TransformRequest { format: "jpeg".into(), ..base_request() };
        assert_ne!(a.variant_key(), b.variant_key());
    }

    #[test]
    fn key_displays_as_source_colon_digest() {
        let key = base_request().variant_key();
        let rendered = key.to_string();
        assert_eq!(
            rendered,
            format!("{}:{}", key.source(), key.digest())
        );
        assert_eq!(key.digest().len(), 64);
    }
}
