//! Shared helpers for unit tests.
//!
//! Kept crate-private and compiled only under `cfg(test)`; integration
//! tests in `tests/` build their own fixtures.

use crate::engine::Quality;
use crate::hashing::ContentHash;
use crate::request::{TransformRequest, VariantKey};
use crate::storage::ImageRecord;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// Shorthand for optional string parameters.
pub(crate) fn some(s: &str) -> Option<String> {
    Some(s.to_string())
}

/// An image record for a fictional stored original.
pub(crate) fn record(width: u32, height: u32, format: &str) -> ImageRecord {
    ImageRecord {
        hash: ContentHash::of(b"test-source"),
        width,
        height,
        format: format.to_string(),
        byte_size: 1000,
        created_at: 1_700_000_000,
    }
}

/// A variant key for a synthetic source + dimensions, defaults elsewhere.
pub(crate) fn variant_key_for(source_seed: &[u8], width: u32, height: u32) -> VariantKey {
    TransformRequest {
        source: ContentHash::of(source_seed),
        width,
        height,
        grayscale: false,
        crop_x: -1,
        crop_y: -1,
        rotate: 0,
        quality: Quality::default(),
        persist: true,
        format: "jpg".to_string(),
    }
    .variant_key()
}

/// Real PNG bytes: a small gradient so resizes have structure to work on.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("in-memory PNG encode");
    out
}
