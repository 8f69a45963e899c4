//! Pure Rust engine built on the `image` crate.
//!
//! Transform order matches the request semantics: crop (when both origins
//! are set) takes precedence over resize, then rotation, then grayscale,
//! then encode. Quality applies to JPEG output; PNG and GIF are lossless
//! and WebP uses the crate's lossless encoder, so they ignore it.

use super::capability::{Probe, TransformEngine, TransformSpec};
use crate::error::EngineError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

/// Production engine using the `image` crate's pure-Rust codecs.
pub struct RasterEngine;

impl RasterEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RasterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformEngine for RasterEngine {
    fn probe(&self, bytes: &[u8]) -> Result<Probe, EngineError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| EngineError::Failed(e.to_string()))?;
        let format = reader.format().ok_or(EngineError::InvalidImage)?;
        // Header-only dimension read; a full decode happens only on transform.
        let (width, height) = reader
            .into_dimensions()
            .map_err(|_| EngineError::InvalidImage)?;
        Ok(Probe {
            width,
            height,
            format: canonical_extension(format).to_string(),
        })
    }

    fn transform(&self, bytes: &[u8], spec: &TransformSpec) -> Result<Vec<u8>, EngineError> {
        let mut img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| EngineError::Failed(e.to_string()))?
            .decode()
            .map_err(|_| EngineError::InvalidImage)?;

        if spec.has_crop() {
            let (x, y) = (spec.crop_x as u32, spec.crop_y as u32);
            if x >= img.width() || y >= img.height() {
                return Err(EngineError::Failed(format!(
                    "crop origin ({x}, {y}) outside {}x{} image",
                    img.width(),
                    img.height()
                )));
            }
            let w = spec.width.min(img.width() - x);
            let h = spec.height.min(img.height() - y);
            img = img.crop_imm(x, y, w, h);
        } else if spec.width != img.width() || spec.height != img.height() {
            img = img.resize_exact(spec.width, spec.height, FilterType::Lanczos3);
        }

        img = match quarter_turns(spec.rotate)? {
            0 => img,
            1 => img.rotate90(),
            2 => img.rotate180(),
            3 => img.rotate270(),
            _ => unreachable!(),
        };

        if spec.grayscale {
            img = DynamicImage::ImageLuma8(img.to_luma8());
        }

        encode(&img, spec)
    }
}

/// Canonical lowercase extension for a detected format.
fn canonical_extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("bin")
}

/// Normalize a rotation in degrees to quarter turns.
///
/// Negative values wrap (`-90` → three turns). Rotations that are not a
/// multiple of 90 are parameters this engine rejects.
fn quarter_turns(degrees: i32) -> Result<u32, EngineError> {
    let normalized = degrees.rem_euclid(360);
    if normalized % 90 != 0 {
        return Err(EngineError::Failed(format!(
            "unsupported rotation: {degrees} degrees"
        )));
    }
    Ok((normalized / 90) as u32)
}

fn encode(img: &DynamicImage, spec: &TransformSpec) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::new();
    match spec.format.as_str() {
        "jpg" | "jpeg" => {
            // JPEG has no alpha channel; flatten anything else to RGB.
            let rgb;
            let img = match img {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
                _ => {
                    rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                    &rgb
                }
            };
            let encoder = JpegEncoder::new_with_quality(&mut out, spec.quality.value() as u8);
            img.write_with_encoder(encoder)
                .map_err(|e| EngineError::Failed(e.to_string()))?;
        }
        "png" => write_format(img, &mut out, ImageFormat::Png)?,
        "gif" => write_format(img, &mut out, ImageFormat::Gif)?,
        "webp" => write_format(img, &mut out, ImageFormat::WebP)?,
        other => {
            return Err(EngineError::Failed(format!(
                "no encoder for format: {other}"
            )));
        }
    }
    Ok(out)
}

fn write_format(
    img: &DynamicImage,
    out: &mut Vec<u8>,
    format: ImageFormat,
) -> Result<(), EngineError> {
    // GIF and WebP encoders reject some color types the decoders produce.
    let rgba;
    let img = match (format, img) {
        (ImageFormat::Png, _) => img,
        (_, DynamicImage::ImageRgba8(_)) => img,
        _ => {
            rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            &rgba
        }
    };
    img.write_to(&mut Cursor::new(out), format)
        .map_err(|e| EngineError::Failed(e.to_string()))
}
