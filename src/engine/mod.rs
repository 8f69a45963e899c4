//! Transform engine capability — decode-probe and pixel transformation.
//!
//! The rest of the crate consumes the engine as an opaque dependency behind
//! the [`TransformEngine`] trait: storage backends probe uploads with it,
//! the pipeline hands it a validated [`TransformSpec`]. Its internals are
//! swappable without touching pipeline or storage logic.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Probe** | `image::ImageReader::into_dimensions` (header-only, no full decode) |
//! | **Resize** | `image::imageops` Lanczos3 |
//! | **Crop** | `DynamicImage::crop_imm` |
//! | **Rotate** | `rotate90` / `rotate180` / `rotate270` |
//! | **Encode** | `JpegEncoder::new_with_quality`, `write_to` for PNG/GIF/WebP |

pub mod capability;
pub mod raster;

pub use capability::{Probe, Quality, TransformEngine, TransformSpec};
pub use raster::RasterEngine;
