//! Process configuration.
//!
//! Loaded once at startup from a `pixvault.toml` file, validated, then
//! treated as immutable — the pipeline and normalizer only ever see it by
//! shared reference. Config files are sparse: every field has a default and
//! users override only what they care about. Unknown keys are rejected to
//! catch typos early.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [system]
//! quality = 90              # Default re-encode quality when `q` is absent (1-100)
//! format = "jpg"            # Default output format when `f` is absent/invalid
//! etag = true               # Compute ETags over response bytes
//! headers = []              # Extra response headers, e.g. ["Cache-Control: max-age=86400"]
//!
//! [storage]
//! mode = "file"             # file | kv | none
//! root = "store"            # File backend root directory
//! save_new = true           # Default persist policy when `s` is absent
//! allowed_formats = ["jpg", "jpeg", "png", "gif", "webp"]
//!
//! [engine]
//! timeout_ms = 0            # Transform deadline; 0 disables the bound
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Which storage backend serves this process.
///
/// Chosen once at startup; the pipeline is backend-agnostic afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Local file system, sharded by hash prefix.
    File,
    /// Key-value store with a flat key namespace.
    Kv,
    /// Storage disabled — every operation fails with `Unavailable`.
    None,
}

/// Store configuration loaded from `pixvault.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Request defaulting and response behavior.
    pub system: SystemConfig,
    /// Backend selection and persistence policy.
    pub storage: StorageConfig,
    /// Transform engine limits.
    pub engine: EngineConfig,
}

/// Request defaulting and response behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    /// Re-encode quality used when the request omits `q` (1-100).
    pub quality: u32,
    /// Output format used when the request omits `f` or asks for a format
    /// outside the allow-list.
    pub format: String,
    /// Whether to compute ETags over response bytes and honor conditional
    /// match tokens.
    pub etag: bool,
    /// Extra response headers as `"Name: value"` strings, handed to the
    /// serving boundary verbatim via [`SystemConfig::extra_headers`].
    pub headers: Vec<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            quality: 90,
            format: "jpg".to_string(),
            etag: true,
            headers: Vec::new(),
        }
    }
}

impl SystemConfig {
    /// Parse the configured header strings into name/value pairs.
    ///
    /// Malformed entries are skipped here; `validate` rejects them at
    /// startup so they never survive into a running process.
    pub fn extra_headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

/// Backend selection and persistence policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend implementation to construct at startup.
    pub mode: StorageMode,
    /// Root directory for the file backend.
    pub root: String,
    /// Default persist policy when the request omits `s`: whether freshly
    /// computed variants are written back to the cache.
    pub save_new: bool,
    /// Output formats a request may ask for. Anything else silently falls
    /// back to `system.format`.
    pub allowed_formats: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::File,
            root: "store".to_string(),
            save_new: true,
            allowed_formats: ["jpg", "jpeg", "png", "gif", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Transform engine limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Deadline for a single transform call in milliseconds. `0` disables
    /// the bound. On expiry the request fails with an engine error while
    /// the in-flight transform runs to completion on its worker thread.
    pub timeout_ms: u64,
}

impl EngineConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl StoreConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system.quality == 0 || self.system.quality > 100 {
            return Err(ConfigError::Validation(
                "system.quality must be 1-100".into(),
            ));
        }
        if self.storage.allowed_formats.is_empty() {
            return Err(ConfigError::Validation(
                "storage.allowed_formats must not be empty".into(),
            ));
        }
        let format = self.system.format.to_ascii_lowercase();
        if !self.storage.allowed_formats.contains(&format) {
            return Err(ConfigError::Validation(format!(
                "system.format \"{}\" is not in storage.allowed_formats",
                self.system.format
            )));
        }
        for line in &self.system.headers {
            match line.split_once(':') {
                Some((name, _)) if !name.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "system.headers entry \"{line}\" is not \"Name: value\""
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Stock config with all options documented, printed by `gen-config`.
/// Kept in sync with the defaults by a test below.
pub fn stock_config_toml() -> &'static str {
    "\
# pixvault configuration - all options are optional, defaults shown

[system]
quality = 90              # Default re-encode quality when `q` is absent (1-100)
format = \"jpg\"            # Default output format when `f` is absent/invalid
etag = true               # Compute ETags over response bytes
headers = []              # Extra response headers, e.g. [\"Cache-Control: max-age=86400\"]

[storage]
mode = \"file\"             # file | kv | none
root = \"store\"            # File backend root directory
save_new = true           # Default persist policy when `s` is absent
allowed_formats = [\"jpg\", \"jpeg\", \"png\", \"gif\", \"webp\"]

[engine]
timeout_ms = 0            # Transform deadline; 0 disables the bound
"
}
