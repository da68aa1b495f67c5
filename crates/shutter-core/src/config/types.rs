//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::DerivativeSpec;

/// Where and how artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored artifacts (supports `~`)
    pub root: PathBuf,

    /// Strip EXIF/XMP/comments from the stored original
    pub strip_original_metadata: bool,

    /// JPEG quality used when an original must be re-encoded upright
    pub original_quality: u8,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.shutter/media"),
            strip_original_metadata: true,
            original_quality: 95,
        }
    }
}

/// Largest accepted `limits.max_file_size_mb`.
pub const MAX_FILE_SIZE_MB_LIMIT: u64 = 1024;

/// Largest accepted `limits.max_decode_alloc_mb`.
pub const MAX_DECODE_ALLOC_MB_LIMIT: u64 = 64 * 1024;

/// Resource limits to protect against problematic uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum upload size in megabytes
    pub max_file_size_mb: u64,

    /// Minimum upload size in bytes
    pub min_file_size_bytes: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Minimum image dimension (width and height)
    pub min_image_dimension: u32,

    /// Maximum memory a single decode may allocate, in megabytes
    pub max_decode_alloc_mb: u64,

    /// Time budget for validate + normalize + derive, in milliseconds
    pub process_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            min_file_size_bytes: 100,
            max_image_dimension: 10000,
            min_image_dimension: 10,
            max_decode_alloc_mb: 512,
            process_timeout_ms: 30000,
        }
    }
}

impl LimitsConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn max_decode_alloc_bytes(&self) -> u64 {
        self.max_decode_alloc_mb.saturating_mul(1024 * 1024)
    }
}

/// Pipeline concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Uploads processed concurrently; bounds decoded pixel buffers in memory
    pub workers: usize,

    /// Generate derivatives for different specs on separate threads
    pub parallel_derivatives: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            parallel_derivatives: true,
        }
    }
}

/// Default derivative set: a 300px thumbnail and a 1920px display copy.
pub fn default_derivatives() -> Vec<DerivativeSpec> {
    vec![
        DerivativeSpec::jpeg("thumbnail", 300, 80),
        DerivativeSpec::jpeg("display", 1920, 85),
    ]
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
