//! Error types for the Shutter ingestion pipeline.
//!
//! Errors are organized by stage. Every pipeline error carries a stable,
//! machine-readable reason code (`too_large`, `write_failed`, ...) so callers
//! can translate rejections into user-facing messages without string matching.

use std::fmt;
use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Top-level error type for Shutter operations.
#[derive(Error, Debug)]
pub enum ShutterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Upload ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Why an upload was rejected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Payload exceeds the configured byte limit
    TooLarge,
    /// Declared type, filename, or content is not an accepted image format
    BadFormat,
    /// Declared content type disagrees with the sniffed format
    TypeMismatch,
    /// Truncated, undecodable, or degenerate image data
    Corrupt,
    /// Pixel dimensions or decode allocation exceed the configured bounds
    OversizedDimensions,
    /// Embedded metadata carries script-like payloads
    UnsafeMetadata,
}

impl ValidationErrorKind {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::BadFormat => "bad_format",
            Self::TypeMismatch => "type_mismatch",
            Self::Corrupt => "corrupt",
            Self::OversizedDimensions => "oversized_dimensions",
            Self::UnsafeMetadata => "unsafe_metadata",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Validator rejection with a reason code and a human-readable detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Upload rejected ({kind}): {detail}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub detail: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Normalization errors.
#[derive(Error, Debug)]
pub enum NormalizationError {
    /// The validated bytes failed to decode a second time
    #[error("Decode failed during normalization: {message}")]
    DecodeFailed { message: String },
}

/// Derivative generation errors.
#[derive(Error, Debug)]
pub enum DerivativeError {
    /// A variant failed to encode; the whole batch is discarded
    #[error("Encoding variant '{variant}' failed: {message}")]
    EncodeFailed { variant: String, message: String },
}

/// Storage errors. `path` is always the artifact's relative storage path.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Writing the temporary file (or creating its directory) failed
    #[error("Write failed for {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Moving the temporary file into place failed (including an occupied destination)
    #[error("Rename into place failed for {path}: {source}")]
    RenameFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading a stored artifact back failed
    #[error("Read failed for {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Bytes read back from storage did not decode as the expected image
    #[error("Stored artifact {path} failed verification: {message}")]
    VerifyFailed { path: String, message: String },

    /// Removing an artifact failed
    #[error("Remove failed for {path}: {source}")]
    RemoveFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Relative path is absolute, empty, or escapes the storage root
    #[error("Invalid storage path: {path}")]
    InvalidPath { path: String },
}

impl StorageError {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::WriteFailed { .. } => "write_failed",
            Self::RenameFailed { .. } => "rename_failed",
            Self::ReadFailed { .. } => "read_failed",
            Self::VerifyFailed { .. } => "verify_failed",
            Self::RemoveFailed { .. } => "remove_failed",
            Self::InvalidPath { .. } => "invalid_path",
        }
    }
}

/// Any failure of a pipeline run. A run that returns this error has left no
/// artifacts behind on storage.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Derivative(#[from] DerivativeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The caller cancelled the upload before the named stage began
    #[error("Upload cancelled before the {stage} stage")]
    Cancelled { stage: PipelineStage },

    /// Processing exceeded the configured time budget
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout {
        stage: PipelineStage,
        timeout_ms: u64,
    },

    /// A blocking worker panicked or was shut down
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl IngestError {
    /// Stable, machine-readable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.kind.code(),
            Self::Normalization(NormalizationError::DecodeFailed { .. }) => "decode_failed",
            Self::Derivative(DerivativeError::EncodeFailed { .. }) => "encode_failed",
            Self::Storage(e) => e.code(),
            Self::Cancelled { .. } => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::Worker(_) => "worker_failed",
        }
    }

    /// Stage the run was in when it failed.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Validation(_) => PipelineStage::Received,
            Self::Normalization(_) => PipelineStage::Validated,
            Self::Derivative(_) => PipelineStage::Normalized,
            Self::Storage(_) => PipelineStage::Derived,
            Self::Cancelled { stage } | Self::Timeout { stage, .. } => *stage,
            Self::Worker(_) => PipelineStage::Received,
        }
    }

    /// Message suitable for showing to the uploader.
    pub fn user_message(&self) -> &'static str {
        match self.reason_code() {
            "too_large" => "The file is too large.",
            "bad_format" => "Unsupported file format. Upload a JPEG, PNG, or GIF image.",
            "type_mismatch" => "The file content does not match its declared type.",
            "corrupt" => "The file is not a valid image.",
            "oversized_dimensions" => "The image dimensions are too large.",
            "unsafe_metadata" => "The image contains invalid embedded data.",
            "cancelled" => "The upload was cancelled.",
            "timeout" => "Processing the image took too long. Please try again.",
            _ => "The image could not be processed. Please try again.",
        }
    }

    /// Whether the failure came from the upload itself rather than the server.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Convenience type alias for Shutter results.
pub type Result<T> = std::result::Result<T, ShutterError>;

/// Convenience type alias for ingest results.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
