//! Core data types for the Shutter ingestion pipeline.
//!
//! These types describe what enters the pipeline (an upload), what the
//! validator learns about it, and what ends up on storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    /// Canonical MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    /// File extension used for stored artifacts.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    /// Parse a client-declared content type.
    ///
    /// Parameters (`; charset=...`) are ignored and matching is
    /// case-insensitive. Returns `None` for anything but JPEG, PNG, or GIF.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Guess from a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Corresponding `image` crate format.
    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Gif => image::ImageFormat::Gif,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
        })
    }
}

/// Who may see the resulting photo. Carried through to the caller untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A single upload as received from the web layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Raw uploaded bytes
    pub bytes: Vec<u8>,

    /// Content type declared by the client (not trusted)
    pub content_type: String,

    /// Owner identifier from the authenticated session
    pub owner_id: String,

    /// Requested visibility
    pub visibility: Visibility,

    /// Client-supplied filename. Display metadata only; never used in a path.
    pub filename: Option<String>,
}

impl UploadRequest {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            owner_id: owner_id.into(),
            visibility: Visibility::default(),
            filename: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// What the validator established about an accepted upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Format sniffed from the content
    pub format: ImageKind,

    /// Decoded width in pixels
    pub width: u32,

    /// Decoded height in pixels
    pub height: u32,

    /// Payload size in bytes
    pub byte_len: u64,
}

/// Encodings a derivative may be written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn kind(&self) -> ImageKind {
        match self {
            Self::Jpeg => ImageKind::Jpeg,
            Self::Png => ImageKind::Png,
        }
    }
}

/// A named output variant, e.g. `thumbnail` at 300px.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeSpec {
    /// Variant name; becomes part of the storage filename
    pub name: String,

    /// Target length of the longer edge in pixels
    pub max_edge: u32,

    /// Encoder quality (1-100). Ignored for PNG.
    pub quality: u8,

    /// Output encoding
    #[serde(default)]
    pub format: OutputFormat,

    /// Optional byte budget. When set, JPEG quality steps down until the
    /// output fits or the quality floor is reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
}

impl DerivativeSpec {
    pub fn jpeg(name: impl Into<String>, max_edge: u32, quality: u8) -> Self {
        Self {
            name: name.into(),
            max_edge,
            quality,
            format: OutputFormat::Jpeg,
            max_bytes: None,
        }
    }
}

/// An encoded image held in memory, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Variant name (`original` for the uploaded image)
    pub variant: String,

    /// Encoded file content
    pub bytes: Vec<u8>,

    /// Encoding of `bytes`
    pub format: ImageKind,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,
}

/// Variant name used for the original upload.
pub const ORIGINAL_VARIANT: &str = "original";

/// A file persisted by the pipeline.
///
/// Size, dimensions, and hash are taken from the bytes read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Variant name (`original`, `thumbnail`, ...)
    pub variant: String,

    /// Path relative to the storage root, `/`-separated
    pub path: String,

    /// Encoding of the stored file
    pub format: ImageKind,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Size in bytes
    pub byte_size: u64,

    /// BLAKE3 hash of the stored bytes; usable as a cache key
    pub content_hash: String,
}

impl StoredArtifact {
    pub fn is_original(&self) -> bool {
        self.variant == ORIGINAL_VARIANT
    }
}

/// Everything the caller records about one stored upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// `{millis}-{digest}` shared by all artifacts of the upload
    pub upload_key: String,

    /// Owner identifier as supplied by the caller
    pub owner_id: String,

    pub visibility: Visibility,

    /// Sanitized client filename, for display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Upload timestamp embedded in the storage paths
    pub created_at: DateTime<Utc>,

    /// Original first, then derivatives in configured order
    pub artifacts: Vec<StoredArtifact>,
}

impl UploadRecord {
    /// The stored original.
    pub fn original(&self) -> Option<&StoredArtifact> {
        self.artifacts.iter().find(|a| a.is_original())
    }

    /// A derivative by variant name.
    pub fn variant(&self, name: &str) -> Option<&StoredArtifact> {
        self.artifacts.iter().find(|a| a.variant == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parsing() {
        assert_eq!(ImageKind::from_content_type("image/jpeg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_content_type("IMAGE/JPG"), Some(ImageKind::Jpeg));
        assert_eq!(
            ImageKind::from_content_type("image/png; charset=binary"),
            Some(ImageKind::Png)
        );
        assert_eq!(ImageKind::from_content_type("image/gif"), Some(ImageKind::Gif));
        assert_eq!(ImageKind::from_content_type("image/webp"), None);
        assert_eq!(ImageKind::from_content_type("application/octet-stream"), None);
        assert_eq!(ImageKind::from_content_type(""), None);
    }

    #[test]
    fn test_extension_round_trip() {
        for kind in [ImageKind::Jpeg, ImageKind::Png, ImageKind::Gif] {
            assert_eq!(ImageKind::from_extension(kind.extension()), Some(kind));
            assert_eq!(ImageKind::from_content_type(kind.mime_type()), Some(kind));
        }
    }

    #[test]
    fn test_upload_request_builder() {
        let req = UploadRequest::new(vec![1, 2, 3], "image/png", "42")
            .with_visibility(Visibility::Private)
            .with_filename("cat.png");
        assert_eq!(req.owner_id, "42");
        assert_eq!(req.visibility, Visibility::Private);
        assert_eq!(req.filename.as_deref(), Some("cat.png"));
    }

    #[test]
    fn test_derivative_spec_serde_defaults() {
        let spec: DerivativeSpec =
            toml::from_str("name = \"thumbnail\"\nmax_edge = 300\nquality = 80\n").unwrap();
        assert_eq!(spec, DerivativeSpec::jpeg("thumbnail", 300, 80));
    }
}
