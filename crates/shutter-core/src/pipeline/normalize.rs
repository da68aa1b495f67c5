//! Orientation normalization and original-file sanitizing.

use image::DynamicImage;

use crate::config::{LimitsConfig, StorageConfig};
use crate::error::{DerivativeError, NormalizationError};
use crate::types::{EncodedImage, ImageKind, ORIGINAL_VARIANT};

use super::decode::ImageDecoder;
use super::derive::{encode_jpeg, encode_png};
use super::metadata::{strip_metadata, MetadataInspector, Orientation};

/// Upright pixels decoded from a validated upload.
///
/// Holds no embedded metadata; the orientation that was applied is kept only
/// so the original can be re-encoded consistently.
pub struct NormalizedImage {
    /// Upright pixel buffer (first frame for GIF)
    pub image: DynamicImage,
    /// Format the upload was decoded from
    pub source_format: ImageKind,
    /// Orientation read from EXIF and applied to `image`
    pub orientation: Orientation,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Decodes validated bytes and applies EXIF orientation.
pub struct Normalizer {
    decoder: ImageDecoder,
    strip_original_metadata: bool,
    original_quality: u8,
}

impl Normalizer {
    pub fn new(limits: LimitsConfig, storage: &StorageConfig) -> Self {
        Self {
            decoder: ImageDecoder::new(limits),
            strip_original_metadata: storage.strip_original_metadata,
            original_quality: storage.original_quality,
        }
    }

    /// Decode `bytes` as `kind` and rotate/flip the pixels upright.
    pub fn normalize(
        &self,
        bytes: &[u8],
        kind: ImageKind,
    ) -> Result<NormalizedImage, NormalizationError> {
        let decoded = self
            .decoder
            .decode(bytes, kind)
            .map_err(|e| NormalizationError::DecodeFailed {
                message: e.to_string(),
            })?;

        let orientation = match kind {
            ImageKind::Gif => Orientation::Normal,
            _ => MetadataInspector::orientation(bytes),
        };
        if !orientation.is_identity() {
            tracing::debug!(orientation = orientation.exif_value(), "Applying EXIF orientation");
        }

        Ok(NormalizedImage {
            image: orientation.apply(decoded.image),
            source_format: kind,
            orientation,
        })
    }

    /// Produce the bytes stored as the `original` artifact.
    ///
    /// Metadata is stripped from the container without touching image data.
    /// A rotated upload is re-encoded upright instead, since stripping would
    /// otherwise drop the tag that makes it display correctly. GIFs are kept
    /// verbatim.
    pub fn sanitize_original(
        &self,
        bytes: &[u8],
        normalized: &NormalizedImage,
    ) -> Result<EncodedImage, DerivativeError> {
        let kind = normalized.source_format;
        let encode_failed = |message: String| DerivativeError::EncodeFailed {
            variant: ORIGINAL_VARIANT.to_string(),
            message,
        };

        let (out, width, height) = if kind == ImageKind::Gif || !self.strip_original_metadata {
            let (w, h) = if normalized.orientation.swaps_dimensions() {
                (normalized.height(), normalized.width())
            } else {
                (normalized.width(), normalized.height())
            };
            (bytes.to_vec(), w, h)
        } else if normalized.orientation.is_identity() {
            let stripped = strip_metadata(bytes, kind).map_err(encode_failed)?;
            (stripped, normalized.width(), normalized.height())
        } else {
            let encoded = match kind {
                ImageKind::Png => encode_png(&normalized.image),
                _ => encode_jpeg(&normalized.image, self.original_quality),
            }
            .map_err(encode_failed)?;
            (encoded, normalized.width(), normalized.height())
        };

        Ok(EncodedImage {
            variant: ORIGINAL_VARIANT.to_string(),
            bytes: out,
            format: kind,
            width,
            height,
        })
    }
}
