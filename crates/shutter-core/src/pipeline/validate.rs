//! Upload validation before any processing.

use crate::config::LimitsConfig;
use crate::error::{ValidationError, ValidationErrorKind};
use crate::types::{ImageKind, ValidationResult};

use super::decode::{is_limit_error, sniff, ImageDecoder};
use super::metadata::MetadataInspector;

/// Filename extensions that are never accepted, whatever the content.
const DANGEROUS_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "pif", "scr", "vbs", "js", "jar", "php", "asp", "jsp",
];

/// Validates raw upload bytes.
pub struct Validator {
    limits: LimitsConfig,
    decoder: ImageDecoder,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        let decoder = ImageDecoder::new(limits.clone());
        Self { limits, decoder }
    }

    /// Validate an upload. Pure inspection; nothing is written.
    ///
    /// Checks, in order:
    /// - Byte length is within limits
    /// - Declared content type is JPEG, PNG, or GIF
    /// - Client filename has no executable extension
    /// - Magic bytes identify an accepted format matching the declared one
    /// - Header dimensions are within bounds
    /// - The full image decodes under allocation limits
    /// - EXIF text fields carry no script payloads
    pub fn validate(
        &self,
        bytes: &[u8],
        content_type: &str,
        filename: Option<&str>,
    ) -> Result<ValidationResult, ValidationError> {
        use ValidationErrorKind::*;

        let len = bytes.len() as u64;
        let max = self.limits.max_file_size_bytes();
        if len > max {
            return Err(ValidationError::new(
                TooLarge,
                format!("{len} bytes exceeds the {max} byte limit"),
            ));
        }
        if len < self.limits.min_file_size_bytes {
            return Err(ValidationError::new(
                Corrupt,
                format!(
                    "{len} bytes is too small to be an image (minimum {})",
                    self.limits.min_file_size_bytes
                ),
            ));
        }

        let declared = ImageKind::from_content_type(content_type).ok_or_else(|| {
            ValidationError::new(
                BadFormat,
                format!("content type '{content_type}' is not accepted"),
            )
        })?;

        if let Some(ext) = filename.and_then(dangerous_extension) {
            return Err(ValidationError::new(
                BadFormat,
                format!("filename extension '.{ext}' is not accepted"),
            ));
        }

        let sniffed = sniff(bytes).ok_or_else(|| {
            ValidationError::new(BadFormat, "content is not a JPEG, PNG, or GIF image")
        })?;
        if sniffed != declared {
            return Err(ValidationError::new(
                TypeMismatch,
                format!("declared {declared}, content is {sniffed}"),
            ));
        }

        let (width, height) = self
            .decoder
            .read_dimensions(bytes, sniffed)
            .map_err(|e| self.decode_rejection(e))?;
        self.check_dimensions(width, height)?;

        let decoded = self
            .decoder
            .decode(bytes, sniffed)
            .map_err(|e| self.decode_rejection(e))?;
        self.check_dimensions(decoded.width, decoded.height)?;

        if let Some(tag) = MetadataInspector::find_script_payload(bytes) {
            return Err(ValidationError::new(
                UnsafeMetadata,
                format!("EXIF field {tag} contains script content"),
            ));
        }

        Ok(ValidationResult {
            format: sniffed,
            width: decoded.width,
            height: decoded.height,
            byte_len: len,
        })
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<(), ValidationError> {
        let min = self.limits.min_image_dimension;
        let max = self.limits.max_image_dimension;
        if width < min || height < min {
            return Err(ValidationError::new(
                ValidationErrorKind::Corrupt,
                format!("{width}x{height} is below the {min}px minimum"),
            ));
        }
        if width > max || height > max {
            return Err(ValidationError::new(
                ValidationErrorKind::OversizedDimensions,
                format!("{width}x{height} exceeds {max}x{max}"),
            ));
        }
        Ok(())
    }

    fn decode_rejection(&self, err: image::ImageError) -> ValidationError {
        if is_limit_error(&err) {
            ValidationError::new(ValidationErrorKind::OversizedDimensions, err.to_string())
        } else {
            ValidationError::new(ValidationErrorKind::Corrupt, err.to_string())
        }
    }
}

/// The last extension of `filename` if it is on the deny list.
fn dangerous_extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.trim().to_ascii_lowercase();
    DANGEROUS_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}
