//! Format sniffing and limit-guarded decoding.
//!
//! Every decode in the pipeline goes through [`ImageDecoder`] so that the
//! dimension and allocation limits apply uniformly. The decoder is told the
//! sniffed format explicitly; it never guesses from a filename.

use image::{DynamicImage, GenericImageView, ImageError, ImageReader};
use std::io::Cursor;

use crate::config::LimitsConfig;
use crate::types::ImageKind;

/// Determine the real format of `bytes` from its magic numbers.
///
/// Only the formats we accept are recognized; everything else is `None`.
pub fn sniff(bytes: &[u8]) -> Option<ImageKind> {
    // JPEG: FF D8 FF
    if bytes.len() >= 3 && bytes[..3] == [0xFF, 0xD8, 0xFF] {
        return Some(ImageKind::Jpeg);
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if bytes.len() >= 8 && bytes[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some(ImageKind::Png);
    }

    // GIF: GIF87a or GIF89a
    if bytes.len() >= 6 && (&bytes[..6] == b"GIF87a" || &bytes[..6] == b"GIF89a") {
        return Some(ImageKind::Gif);
    }

    None
}

/// A decoded image together with the format it was decoded from.
pub struct DecodedImage {
    /// The decoded pixels (first frame for GIF)
    pub image: DynamicImage,
    /// Format the bytes were decoded as
    pub format: ImageKind,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

/// Decoder with configurable dimension and allocation limits.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Limits handed to the `image` crate. Exceeding them yields
    /// `ImageError::Limits` before large buffers are allocated.
    fn image_limits(&self) -> image::Limits {
        let mut limits = image::Limits::default();
        limits.max_image_width = Some(self.limits.max_image_dimension);
        limits.max_image_height = Some(self.limits.max_image_dimension);
        limits.max_alloc = Some(self.limits.max_decode_alloc_bytes());
        limits
    }

    fn reader<'a>(&self, bytes: &'a [u8], kind: ImageKind) -> ImageReader<Cursor<&'a [u8]>> {
        let mut reader = ImageReader::with_format(Cursor::new(bytes), kind.image_format());
        reader.limits(self.image_limits());
        reader
    }

    /// Read width and height from the image header only.
    pub fn read_dimensions(&self, bytes: &[u8], kind: ImageKind) -> Result<(u32, u32), ImageError> {
        self.reader(bytes, kind).into_dimensions()
    }

    /// Fully decode `bytes` as `kind`.
    pub fn decode(&self, bytes: &[u8], kind: ImageKind) -> Result<DecodedImage, ImageError> {
        let image = self.reader(bytes, kind).decode()?;
        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format: kind,
            width,
            height,
        })
    }
}

/// Whether a decode error was caused by the configured limits.
pub fn is_limit_error(err: &ImageError) -> bool {
    matches!(err, ImageError::Limits(_))
}
