//! Embedded metadata handling: EXIF inspection and container stripping.
//!
//! Only two things are ever read from metadata: the orientation tag, and
//! string fields scanned for script payloads. Nothing is carried forward.

use exif::{In, Reader, Tag, Value};
use image::DynamicImage;
use img_parts::{jpeg::Jpeg, png::Png, Bytes, ImageEXIF};
use std::io::Cursor;

use crate::types::ImageKind;

/// EXIF orientation (tag 0x0112) values.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Map an EXIF value; out-of-range values are treated as normal.
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    pub fn exif_value(&self) -> u32 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::Normal
    }

    /// Whether applying this orientation swaps width and height.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    /// Transform pixels so the image is upright.
    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => image,
            Self::FlipHorizontal => image.fliph(),
            Self::Rotate180 => image.rotate180(),
            Self::FlipVertical => image.flipv(),
            Self::Transpose => image.rotate90().fliph(),
            Self::Rotate90 => image.rotate90(),
            Self::Transverse => image.rotate270().fliph(),
            Self::Rotate270 => image.rotate270(),
        }
    }
}

/// Substrings that mark a metadata string as a script payload.
const SCRIPT_MARKERS: &[&str] = &["<script", "javascript:"];

/// Reads EXIF from in-memory image bytes.
pub struct MetadataInspector;

impl MetadataInspector {
    /// Parse EXIF from a JPEG or PNG container.
    ///
    /// Returns `None` if there is no EXIF or it cannot be parsed. Callers treat
    /// unreadable metadata as absent.
    pub fn read(bytes: &[u8]) -> Option<exif::Exif> {
        let mut cursor = Cursor::new(bytes);
        Reader::new().read_from_container(&mut cursor).ok()
    }

    /// Orientation declared by the image, or `Normal`.
    pub fn orientation(bytes: &[u8]) -> Orientation {
        Self::read(bytes)
            .and_then(|exif| {
                exif.get_field(Tag::Orientation, In::PRIMARY)
                    .and_then(|f| f.value.get_uint(0))
            })
            .map(Orientation::from_exif)
            .unwrap_or_default()
    }

    /// Name of the first text field carrying a script payload, if any.
    pub fn find_script_payload(bytes: &[u8]) -> Option<String> {
        let exif = Self::read(bytes)?;
        let found = exif
            .fields()
            .find(|field| {
                let chunks: Vec<&[u8]> = match &field.value {
                    Value::Ascii(parts) => parts.iter().map(Vec::as_slice).collect(),
                    Value::Undefined(raw, _) => vec![raw.as_slice()],
                    _ => return false,
                };
                chunks.iter().any(|chunk| {
                    let text = String::from_utf8_lossy(chunk).to_ascii_lowercase();
                    SCRIPT_MARKERS.iter().any(|marker| text.contains(marker))
                })
            })
            .map(|field| field.tag.to_string());
        found
    }
}

// JPEG segments that carry metadata rather than image data.
const JPEG_APP1: u8 = 0xE1; // EXIF, XMP
const JPEG_APP13: u8 = 0xED; // IPTC / Photoshop
const JPEG_COM: u8 = 0xFE;

// PNG ancillary chunks that carry text or EXIF.
const PNG_METADATA_CHUNKS: &[[u8; 4]] = &[*b"tEXt", *b"zTXt", *b"iTXt", *b"eXIf", *b"tIME"];

/// Remove metadata from a JPEG or PNG container without touching image data.
///
/// GIF carries no EXIF and is returned unchanged.
pub fn strip_metadata(bytes: &[u8], kind: ImageKind) -> Result<Vec<u8>, String> {
    let input = Bytes::copy_from_slice(bytes);
    match kind {
        ImageKind::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(input).map_err(|e| e.to_string())?;
            jpeg.set_exif(None);
            jpeg.segments_mut()
                .retain(|s| !matches!(s.marker(), JPEG_APP1 | JPEG_APP13 | JPEG_COM));
            Ok(jpeg.encoder().bytes().to_vec())
        }
        ImageKind::Png => {
            let mut png = Png::from_bytes(input).map_err(|e| e.to_string())?;
            png.set_exif(None);
            png.chunks_mut()
                .retain(|c| !PNG_METADATA_CHUNKS.contains(&c.kind()));
            Ok(png.encoder().bytes().to_vec())
        }
        ImageKind::Gif => Ok(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{
        gif_bytes, jpeg_bytes, png_bytes, tiff, with_exif, with_orientation, ExifEntry,
        TAG_IMAGE_DESCRIPTION, TAG_ORIENTATION,
    };

    #[test]
    fn test_orientation_from_exif_values() {
        for value in 1..=8 {
            assert_eq!(Orientation::from_exif(value).exif_value(), value);
        }
        assert_eq!(Orientation::from_exif(0), Orientation::Normal);
        assert_eq!(Orientation::from_exif(9), Orientation::Normal);
    }

    #[test]
    fn test_apply_swaps_dimensions() {
        let img = DynamicImage::new_rgb8(40, 10);
        for value in 1..=8 {
            let orientation = Orientation::from_exif(value);
            let out = orientation.apply(img.clone());
            let expected = if orientation.swaps_dimensions() {
                (10, 40)
            } else {
                (40, 10)
            };
            assert_eq!((out.width(), out.height()), expected, "orientation {value}");
        }
    }

    #[test]
    fn test_read_orientation_from_jpeg_and_png() {
        let jpeg = with_orientation(&jpeg_bytes(16, 8), 6);
        assert_eq!(MetadataInspector::orientation(&jpeg), Orientation::Rotate90);

        let png = with_orientation(&png_bytes(16, 8), 3);
        assert_eq!(MetadataInspector::orientation(&png), Orientation::Rotate180);
    }

    #[test]
    fn test_missing_exif_is_normal() {
        assert_eq!(MetadataInspector::orientation(&jpeg_bytes(8, 8)), Orientation::Normal);
        assert_eq!(MetadataInspector::orientation(&gif_bytes(8, 8)), Orientation::Normal);
        assert_eq!(MetadataInspector::orientation(b"garbage"), Orientation::Normal);
    }

    #[test]
    fn test_find_script_payload() {
        let exif = tiff(&[ExifEntry::Ascii(
            TAG_IMAGE_DESCRIPTION,
            "nice <SCRIPT>alert(1)</script>",
        )]);
        let bytes = with_exif(&jpeg_bytes(16, 16), exif);
        let tag = MetadataInspector::find_script_payload(&bytes);
        assert_eq!(tag.as_deref(), Some("ImageDescription"));
    }

    #[test]
    fn test_benign_strings_pass() {
        let exif = tiff(&[
            ExifEntry::Ascii(TAG_IMAGE_DESCRIPTION, "sunset over the bay"),
            ExifEntry::Short(TAG_ORIENTATION, 1),
        ]);
        let bytes = with_exif(&jpeg_bytes(16, 16), exif);
        assert!(MetadataInspector::find_script_payload(&bytes).is_none());
    }

    #[test]
    fn test_strip_metadata_removes_exif() {
        let exif = tiff(&[
            ExifEntry::Ascii(TAG_IMAGE_DESCRIPTION, "private location notes"),
            ExifEntry::Short(TAG_ORIENTATION, 6),
        ]);
        for source in [jpeg_bytes(16, 16), png_bytes(16, 16)] {
            let kind = crate::pipeline::decode::sniff(&source).unwrap();
            let tagged = with_exif(&source, exif.clone());
            assert!(MetadataInspector::read(&tagged).is_some());

            let stripped = strip_metadata(&tagged, kind).unwrap();
            assert!(MetadataInspector::read(&stripped).is_none());
            assert!(stripped.len() < tagged.len());
            assert!(image::load_from_memory(&stripped).is_ok());
        }
    }

    #[test]
    fn test_strip_metadata_gif_is_unchanged() {
        let gif = gif_bytes(8, 8);
        assert_eq!(strip_metadata(&gif, ImageKind::Gif).unwrap(), gif);
    }
}
