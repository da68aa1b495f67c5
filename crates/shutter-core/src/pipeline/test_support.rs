//! In-memory image fixtures shared by pipeline unit tests.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use img_parts::{jpeg::Jpeg, png::Png, Bytes, ImageEXIF};
use std::io::Cursor;

/// Deterministic, non-uniform RGB pattern so encodings are not trivially small
/// and rotations are distinguishable.
pub fn pattern(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x9E37_79B9;
    RgbImage::from_fn(width, height, |x, y| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let noise = (state & 0x1F) as u8;
        Rgb([
            ((x * 255) / width.max(1)) as u8 ^ noise,
            ((y * 255) / height.max(1)) as u8,
            (((x + y) * 3) % 256) as u8,
        ])
    })
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(pattern(width, height)), ImageFormat::Jpeg)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(pattern(width, height)), ImageFormat::Png)
}

pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    let rgba = DynamicImage::ImageRgb8(pattern(width, height)).to_rgba8();
    encode(&DynamicImage::ImageRgba8(rgba), ImageFormat::Gif)
}

/// PNG whose left half is fully transparent.
pub fn transparent_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([10, 20, 30, 255])
        }
    });
    encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

/// One IFD0 entry for [`tiff`].
pub enum ExifEntry<'a> {
    Short(u16, u16),
    Ascii(u16, &'a str),
}

/// Build a little-endian TIFF structure holding the given IFD0 entries.
/// Entries must be sorted by tag.
pub fn tiff(entries: &[ExifEntry<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());

    let mut data = Vec::new();
    let data_start = 8 + 2 + 12 * entries.len() as u32 + 4;

    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for entry in entries {
        match entry {
            ExifEntry::Short(tag, value) => {
                out.extend_from_slice(&tag.to_le_bytes());
                out.extend_from_slice(&3u16.to_le_bytes());
                out.extend_from_slice(&1u32.to_le_bytes());
                out.extend_from_slice(&value.to_le_bytes());
                out.extend_from_slice(&[0, 0]);
            }
            ExifEntry::Ascii(tag, text) => {
                let mut raw = text.as_bytes().to_vec();
                raw.push(0);
                out.extend_from_slice(&tag.to_le_bytes());
                out.extend_from_slice(&2u16.to_le_bytes());
                out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
                if raw.len() <= 4 {
                    raw.resize(4, 0);
                    out.extend_from_slice(&raw);
                } else {
                    let offset = data_start + data.len() as u32;
                    out.extend_from_slice(&offset.to_le_bytes());
                    data.extend_from_slice(&raw);
                    if data.len() % 2 == 1 {
                        data.push(0);
                    }
                }
            }
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&data);
    out
}

/// Attach raw EXIF (TIFF) data to a JPEG or PNG.
pub fn with_exif(bytes: &[u8], exif: Vec<u8>) -> Vec<u8> {
    let input = Bytes::copy_from_slice(bytes);
    if let Ok(mut jpeg) = Jpeg::from_bytes(input.clone()) {
        jpeg.set_exif(Some(Bytes::from(exif)));
        return jpeg.encoder().bytes().to_vec();
    }
    let mut png = Png::from_bytes(input).unwrap();
    png.set_exif(Some(Bytes::from(exif)));
    png.encoder().bytes().to_vec()
}

pub const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
pub const TAG_ORIENTATION: u16 = 0x0112;

/// Attach an EXIF orientation tag.
pub fn with_orientation(bytes: &[u8], orientation: u16) -> Vec<u8> {
    with_exif(bytes, tiff(&[ExifEntry::Short(TAG_ORIENTATION, orientation)]))
}
