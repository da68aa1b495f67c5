//! Fixtures shared by integration tests.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use img_parts::{jpeg::Jpeg, png::Png, Bytes, ImageEXIF};
use shutter_core::Config;
use std::io::Cursor;
use std::path::Path;

pub fn pattern(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let h = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503);
        Rgb([
            (x % 256) as u8,
            (y % 256) as u8,
            ((h >> 7) & 0x3F) as u8 + ((x + y) % 128) as u8,
        ])
    }))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    let image = if format == ImageFormat::Gif {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        image.clone()
    };
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&pattern(width, height), ImageFormat::Jpeg)
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(&pattern(width, height), ImageFormat::Png)
}

pub fn gif(width: u32, height: u32) -> Vec<u8> {
    encode(&pattern(width, height), ImageFormat::Gif)
}

/// Little-endian TIFF with an orientation tag and optional description.
pub fn exif_block(orientation: u16, description: Option<&str>) -> Vec<u8> {
    let mut entries: Vec<(u16, u16, u32, [u8; 4])> = Vec::new();
    let mut data = Vec::new();
    let count = if description.is_some() { 2 } else { 1 };
    let data_start = 8 + 2 + 12 * count + 4;

    if let Some(text) = description {
        let mut raw = text.as_bytes().to_vec();
        raw.push(0);
        let offset = (data_start + data.len()) as u32;
        entries.push((0x010E, 2, raw.len() as u32, offset.to_le_bytes()));
        data.extend_from_slice(&raw);
    }
    let mut value = [0u8; 4];
    value[..2].copy_from_slice(&orientation.to_le_bytes());
    entries.push((0x0112, 3, 1, value));

    let mut out = b"II".to_vec();
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, n, value) in entries {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&n.to_le_bytes());
        out.extend_from_slice(&value);
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&data);
    out
}

pub fn with_exif(bytes: &[u8], exif: Vec<u8>) -> Vec<u8> {
    let input = Bytes::copy_from_slice(bytes);
    if let Ok(mut jpeg) = Jpeg::from_bytes(input.clone()) {
        jpeg.set_exif(Some(exif.into()));
        return jpeg.encoder().bytes().to_vec();
    }
    let mut png = Png::from_bytes(input).unwrap();
    png.set_exif(Some(exif.into()));
    png.encoder().bytes().to_vec()
}

/// Default config rooted at `root`.
pub fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.root = root.to_path_buf();
    config
}

/// Number of regular files under `root`.
pub fn file_count(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}
