//! Derivative generation: resized, recompressed variants of an upload.

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::error::DerivativeError;
use crate::types::{DerivativeSpec, EncodedImage, OutputFormat};

use super::normalize::NormalizedImage;

/// Quality never drops below this when fitting a byte budget.
pub const MIN_BUDGET_QUALITY: u8 = 60;

/// Quality decrement per step when fitting a byte budget.
pub const QUALITY_STEP: u8 = 5;

/// Generates the configured variants from a normalized image.
pub struct DerivativeGenerator {
    parallel: bool,
}

impl DerivativeGenerator {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    /// Generate one encoded image per spec, in spec order.
    ///
    /// Any failing variant fails the whole batch.
    pub fn generate(
        &self,
        normalized: &NormalizedImage,
        specs: &[DerivativeSpec],
    ) -> Result<Vec<EncodedImage>, DerivativeError> {
        if self.parallel && specs.len() > 1 {
            std::thread::scope(|scope| {
                let handles: Vec<_> = specs
                    .iter()
                    .map(|spec| scope.spawn(move || generate_one(&normalized.image, spec)))
                    .collect();
                handles
                    .into_iter()
                    .zip(specs)
                    .map(|(handle, spec)| {
                        handle.join().unwrap_or_else(|_| {
                            Err(DerivativeError::EncodeFailed {
                                variant: spec.name.clone(),
                                message: "encoder thread panicked".to_string(),
                            })
                        })
                    })
                    .collect()
            })
        } else {
            specs
                .iter()
                .map(|spec| generate_one(&normalized.image, spec))
                .collect()
        }
    }
}

fn generate_one(image: &DynamicImage, spec: &DerivativeSpec) -> Result<EncodedImage, DerivativeError> {
    let start = std::time::Instant::now();
    let resized = resize_to_fit(image, spec.max_edge);
    let (width, height) = resized.dimensions();

    let bytes = match spec.format {
        OutputFormat::Png => encode_png(&resized),
        OutputFormat::Jpeg => encode_jpeg_within_budget(&resized, spec.quality, spec.max_bytes),
    }
    .map_err(|message| DerivativeError::EncodeFailed {
        variant: spec.name.clone(),
        message,
    })?;

    tracing::trace!(
        variant = %spec.name,
        width,
        height,
        bytes = bytes.len(),
        "  Derivative: {:?}",
        start.elapsed()
    );

    Ok(EncodedImage {
        variant: spec.name.clone(),
        bytes,
        format: spec.format.kind(),
        width,
        height,
    })
}

/// Target size with the longer edge equal to `max_edge`, preserving aspect
/// ratio. Images already within bounds keep their size.
pub fn fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge {
        return (width, height);
    }
    let scale = |edge: u32| -> u32 {
        let scaled = (edge as u64 * max_edge as u64 + longer as u64 / 2) / longer as u64;
        (scaled as u32).max(1)
    };
    if width >= height {
        (max_edge, scale(height))
    } else {
        (scale(width), max_edge)
    }
}

fn resize_to_fit(image: &DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let (w, h) = fit_dimensions(width, height, max_edge);
    if (w, h) == (width, height) {
        image.clone()
    } else {
        image.resize_exact(w, h, FilterType::Lanczos3)
    }
}

/// Composite onto white, dropping alpha.
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Progressive JPEG with optimized Huffman tables.
pub(crate) fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    let rgb = flatten_onto_white(image);
    let (width, height) = rgb.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut comp = comp.start_compress(Vec::new()).map_err(|e| e.to_string())?;
    comp.write_scanlines(&rgb).map_err(|e| e.to_string())?;
    comp.finish().map_err(|e| e.to_string())
}

/// Encode at `quality`, stepping down until the output fits `max_bytes`.
/// Falls back to the floor-quality encoding when nothing fits.
fn encode_jpeg_within_budget(
    image: &DynamicImage,
    quality: u8,
    max_bytes: Option<u64>,
) -> Result<Vec<u8>, String> {
    let mut quality = quality;
    loop {
        let bytes = encode_jpeg(image, quality)?;
        match max_bytes {
            Some(limit) if bytes.len() as u64 > limit && quality > MIN_BUDGET_QUALITY => {
                quality = quality.saturating_sub(QUALITY_STEP).max(MIN_BUDGET_QUALITY);
            }
            _ => return Ok(bytes),
        }
    }
}

/// Lossless PNG at maximum compression.
pub(crate) fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilterType::Adaptive);
    image.write_with_encoder(encoder).map_err(|e| e.to_string())?;
    Ok(buf)
}
