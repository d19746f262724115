use crate::cache::HandleCache;
use crate::config::ThumbnailConfig;
use crate::error::{Error, Result};
use crate::models::ImageRecord;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{imageops, Rgb, RgbImage};
use std::path::Path;

/// Extensions the scanner recognizes as images.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "svg",
];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Renders a thumbnail from raw image bytes: scaled to fit the configured
/// box, centered on a white canvas of exactly that size, JPEG-encoded at the
/// configured quality. Sources over the byte limit are rejected outright.
pub fn render_thumbnail(data: &[u8], config: &ThumbnailConfig) -> Result<Vec<u8>> {
    if data.len() as u64 > config.max_source_bytes {
        return Err(Error::TooLarge {
            size: data.len() as u64,
            max: config.max_source_bytes,
        });
    }

    let source = image::load_from_memory(data)?;
    let scaled = source
        .resize(config.width, config.height, FilterType::Triangle)
        .to_rgb8();

    // Center on a white canvas; white also flattens any transparency.
    let mut canvas = RgbImage::from_pixel(config.width, config.height, Rgb([255, 255, 255]));
    let x = (config.width.saturating_sub(scaled.width())) / 2;
    let y = (config.height.saturating_sub(scaled.height())) / 2;
    imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);

    let quality = (config.quality.clamp(0.0, 1.0) * 100.0) as u8;
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&canvas)?;
    Ok(buf)
}

/// Returns a display-handle token for a record's persisted thumbnail, if it
/// has one. Already-cached keys are returned without touching recency.
pub fn thumbnail_handle(image: &ImageRecord, cache: &mut HandleCache) -> Option<String> {
    let id = image.id?;
    let key = format!("thumb-{id}");

    if let Some(token) = cache.lookup(&key) {
        return Some(token.to_string());
    }

    image
        .thumbnail
        .as_ref()
        .map(|blob| cache.acquire(&key, blob))
}
