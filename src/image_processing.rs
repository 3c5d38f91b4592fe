use std::io::Cursor;

use anyhow::{anyhow, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

pub const PRINT_JPEG_QUALITY: u8 = 95;

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

pub fn mime_to_format(mime_type: &str) -> Result<ImageFormat> {
    match mime_type {
        "image/png" => Ok(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        "image/gif" => Ok(ImageFormat::Gif),
        "image/webp" => Ok(ImageFormat::WebP),
        "image/bmp" => Ok(ImageFormat::Bmp),
        _ => Err(anyhow!("unsupported mime type: {mime_type}")),
    }
}

pub fn get_extension_from_mime_type(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        _ => "bin",
    }
}

pub fn encode_data_uri(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Splits a `data:<mime>;base64,<payload>` reference into its mime type and
/// decoded bytes. Only base64 payloads are accepted.
pub fn decode_data_uri(reference: &str) -> Result<(String, Vec<u8>)> {
    let rest = reference
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("not a data uri"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("data uri has no payload"))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow!("data uri is not base64 encoded"))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| anyhow!("decode base64 failed: {err}"))?;
    Ok((mime_type.to_string(), bytes))
}

pub fn load_image(bytes: &[u8]) -> Result<DynamicImage> {
    let mime_type = detect_mime_type(bytes).ok_or_else(|| anyhow!("unrecognized image data"))?;
    let format = mime_to_format(mime_type)?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|err| anyhow!("decode image failed: {err}"))
}

pub fn get_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    Ok(load_image(bytes)?.dimensions())
}

/// Target size for fitting `width x height` into `max_width`, keeping the
/// aspect ratio. Images already narrower than `max_width` keep their size.
pub fn thumbnail_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled_height = (height as u64 * max_width as u64) as f64 / width as f64;
    (max_width, (scaled_height.round() as u32).max(1))
}

pub fn downscale_to_width(image: &DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let (target_width, target_height) = thumbnail_dimensions(width, height, max_width);
    if (target_width, target_height) == (width, height) {
        return image.clone();
    }
    image.resize_exact(target_width, target_height, FilterType::Triangle)
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut output, quality);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|err| anyhow!("encode jpeg failed: {err}"))?;
    Ok(output.into_inner())
}

pub fn print_dimensions(landscape: bool) -> (u32, u32) {
    if landscape { (3600, 2400) } else { (2400, 3600) }
}

/// Cover-resizes to exactly `width x height`, cropping from the center, and
/// re-encodes as high quality JPEG.
pub fn prepare_for_print(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let image = load_image(bytes)?;
    let filled = image.resize_to_fill(width, height, FilterType::Lanczos3);
    encode_jpeg(&filled, PRINT_JPEG_QUALITY)
}
