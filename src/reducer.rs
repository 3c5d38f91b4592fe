//! Shrinks image references so they fit a bounded text channel such as the
//! payment provider's metadata values.
//!
//! The reducer never fails. It first tries to keep the input as is, then
//! recompresses it into a small JPEG thumbnail, and as a last resort cuts the
//! text down to the budget. A cut reference is usually no longer a valid
//! image, so callers check the returned [`Reduction`] before relying on it.

use anyhow::Result;
use image::GenericImageView;
use tracing::debug;

use crate::image_processing;

pub const DEFAULT_METADATA_MAX_CHARS: usize = 500;
pub const DEFAULT_THUMBNAIL_MAX_WIDTH: u32 = 64;
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 30;
pub const TRUNCATION_MARKER: &str = "...[truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerOptions {
    pub max_len: usize,
    pub max_width: u32,
    pub quality: u8,
    /// When recompression fails, an input shorter than this is returned
    /// untouched instead of being truncated.
    pub lenient_max_len: Option<usize>,
}

impl ReducerOptions {
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            ..Self::default()
        }
    }
}

impl Default for ReducerOptions {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_METADATA_MAX_CHARS,
            max_width: DEFAULT_THUMBNAIL_MAX_WIDTH,
            quality: DEFAULT_THUMBNAIL_QUALITY,
            lenient_max_len: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    Bytes(&'a [u8]),
    Reference(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    FitsAsIs(String),
    Recompressed { reference: String, width: u32, height: u32 },
    /// Recompression failed and the original was kept under the lenient limit.
    Passthrough { reference: String, reason: String },
    /// Cut to the budget. Does not decode as an image.
    Truncated(String),
}

impl Reduction {
    pub fn as_str(&self) -> &str {
        match self {
            Reduction::FitsAsIs(reference)
            | Reduction::Recompressed { reference, .. }
            | Reduction::Passthrough { reference, .. }
            | Reduction::Truncated(reference) => reference,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Reduction::FitsAsIs(reference)
            | Reduction::Recompressed { reference, .. }
            | Reduction::Passthrough { reference, .. }
            | Reduction::Truncated(reference) => reference,
        }
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self, Reduction::Truncated(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reduction::FitsAsIs(_) => "fits-as-is",
            Reduction::Recompressed { .. } => "recompressed",
            Reduction::Passthrough { .. } => "passthrough",
            Reduction::Truncated(_) => "truncated",
        }
    }
}

pub struct Thumbnail {
    pub reference: String,
    pub width: u32,
    pub height: u32,
}

pub fn reduce(source: ImageSource<'_>, options: &ReducerOptions) -> Reduction {
    let original = match source {
        ImageSource::Bytes(bytes) => {
            let mime_type =
                image_processing::detect_mime_type(bytes).unwrap_or("application/octet-stream");
            image_processing::encode_data_uri(bytes, mime_type)
        }
        ImageSource::Reference(reference) => reference.to_string(),
    };
    if char_len(&original) <= options.max_len {
        return Reduction::FitsAsIs(original);
    }

    let recompressed = match source {
        ImageSource::Bytes(bytes) => recompress(bytes, options),
        ImageSource::Reference(reference) => image_processing::decode_data_uri(reference)
            .and_then(|(_, bytes)| recompress(&bytes, options)),
    };
    match recompressed {
        Ok(thumbnail) if char_len(&thumbnail.reference) <= options.max_len => {
            Reduction::Recompressed {
                reference: thumbnail.reference,
                width: thumbnail.width,
                height: thumbnail.height,
            }
        }
        Ok(thumbnail) => {
            debug!(
                len = char_len(&thumbnail.reference),
                max_len = options.max_len,
                "thumbnail still over budget"
            );
            Reduction::Truncated(truncate_with_marker(&thumbnail.reference, options.max_len))
        }
        Err(err) => {
            debug!(error = %err, "recompression failed");
            match options.lenient_max_len {
                Some(limit) if char_len(&original) <= limit => Reduction::Passthrough {
                    reference: original,
                    reason: err.to_string(),
                },
                _ => Reduction::Truncated(truncate_with_marker(&original, options.max_len)),
            }
        }
    }
}

pub fn recompress(bytes: &[u8], options: &ReducerOptions) -> Result<Thumbnail> {
    let image = image_processing::load_image(bytes)?;
    let thumbnail = image_processing::downscale_to_width(&image, options.max_width);
    let (width, height) = thumbnail.dimensions();
    let jpeg = image_processing::encode_jpeg(&thumbnail, options.quality)?;
    Ok(Thumbnail {
        reference: image_processing::encode_data_uri(&jpeg, "image/jpeg"),
        width,
        height,
    })
}

/// Cuts `text` so the result, marker included, is exactly `max_len`
/// characters. Budgets too small for the marker get a bare cut.
pub fn truncate_with_marker(text: &str, max_len: usize) -> String {
    if char_len(text) <= max_len {
        return text.to_string();
    }
    let marker_len = char_len(TRUNCATION_MARKER);
    if max_len <= marker_len {
        return text.chars().take(max_len).collect();
    }
    let mut output: String = text.chars().take(max_len - marker_len).collect();
    output.push_str(TRUNCATION_MARKER);
    output
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    use super::*;

    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let mut seed: u32 = 0x2545_F491;
        let image = RgbImage::from_fn(width, height, |_, _| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let [r, g, b, _] = seed.to_le_bytes();
            Rgb([r, g, b])
        });
        let mut output = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut output, ImageFormat::Png)
            .unwrap();
        output.into_inner()
    }

    #[test]
    fn short_reference_is_returned_unchanged() {
        let url = "https://example.com/uploads/cat.png";
        let reduction = reduce(ImageSource::Reference(url), &ReducerOptions::default());
        assert_eq!(reduction, Reduction::FitsAsIs(url.to_string()));
    }

    #[test]
    fn small_bytes_fit_as_data_uri() {
        let bytes = noisy_png(1, 1);
        let options = ReducerOptions::with_max_len(10_000);
        let reduction = reduce(ImageSource::Bytes(&bytes), &options);
        let expected = image_processing::encode_data_uri(&bytes, "image/png");
        assert_eq!(reduction, Reduction::FitsAsIs(expected));
    }

    #[test]
    fn large_image_is_recompressed_into_budget() {
        let bytes = noisy_png(800, 600);
        let options = ReducerOptions::with_max_len(50_000);
        let reduction = reduce(ImageSource::Bytes(&bytes), &options);
        match &reduction {
            Reduction::Recompressed { reference, width, height } => {
                assert!(reference.starts_with("data:image/jpeg;base64,"));
                assert!(reference.len() <= 50_000);
                assert_eq!((*width, *height), (64, 48));
            }
            other => panic!("expected recompressed, got {}", other.kind()),
        }
        let (_, decoded) = image_processing::decode_data_uri(reduction.as_str()).unwrap();
        assert_eq!(image_processing::get_dimensions(&decoded).unwrap(), (64, 48));
    }

    #[test]
    fn data_uri_reference_is_recompressed() {
        let bytes = noisy_png(400, 400);
        let uri = image_processing::encode_data_uri(&bytes, "image/png");
        let reduction = reduce(ImageSource::Reference(&uri), &ReducerOptions::with_max_len(50_000));
        assert_eq!(reduction.kind(), "recompressed");
    }

    #[test]
    fn recompression_never_upscales() {
        let bytes = noisy_png(40, 30);
        let thumbnail = recompress(&bytes, &ReducerOptions::default()).unwrap();
        assert_eq!((thumbnail.width, thumbnail.height), (40, 30));
    }

    #[test]
    fn over_budget_after_recompression_is_truncated_to_budget() {
        let bytes = noisy_png(800, 600);
        let options = ReducerOptions::default();
        let reduction = reduce(ImageSource::Bytes(&bytes), &options);
        assert!(reduction.is_lossy());
        assert_eq!(reduction.as_str().len(), options.max_len);
        assert!(reduction.as_str().ends_with(TRUNCATION_MARKER));
        assert!(reduction.as_str().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn undecodable_reference_is_truncated() {
        let url = format!("https://example.com/{}", "a".repeat(1_000));
        let reduction = reduce(ImageSource::Reference(&url), &ReducerOptions::default());
        assert!(reduction.is_lossy());
        assert_eq!(reduction.as_str().chars().count(), 500);
        assert!(url.starts_with(reduction.as_str().trim_end_matches(TRUNCATION_MARKER)));
    }

    #[test]
    fn lenient_limit_keeps_original_on_failure() {
        let url = format!("https://example.com/{}", "b".repeat(600));
        let options = ReducerOptions {
            lenient_max_len: Some(2_000),
            ..ReducerOptions::default()
        };
        match reduce(ImageSource::Reference(&url), &options) {
            Reduction::Passthrough { reference, .. } => assert_eq!(reference, url),
            other => panic!("expected passthrough, got {}", other.kind()),
        }

        let strict = ReducerOptions {
            lenient_max_len: Some(100),
            ..ReducerOptions::default()
        };
        assert!(reduce(ImageSource::Reference(&url), &strict).is_lossy());
    }

    #[test]
    fn corrupt_bytes_do_not_fail() {
        let mut bytes = noisy_png(200, 200);
        bytes.truncate(2_000);
        let reduction = reduce(ImageSource::Bytes(&bytes), &ReducerOptions::default());
        assert_eq!(reduction.as_str().len(), 500);
    }

    #[test]
    fn truncation_length_is_exact() {
        let text = "x".repeat(100);
        let cut = truncate_with_marker(&text, 40);
        assert_eq!(cut.len(), 40);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncate_with_marker(&text, 5), "xxxxx");
        assert_eq!(truncate_with_marker("short", 40), "short");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(50);
        let cut = truncate_with_marker(&text, 20);
        assert_eq!(cut.chars().count(), 20);
    }
}
