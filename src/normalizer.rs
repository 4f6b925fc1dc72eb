//! Image Normalizer
//!
//! Bounds the payload size of uploaded exam photos before they are sent to
//! the model: orientation fix, RGB conversion, downscale, JPEG re-encode.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageDecoder, ImageReader,
    RgbImage,
};
use tracing::debug;

use crate::error::{Result, ServiceError};

/// Parameters controlling normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerSettings {
    /// Longest edge of the output, in pixels
    pub max_edge: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            max_edge: 1400,
            quality: 75,
        }
    }
}

/// A normalized image ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    /// Base64 (standard alphabet) of the JPEG bytes
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    /// Inline `data:` URL accepted by vision chat APIs.
    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64)
    }
}

/// Target dimensions that fit `(width, height)` inside `max_edge`,
/// preserving aspect ratio. Never upsizes.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return (width, height);
    }
    let scale = max_edge as f64 / longest as f64;
    let scaled = |v: u32| ((v as f64 * scale) as u32).max(1);
    (scaled(width), scaled(height))
}

/// Normalizes raw upload bytes.
///
/// Fails with [`ServiceError::Decode`] if the bytes are not a decodable image.
pub fn normalize(bytes: &[u8], settings: NormalizerSettings) -> Result<NormalizedImage> {
    if bytes.is_empty() {
        return Err(ServiceError::Decode("empty upload".to_string()));
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ServiceError::Decode(e.to_string()))?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);

    let rgb: RgbImage = img.into_rgb8();
    let (width, height) = rgb.dimensions();
    let (target_w, target_h) = fit_within(width, height, settings.max_edge);

    let rgb = if (target_w, target_h) != (width, height) {
        debug!(width, height, target_w, target_h, "downscaling image");
        image::imageops::resize(&rgb, target_w, target_h, FilterType::Lanczos3)
    } else {
        rgb
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, settings.quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| ServiceError::Internal(format!("jpeg encode failed: {}", e)))?;

    debug!(input = bytes.len(), output = jpeg.len(), "image normalized");

    Ok(NormalizedImage {
        base64: STANDARD.encode(&jpeg),
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Runs [`normalize`] on the blocking thread pool.
pub async fn normalize_blocking(
    bytes: Vec<u8>,
    settings: NormalizerSettings,
) -> Result<NormalizedImage> {
    tokio::task::spawn_blocking(move || normalize(&bytes, settings))
        .await
        .map_err(|e| ServiceError::Internal(format!("normalizer task failed: {}", e)))?
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
