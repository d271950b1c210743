//! Decode / re-encode collaborators.
//!
//! The engine never decodes by itself; it asks an `ImageLoader` for RGBA8 pixels and a
//! `Reencoder` for the JPEG round trip used by error-level analysis.

use crate::img_errors::{ForensicsError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

pub trait ImageLoader: Send + Sync {
    /// Raw bytes -> decoded RGBA8 buffer. Failure is recoverable for the caller.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage>;
}

pub trait Reencoder: Send + Sync {
    /// Encode as JPEG at `quality` (0..1) and decode back to a same-size RGBA8 buffer.
    fn reencode_jpeg(&self, pixels: &RgbaImage, quality: f32) -> Result<RgbaImage>;
}

/// Loader and re-encoder backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCodec;

impl ImageLoader for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| ForensicsError::UnsupportedFormat(format!("Failed to decode image: {}", e)))?;
        Ok(img.to_rgba8())
    }
}

impl Reencoder for ImageCrateCodec {
    fn reencode_jpeg(&self, pixels: &RgbaImage, quality: f32) -> Result<RgbaImage> {
        let q = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
        let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, q)
            .encode_image(&rgb)
            .map_err(|e| ForensicsError::Reencode(e.to_string()))?;

        let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)
            .map_err(|e| ForensicsError::Reencode(e.to_string()))?
            .to_rgba8();

        if decoded.dimensions() != pixels.dimensions() {
            return Err(ForensicsError::Reencode(format!(
                "round trip changed dimensions {:?} -> {:?}",
                pixels.dimensions(),
                decoded.dimensions()
            )));
        }
        Ok(decoded)
    }
}

/// Encode pixels as JPEG bytes. Used by the CLI and tests to build inputs.
pub fn encode_jpeg(pixels: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(out)
}

/// Encode pixels as PNG bytes.
pub fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(pixels.clone()).write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_decode_png_round_trip() {
        let img = RgbaImage::from_pixel(7, 5, Rgba([10, 20, 30, 255]));
        let bytes = encode_png(&img).unwrap();
        let back = ImageCrateCodec.decode(&bytes).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_decode_garbage_is_unsupported() {
        let err = ImageCrateCodec.decode(b"not an image").unwrap_err();
        assert!(matches!(err, ForensicsError::UnsupportedFormat(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_reencode_keeps_dimensions() {
        let img = RgbaImage::from_fn(33, 17, |x, y| Rgba([(x * 7) as u8, (y * 11) as u8, 90, 255]));
        let out = ImageCrateCodec.reencode_jpeg(&img, 0.9).unwrap();
        assert_eq!(out.dimensions(), (33, 17));
    }
}
