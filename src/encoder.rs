//! Lossless PNG serialization of the final image

use crate::{
    error::{PassportPhotoError, Result},
    types::{EncodedPhoto, FinalImage},
};
use image::{
    codecs::png::{CompressionType, FilterType, PngEncoder},
    ExtendedColorType, ImageEncoder,
};

/// Suggested file name for downloads
pub const DEFAULT_FILENAME: &str = "passport.png";

/// MIME type of every encoded photo
pub const PNG_MIME_TYPE: &str = "image/png";

/// PNG encoder preserving the channel count of the final image
pub struct OutputEncoder;

impl OutputEncoder {
    /// Encode a final image to PNG
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn encode(image: &FinalImage) -> Result<EncodedPhoto> {
        let (width, height) = image.dimensions();
        Self::encode_pixels(image.as_raw(), width, height, image.channels())
    }

    /// Encode a raw interleaved 8-bit buffer with 3 (RGB) or 4 (RGBA) channels
    ///
    /// # Errors
    /// - Channel count other than 3 or 4
    /// - Buffer length that does not match `width * height * channels`
    /// - PNG encoder failures
    pub fn encode_pixels(
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<EncodedPhoto> {
        let color_type = match channels {
            3 => ExtendedColorType::Rgb8,
            4 => ExtendedColorType::Rgba8,
            other => {
                return Err(PassportPhotoError::encode(format!(
                    "Unsupported channel count {other} (expected 3 or 4)"
                )))
            },
        };

        let expected = width as usize * height as usize * channels as usize;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(PassportPhotoError::encode(format!(
                "Pixel buffer has {} bytes, expected {expected} for {width}x{height}x{channels}",
                pixels.len()
            )));
        }

        let mut bytes = Vec::new();
        PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, FilterType::Adaptive)
            .write_image(pixels, width, height, color_type)
            .map_err(|e| PassportPhotoError::encode(format!("PNG encoding failed: {e}")))?;

        log::debug!(
            "Encoded {width}x{height} PNG with {channels} channels ({} bytes)",
            bytes.len()
        );

        Ok(EncodedPhoto {
            bytes,
            filename: DEFAULT_FILENAME.to_string(),
            mime_type: PNG_MIME_TYPE,
            dimensions: (width, height),
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_encode_rgb_roundtrip_pixels() {
        let img = RgbImage::from_fn(13, 7, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 99]));
        let encoded = OutputEncoder::encode(&FinalImage::Rgb(img.clone())).unwrap();

        assert_eq!(encoded.mime_type, "image/png");
        assert_eq!(encoded.filename, "passport.png");
        assert_eq!(encoded.dimensions, (13, 7));
        assert_eq!(encoded.channels, 3);

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgb8);
        assert_eq!(decoded.to_rgb8(), img);
    }

    #[test]
    fn test_encode_rgba_keeps_alpha() {
        let img = RgbaImage::from_fn(4, 4, |x, _| Rgba([1, 2, 3, if x < 2 { 0 } else { 255 }]));
        let encoded = OutputEncoder::encode(&FinalImage::Rgba(img.clone())).unwrap();
        assert_eq!(encoded.channels, 4);

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgba8);
        assert_eq!(decoded.to_rgba8(), img);
    }

    #[test]
    fn test_encode_pixels_rejects_bad_channels() {
        let err = OutputEncoder::encode_pixels(&[0; 8], 2, 2, 2).unwrap_err();
        assert!(matches!(err, PassportPhotoError::Encode(_)));
        assert!(OutputEncoder::encode_pixels(&[0; 4], 2, 2, 1).is_err());
    }

    #[test]
    fn test_encode_pixels_rejects_length_mismatch() {
        let err = OutputEncoder::encode_pixels(&[0; 11], 2, 2, 3).unwrap_err();
        assert!(matches!(err, PassportPhotoError::Encode(_)));
    }
}
