//! Core data types flowing through the passport photo pipeline

use crate::{
    config::PhotoRequest,
    error::{PassportPhotoError, Result},
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbImage, RgbaImage};
use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decoded, orientation-corrected RGB photo
///
/// Dimensions are always non-zero and the channel order is RGB end-to-end.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    image: RgbImage,
}

impl Photo {
    /// Wrap an RGB raster
    ///
    /// # Errors
    /// - Width or height of zero
    pub fn new(image: RgbImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PassportPhotoError::decode(format!(
                "Image has empty dimensions {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }

    /// Convert any decoded image to a 3-channel photo (alpha dropped, gray replicated)
    ///
    /// # Errors
    /// - Width or height of zero
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::new(image.to_rgb8())
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }

    #[must_use]
    pub fn into_rgb(self) -> RgbImage {
        self.image
    }
}

/// Normalized NCHW float tensor fed to the segmentation network
///
/// Shape is `(1, 3, S, S)` with values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTensor {
    data: Array4<f32>,
}

impl ModelTensor {
    /// Wrap an NCHW array, checking batch and channel dimensions
    ///
    /// # Errors
    /// - Batch size other than 1 or channel count other than 3
    pub fn new(data: Array4<f32>) -> Result<Self> {
        let (n, c, h, w) = data.dim();
        if n != 1 || c != 3 || h == 0 || w == 0 {
            return Err(PassportPhotoError::inference(format!(
                "Model tensor must have shape (1, 3, H, W), got ({n}, {c}, {h}, {w})"
            )));
        }
        Ok(Self { data })
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    #[must_use]
    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }
}

/// Per-pixel foreground probability at model resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    data: Array2<f32>,
}

impl ProbabilityMap {
    /// Wrap a `(height, width)` matrix of probabilities
    ///
    /// # Errors
    /// - Empty matrix
    /// - Any value outside [0, 1] or NaN
    pub fn new(data: Array2<f32>) -> Result<Self> {
        let (h, w) = data.dim();
        if h == 0 || w == 0 {
            return Err(PassportPhotoError::inference("Probability map is empty"));
        }
        if data.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(PassportPhotoError::inference(
                "Probability map contains values outside [0, 1]",
            ));
        }
        Ok(Self { data })
    }

    /// Map with every pixel set to the same probability
    ///
    /// # Errors
    /// - Empty dimensions or probability outside [0, 1]
    pub fn filled(height: usize, width: usize, probability: f32) -> Result<Self> {
        Self::new(Array2::from_elem((height, width), probability))
    }

    /// (height, width)
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    #[must_use]
    pub fn get(&self, y: usize, x: usize) -> Option<f32> {
        self.data.get([y, x]).copied()
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }
}

/// Binary foreground mask at photo resolution (1 = subject, 0 = background)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mask {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Mask {
    /// Build a mask from row-major 0/1 values
    ///
    /// # Errors
    /// - Buffer length differs from `width * height`
    /// - Any value other than 0 or 1
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(PassportPhotoError::invalid_config(format!(
                "Mask buffer has {} values, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        if data.iter().any(|&v| v > 1) {
            return Err(PassportPhotoError::invalid_config(
                "Mask values must be 0 or 1",
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Mask with every value set to `value` (clamped to 0/1)
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            data: vec![value.min(1); width as usize * height as usize],
            width,
            height,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Row-major 0/1 values
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Share of pixels classified as foreground
    #[must_use]
    pub fn foreground_ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v == 1).count();
        foreground as f64 / self.data.len() as f64
    }

    /// Mask scaled to 0/255 as a grayscale image, for previews and debugging
    #[must_use]
    pub fn to_luma_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([self.get(x, y).unwrap_or(0) * 255])
        })
    }
}

/// Composited image at the requested output size
#[derive(Debug, Clone, PartialEq)]
pub enum FinalImage {
    /// Opaque background, 3 channels
    Rgb(RgbImage),
    /// Transparent background, 4 channels
    Rgba(RgbaImage),
}

impl FinalImage {
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Rgb(img) => img.width(),
            Self::Rgba(img) => img.width(),
        }
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        match self {
            Self::Rgb(img) => img.height(),
            Self::Rgba(img) => img.height(),
        }
    }

    /// (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    #[must_use]
    pub fn channels(&self) -> u8 {
        match self {
            Self::Rgb(_) => 3,
            Self::Rgba(_) => 4,
        }
    }

    /// Interleaved raw pixel bytes
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Rgb(img) => img.as_raw(),
            Self::Rgba(img) => img.as_raw(),
        }
    }

    #[must_use]
    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            Self::Rgb(img) => DynamicImage::ImageRgb8(img),
            Self::Rgba(img) => DynamicImage::ImageRgba8(img),
        }
    }
}

/// Encoded output ready to hand to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPhoto {
    /// PNG bytes
    pub bytes: Vec<u8>,
    /// Suggested download file name
    pub filename: String,
    /// MIME type of `bytes`
    pub mime_type: &'static str,
    /// (width, height)
    pub dimensions: (u32, u32),
    /// 3 for RGB, 4 for RGBA
    pub channels: u8,
}

impl EncodedPhoto {
    /// Write the encoded bytes to disk
    ///
    /// # Errors
    /// - File creation or write failures
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Per-stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Byte decoding and orientation correction
    pub decode_ms: u64,
    /// Resize and normalization into the model tensor
    pub preprocess_ms: u64,
    /// Forward pass and sigmoid
    pub inference_ms: u64,
    /// Thresholding and nearest-neighbour upsampling
    pub mask_ms: u64,
    /// Blending and output resize
    pub composite_ms: u64,
    /// PNG encoding, when performed
    pub encode_ms: Option<u64>,
    /// Whole pipeline
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// One-line breakdown for logs
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Preprocess: {}ms | Inference: {}ms | Mask: {}ms | Composite: {}ms",
            self.total_ms,
            self.decode_ms,
            self.preprocess_ms,
            self.inference_ms,
            self.mask_ms,
            self.composite_ms
        );
        if let Some(encode_ms) = self.encode_ms {
            summary.push_str(&format!(" | Encode: {encode_ms}ms"));
        }
        summary
    }
}

/// Metadata describing how a passport photo was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Background and size choices
    pub request: PhotoRequest,
    /// Original photo (width, height) after orientation correction
    pub original_dimensions: (u32, u32),
    /// Output (width, height)
    pub output_dimensions: (u32, u32),
    /// Share of original pixels kept as foreground
    pub foreground_ratio: f64,
    /// Stage timings
    pub timings: ProcessingTimings,
    /// Completion timestamp
    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(request: PhotoRequest, original_dimensions: (u32, u32)) -> Self {
        Self {
            request,
            original_dimensions,
            output_dimensions: request.size.pixels(),
            foreground_ratio: 0.0,
            timings: ProcessingTimings::default(),
            processed_at: Utc::now(),
        }
    }

    /// Serialize to pretty JSON for reports
    ///
    /// # Errors
    /// - Serialization failures
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            PassportPhotoError::encode(format!("Failed to serialize metadata: {e}"))
        })
    }
}

/// Result of one passport photo request
#[derive(Debug, Clone)]
pub struct PassportPhoto {
    /// Composited image at the requested size
    pub image: FinalImage,
    /// Binary mask at the original photo resolution
    pub mask: Mask,
    /// (width, height) of the upright input photo
    pub original_dimensions: (u32, u32),
    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl PassportPhoto {
    /// Encode to PNG and record the encoding time
    ///
    /// # Errors
    /// - PNG encoding failures
    pub fn encode(&mut self) -> Result<EncodedPhoto> {
        let encode_start = instant::Instant::now();
        let encoded = crate::encoder::OutputEncoder::encode(&self.image)?;
        self.metadata.timings.encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        Ok(encoded)
    }

    /// Encode to PNG and write it to `path`
    ///
    /// # Errors
    /// - PNG encoding or file write failures
    pub fn save_png<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.encode()?.save(path)
    }

    /// (width, height) of the final image
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
