//! Photo decoding and model input preparation

use crate::{
    error::{PassportPhotoError, Result},
    types::{ModelTensor, Photo},
};
use image::{imageops::FilterType, metadata::Orientation, DynamicImage, ImageFormat};
use ndarray::Array4;
use std::io::Cursor;
use std::path::Path;

/// Turns raw upload bytes into photos and photos into model tensors
pub struct Preprocessor;

impl Preprocessor {
    /// Decode JPEG or PNG bytes into an upright RGB photo
    ///
    /// Alpha is discarded, grayscale is replicated into three channels and the
    /// EXIF orientation tag (if any) is applied to the raster.
    ///
    /// # Errors
    /// - Unrecognized, unsupported or corrupt byte streams
    pub fn prepare(bytes: &[u8]) -> Result<Photo> {
        let format = image::guess_format(bytes)
            .map_err(|e| PassportPhotoError::decode(format!("Unrecognized image data: {e}")))?;

        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return Err(PassportPhotoError::decode(format!(
                "Unsupported image format {format:?} (expected JPEG or PNG)"
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| PassportPhotoError::decode(format!("Failed to decode {format:?}: {e}")))?;

        let orientation = read_exif_orientation(bytes);
        if orientation != 1 {
            log::debug!("Applying EXIF orientation {orientation}");
        }

        Photo::from_dynamic(&apply_orientation(image, orientation))
    }

    /// Read and decode a photo from disk
    ///
    /// # Errors
    /// - File read failures
    /// - See [`Preprocessor::prepare`]
    pub fn prepare_file<P: AsRef<Path>>(path: P) -> Result<Photo> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::prepare(&bytes)
    }

    /// Squash the photo to `size`×`size` and lay it out as a normalized NCHW tensor
    ///
    /// Non-square photos are stretched rather than letterboxed.
    ///
    /// # Errors
    /// - Zero target size
    pub fn to_model_tensor(photo: &Photo, size: u32) -> Result<ModelTensor> {
        if size == 0 {
            return Err(PassportPhotoError::invalid_config(
                "Model input size must be positive",
            ));
        }

        let resized = if photo.dimensions() == (size, size) {
            photo.as_rgb().clone()
        } else {
            image::imageops::resize(photo.as_rgb(), size, size, FilterType::Triangle)
        };

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match the resized raster
        for (y, row) in resized.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                tensor[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0;
                tensor[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0;
                tensor[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0;
            }
        }

        ModelTensor::new(tensor)
    }
}

/// EXIF orientation tag of the encoded image, 1 when absent or unreadable
#[must_use]
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .filter(|value| (1..=8).contains(value))
        .unwrap_or(1)
}

/// Apply an EXIF orientation value so the raster reads upright
///
/// Values outside 1-8 leave the image untouched.
#[must_use]
pub fn apply_orientation(mut image: DynamicImage, orientation: u32) -> DynamicImage {
    if let Some(orientation) = u8::try_from(orientation)
        .ok()
        .and_then(Orientation::from_exif)
    {
        image.apply_orientation(orientation);
    }
    image
}
