//! Probability thresholding and nearest-neighbour mask upsampling

use crate::{
    error::{PassportPhotoError, Result},
    types::{Mask, ProbabilityMap},
};

/// Probabilities strictly above this value are foreground
pub const FOREGROUND_THRESHOLD: f32 = 0.5;

/// Converts model-resolution probabilities into a photo-resolution binary mask
pub struct MaskResolver;

impl MaskResolver {
    /// Threshold at [`FOREGROUND_THRESHOLD`] and resize to `target_height`×`target_width`
    ///
    /// Nearest-neighbour sampling keeps every value in {0, 1}. A probability of
    /// exactly 0.5 is background.
    ///
    /// # Errors
    /// - Zero target dimension
    pub fn resolve(
        probabilities: &ProbabilityMap,
        target_height: u32,
        target_width: u32,
    ) -> Result<Mask> {
        if target_height == 0 || target_width == 0 {
            return Err(PassportPhotoError::invalid_config(format!(
                "Mask target dimensions must be positive, got {target_width}x{target_height}"
            )));
        }

        let (src_height, src_width) = probabilities.dim();
        let binary = Self::binarize(probabilities);
        let data = resize_nearest(
            &binary,
            src_width,
            src_height,
            target_width as usize,
            target_height as usize,
        );

        Mask::new(data, target_width, target_height)
    }

    /// Row-major 0/1 values at model resolution
    #[must_use]
    pub fn binarize(probabilities: &ProbabilityMap) -> Vec<u8> {
        probabilities
            .as_array()
            .iter()
            .map(|&p| u8::from(p > FOREGROUND_THRESHOLD))
            .collect()
    }
}

/// Nearest-neighbour resize of a row-major single-channel buffer
///
/// Destination pixel `d` samples source index `d * src / dst`, clamped to the
/// last source index.
#[must_use]
pub fn resize_nearest(
    values: &[u8],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<u8> {
    if src_width == 0 || src_height == 0 || values.len() < src_width * src_height {
        return vec![0; dst_width * dst_height];
    }

    let column_map: Vec<usize> = (0..dst_width)
        .map(|x| (x * src_width / dst_width).min(src_width - 1))
        .collect();

    let mut resized = Vec::with_capacity(dst_width * dst_height);
    for y in 0..dst_height {
        let src_y = (y * src_height / dst_height).min(src_height - 1);
        let row = &values[src_y * src_width..(src_y + 1) * src_width];
        resized.extend(column_map.iter().map(|&src_x| row[src_x]));
    }
    resized
}
