//! Shared fixtures for integration tests

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use passport_photo::{
    backends::MockBackend, Model, ModelConfig, PassportPhotoProcessor, Result,
};
use std::io::Cursor;
use std::sync::Arc;

pub(crate) const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub(crate) const BLUE: Rgb<u8> = Rgb([0, 0, 200]);

/// Model backed by a mock predicting `probability` everywhere
pub(crate) fn constant_model(probability: f32) -> Result<Model> {
    Model::from_backend(
        Box::new(MockBackend::constant(probability)),
        &ModelConfig::default(),
        "mock-constant",
        0,
    )
}

/// Model whose foreground is the central vertical band of the frame
pub(crate) fn band_model() -> Result<Model> {
    Model::from_backend(
        Box::new(MockBackend::from_fn(|_, x| if (64..192).contains(&x) { 0.95 } else { 0.05 })),
        &ModelConfig::default(),
        "mock-band",
        0,
    )
}

pub(crate) fn processor(model: Model) -> PassportPhotoProcessor {
    PassportPhotoProcessor::new(Arc::new(model))
}

pub(crate) fn solid_photo(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(width, height, color)
}

/// Photo with a horizontal and vertical colour gradient
pub(crate) fn gradient_photo(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

pub(crate) fn encode(image: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("test image encodes");
    bytes
}

pub(crate) fn png_bytes(image: RgbImage) -> Vec<u8> {
    encode(image, ImageFormat::Png)
}

pub(crate) fn jpeg_bytes(image: RgbImage) -> Vec<u8> {
    encode(image, ImageFormat::Jpeg)
}
