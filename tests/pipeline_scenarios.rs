//! End-to-end scenarios through the public pipeline API

mod common;

use common::{constant_model, jpeg_bytes, png_bytes, solid_photo, BLUE, WHITE};
use image::Rgb;
use passport_photo::{
    create_passport_photo, BackgroundSpec, OutputSize, PhotoRequest, Result,
};

#[test]
fn test_full_foreground_keeps_white_photo() -> Result<()> {
    let model = constant_model(1.0)?;
    let upload = png_bytes(solid_photo(400, 300, WHITE));
    let request = PhotoRequest::new(BackgroundSpec::BLUE, OutputSize::Mm35x45);

    let encoded = create_passport_photo(&upload, &model, &request)?;
    assert_eq!(encoded.dimensions, (413, 531));
    assert_eq!(encoded.channels, 3);

    let decoded = image::load_from_memory(&encoded.bytes)
        .map_err(|e| passport_photo::PassportPhotoError::decode(e.to_string()))?
        .to_rgb8();
    assert_eq!(decoded.dimensions(), (413, 531));
    assert!(decoded.pixels().all(|pixel| *pixel == WHITE));
    Ok(())
}

#[test]
fn test_empty_foreground_yields_background_only() -> Result<()> {
    let model = constant_model(0.0)?;
    let upload = png_bytes(solid_photo(400, 300, WHITE));
    let request = PhotoRequest::new(BackgroundSpec::BLUE, OutputSize::Mm35x45);

    let encoded = create_passport_photo(&upload, &model, &request)?;
    let decoded = image::load_from_memory(&encoded.bytes)
        .map_err(|e| passport_photo::PassportPhotoError::decode(e.to_string()))?
        .to_rgb8();
    assert_eq!(decoded.dimensions(), (413, 531));
    assert!(decoded.pixels().all(|pixel| *pixel == BLUE));
    Ok(())
}

#[test]
fn test_output_size_table() -> Result<()> {
    let model = constant_model(0.0)?;
    let upload = jpeg_bytes(solid_photo(120, 90, Rgb([90, 60, 30])));

    let expected = [
        (OutputSize::TwoByTwoInch, (600, 600)),
        (OutputSize::Mm35x45, (413, 531)),
        (OutputSize::Mm40x50, (472, 591)),
    ];
    for (size, dimensions) in expected {
        assert_eq!(size.pixels(), dimensions);

        let request = PhotoRequest::new(BackgroundSpec::WHITE, size);
        let encoded = create_passport_photo(&upload, &model, &request)?;
        assert_eq!(encoded.dimensions, dimensions, "size {size}");

        let decoded = image::load_from_memory(&encoded.bytes)
            .map_err(|e| passport_photo::PassportPhotoError::decode(e.to_string()))?;
        assert_eq!((decoded.width(), decoded.height()), dimensions);
    }
    Ok(())
}

#[test]
fn test_transparent_background_scenario() -> Result<()> {
    let model = constant_model(0.0)?;
    let upload = png_bytes(solid_photo(64, 48, WHITE));
    let request = PhotoRequest::new(BackgroundSpec::Transparent, OutputSize::TwoByTwoInch);

    let encoded = create_passport_photo(&upload, &model, &request)?;
    assert_eq!(encoded.channels, 4);

    let decoded = image::load_from_memory(&encoded.bytes)
        .map_err(|e| passport_photo::PassportPhotoError::decode(e.to_string()))?
        .to_rgba8();
    assert_eq!(decoded.dimensions(), (600, 600));
    assert!(decoded.pixels().all(|pixel| pixel[3] == 0));
    Ok(())
}
