//! Background replacement and output resizing

use crate::{
    config::{BackgroundSpec, OutputSize},
    error::{PassportPhotoError, Result},
    mask::resize_nearest,
    types::{FinalImage, Mask, Photo},
};
use image::{imageops::FilterType, Rgb, RgbImage, Rgba, RgbaImage};

/// Blends the photo over the requested background and resizes to the output size
pub struct Compositor;

impl Compositor {
    /// Composite `photo` over `background` using `mask` and resize to `size`
    ///
    /// Opaque backgrounds yield a 3-channel image. Transparent yields RGBA
    /// whose alpha is the mask scaled to {0, 255}.
    ///
    /// # Errors
    /// - Mask dimensions differ from photo dimensions
    pub fn compose(
        photo: &Photo,
        mask: &Mask,
        background: BackgroundSpec,
        size: OutputSize,
    ) -> Result<FinalImage> {
        if mask.dimensions() != photo.dimensions() {
            let error = PassportPhotoError::shape_mismatch(photo.dimensions(), mask.dimensions());
            tracing::error!(
                photo = ?photo.dimensions(),
                mask = ?mask.dimensions(),
                "Mask does not match photo: {error}"
            );
            return Err(error);
        }

        let (out_width, out_height) = size.pixels();
        let composed = match background {
            BackgroundSpec::Solid(color) => {
                let blended = blend_solid(photo, mask, color);
                FinalImage::Rgb(resize_smooth(&blended, out_width, out_height))
            },
            BackgroundSpec::Transparent => {
                FinalImage::Rgba(cutout_rgba(photo, mask, out_width, out_height))
            },
        };

        Ok(composed)
    }
}

/// `photo * mask + color * (1 - mask)` per channel at photo resolution
#[must_use]
pub fn blend_solid(photo: &Photo, mask: &Mask, color: [u8; 3]) -> RgbImage {
    let source = photo.as_rgb();
    RgbImage::from_fn(source.width(), source.height(), |x, y| {
        let weight = u16::from(mask.get(x, y).unwrap_or(0));
        let pixel = source.get_pixel(x, y);
        let channel = |c: usize| {
            let value = u16::from(pixel[c]) * weight + u16::from(color[c]) * (1 - weight);
            value.min(255) as u8
        };
        Rgb([channel(0), channel(1), channel(2)])
    })
}

/// RGBA cutout at `width`×`height`: colour resized smoothly, alpha by nearest neighbour
#[must_use]
pub fn cutout_rgba(photo: &Photo, mask: &Mask, width: u32, height: u32) -> RgbaImage {
    let color = resize_smooth(photo.as_rgb(), width, height);
    let alpha = resize_nearest(
        mask.as_slice(),
        mask.width() as usize,
        mask.height() as usize,
        width as usize,
        height as usize,
    );

    RgbaImage::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = *color.get_pixel(x, y);
        let index = y as usize * width as usize + x as usize;
        let a = alpha.get(index).copied().unwrap_or(0) * 255;
        Rgba([r, g, b, a])
    })
}

fn resize_smooth(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    image::imageops::resize(image, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    fn white_photo(width: u32, height: u32) -> Photo {
        Photo::new(RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))).unwrap()
    }

    #[test]
    fn test_full_foreground_keeps_photo() {
        let photo = white_photo(400, 300);
        let mask = Mask::filled(400, 300, 1);
        let image =
            Compositor::compose(&photo, &mask, BackgroundSpec::BLUE, OutputSize::Mm35x45).unwrap();

        assert_eq!(image.dimensions(), (413, 531));
        assert_eq!(image.channels(), 3);
        assert!(image.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_full_background_shows_color() {
        let photo = white_photo(400, 300);
        let mask = Mask::filled(400, 300, 0);
        let image =
            Compositor::compose(&photo, &mask, BackgroundSpec::BLUE, OutputSize::Mm35x45).unwrap();

        let FinalImage::Rgb(rgb) = image else {
            panic!("opaque background must produce RGB");
        };
        assert!(rgb.pixels().all(|p| *p == Rgb([0, 0, 200])));
    }

    #[test]
    fn test_blend_selects_per_pixel() {
        let photo = Photo::new(RgbImage::from_pixel(2, 1, Rgb([10, 20, 30]))).unwrap();
        let mask = Mask::new(vec![1, 0], 2, 1).unwrap();
        let blended = blend_solid(&photo, &mask, [255, 255, 255]);
        assert_eq!(blended.get_pixel(0, 0), &Rgb([10, 20, 30]));
        assert_eq!(blended.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_transparent_alpha_is_binary() {
        let photo = Photo::new(RgbImage::from_fn(120, 90, |x, y| {
            Rgb([(x * 2) as u8, (y * 2) as u8, 128])
        }))
        .unwrap();
        let mask_data = (0..90u32)
            .flat_map(|y| (0..120u32).map(move |x| u8::from((x + y) % 3 == 0)))
            .collect();
        let mask = Mask::new(mask_data, 120, 90).unwrap();

        for size in OutputSize::ALL {
            let image =
                Compositor::compose(&photo, &mask, BackgroundSpec::Transparent, size).unwrap();
            assert_eq!(image.channels(), 4);
            assert_eq!(image.dimensions(), size.pixels());
            let FinalImage::Rgba(rgba) = image else {
                panic!("transparent background must produce RGBA");
            };
            assert!(rgba.pixels().all(|p| p[3] == 0 || p[3] == 255));
        }
    }

    #[test]
    fn test_transparent_full_mask_is_opaque() {
        let photo = white_photo(50, 50);
        let mask = Mask::filled(50, 50, 1);
        let image =
            Compositor::compose(&photo, &mask, BackgroundSpec::Transparent, OutputSize::TwoByTwoInch)
                .unwrap();
        let FinalImage::Rgba(rgba) = image else {
            panic!("transparent background must produce RGBA");
        };
        assert!(rgba.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_shape_mismatch() {
        let photo = white_photo(400, 300);
        let mask = Mask::filled(300, 400, 1);
        let err = Compositor::compose(&photo, &mask, BackgroundSpec::WHITE, OutputSize::Mm40x50)
            .unwrap_err();
        assert!(matches!(
            err,
            PassportPhotoError::ShapeMismatch {
                expected: (400, 300),
                actual: (300, 400)
            }
        ));
        assert!(!err.is_recoverable());
    }

    struct ErrorEvents(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_shape_mismatch_logged_once() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorEvents(Arc::clone(&errors)));

        tracing::subscriber::with_default(subscriber, || {
            let photo = white_photo(40, 30);
            let mask = Mask::filled(30, 40, 1);
            assert!(
                Compositor::compose(&photo, &mask, BackgroundSpec::BLUE, OutputSize::Mm35x45)
                    .is_err()
            );
        });

        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let photo = Photo::new(RgbImage::from_fn(64, 48, |x, y| {
            Rgb([(x * 3) as u8, (y * 5) as u8, ((x + y) * 2) as u8])
        }))
        .unwrap();
        let mask_data = (0..48u32)
            .flat_map(|y| (0..64u32).map(move |x| u8::from(x > y)))
            .collect();
        let mask = Mask::new(mask_data, 64, 48).unwrap();

        let first =
            Compositor::compose(&photo, &mask, BackgroundSpec::WHITE, OutputSize::Mm40x50).unwrap();
        let second =
            Compositor::compose(&photo, &mask, BackgroundSpec::WHITE, OutputSize::Mm40x50).unwrap();
        assert_eq!(first, second);
    }
}
