use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use passport_photo::{
    backends::MockBackend, BackgroundSpec, Compositor, MaskResolver, Model, ModelConfig,
    OutputEncoder, OutputSize, PassportPhotoProcessor, Photo, PhotoRequest, ProbabilityMap,
};
use std::io::Cursor;
use std::sync::Arc;

const PHOTO_SIZES: [(u32, u32); 3] = [(320, 240), (1024, 768), (3024, 4032)];

fn gradient_photo(width: u32, height: u32) -> Photo {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    Photo::new(image).expect("benchmark photo is non-empty")
}

/// Disc of foreground in the middle of a 256×256 map
fn disc_probabilities() -> ProbabilityMap {
    let side = 256;
    let mut data = ndarray::Array2::<f32>::zeros((side, side));
    for ((y, x), value) in data.indexed_iter_mut() {
        let dy = y as f32 - 128.0;
        let dx = x as f32 - 128.0;
        *value = if dx * dx + dy * dy < 90.0 * 90.0 { 0.9 } else { 0.1 };
    }
    ProbabilityMap::new(data).expect("valid probability map")
}

fn bench_mask_resolution(c: &mut Criterion) {
    let probabilities = disc_probabilities();
    let mut group = c.benchmark_group("mask_resolution");

    for (width, height) in PHOTO_SIZES {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(width, height),
            |b, &(width, height)| {
                b.iter(|| {
                    MaskResolver::resolve(black_box(&probabilities), height, width)
                        .expect("mask resolves")
                });
            },
        );
    }

    group.finish();
}

fn bench_compositing(c: &mut Criterion) {
    let probabilities = disc_probabilities();
    let photo = gradient_photo(1024, 768);
    let mask = MaskResolver::resolve(&probabilities, photo.height(), photo.width())
        .expect("mask resolves");
    let mut group = c.benchmark_group("compositing");

    for background in [BackgroundSpec::BLUE, BackgroundSpec::Transparent] {
        for size in OutputSize::ALL {
            group.bench_with_input(
                BenchmarkId::new(background.to_string(), size.short_name()),
                &(background, size),
                |b, &(background, size)| {
                    b.iter(|| {
                        Compositor::compose(black_box(&photo), black_box(&mask), background, size)
                            .expect("compose succeeds")
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let model = Model::from_backend(
        Box::new(MockBackend::from_fn(|y, x| if (64..192).contains(&x) && y > 32 { 0.9 } else { 0.1 })),
        &ModelConfig::default(),
        "mock",
        0,
    )
    .expect("mock model loads");
    let processor = PassportPhotoProcessor::new(Arc::new(model));

    let mut upload = Vec::new();
    image::DynamicImage::ImageRgb8(gradient_photo(1024, 768).into_rgb())
        .write_to(&mut Cursor::new(&mut upload), image::ImageFormat::Jpeg)
        .expect("benchmark upload encodes");

    let request = PhotoRequest::new(BackgroundSpec::WHITE, OutputSize::Mm35x45);
    c.bench_function("end_to_end_mock_model", |b| {
        b.iter(|| {
            let result = processor
                .process_bytes(black_box(&upload), &request)
                .expect("pipeline succeeds");
            OutputEncoder::encode(&result.image).expect("png encodes")
        });
    });
}

criterion_group!(benches, bench_mask_resolution, bench_compositing, bench_end_to_end);
criterion_main!(benches);
