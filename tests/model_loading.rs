//! Model loading, factories and the shared model cell

mod common;

use passport_photo::{
    backends::MockBackend, BackendFactory, BackendType, InferenceBackend, ModelCell, ModelConfig,
    ModelLoader, ModelWeights, PassportPhotoError, Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Factory that ignores the weights and hands out mock backends
struct MockFactory {
    created: AtomicUsize,
    probability: f32,
}

impl MockFactory {
    fn new(probability: f32) -> Self {
        Self {
            created: AtomicUsize::new(0),
            probability,
        }
    }
}

impl BackendFactory for MockFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        weights: ModelWeights,
    ) -> Result<Box<dyn InferenceBackend>> {
        assert!(weights.size_bytes() > 0);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockBackend::constant(self.probability)))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx, BackendType::Tract]
    }
}

fn weights_file(dir: &tempfile::TempDir, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join("unet_resnet34.onnx");
    std::fs::write(&path, contents).expect("weights file written");
    path
}

#[test]
fn test_load_through_custom_factory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = weights_file(&dir, b"opaque weights");
    let factory = MockFactory::new(1.0);

    let model = ModelLoader::load_with_factory(&path, &ModelConfig::default(), &factory)?;
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    assert_eq!(model.info().name, "unet_resnet34");
    assert_eq!(model.info().size_bytes, 14);
    assert_eq!(model.info().backend, "mock");
    assert_eq!(model.input_shape(), (1, 3, 256, 256));
    assert_eq!(model.output_shape(), (1, 1, 256, 256));
    Ok(())
}

#[test]
fn test_missing_weights_file() {
    let err = ModelLoader::load_with_factory(
        "/nonexistent/unet_resnet34.onnx",
        &ModelConfig::default(),
        &MockFactory::new(1.0),
    )
    .expect_err("missing file must fail");

    assert!(matches!(err, PassportPhotoError::ModelLoad(_)));
    assert!(err.to_string().contains("file not found"));
}

#[test]
fn test_empty_weights_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = weights_file(&dir, b"");

    let err = ModelLoader::load_with_factory(&path, &ModelConfig::default(), &MockFactory::new(1.0))
        .expect_err("empty file must fail");
    assert_eq!(err.kind(), "model_load");
    Ok(())
}

#[cfg(feature = "tract")]
#[test]
fn test_corrupt_weights_with_tract() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = weights_file(&dir, b"this is not a protobuf model");
    let config = ModelConfig::builder()
        .backend(BackendType::Tract)
        .execution_provider(passport_photo::ExecutionProvider::Cpu)
        .build()?;

    let err = ModelLoader::load(&path, &config).expect_err("corrupt weights must fail");
    assert!(matches!(err, PassportPhotoError::ModelLoad(_)));
    Ok(())
}

#[test]
fn test_cell_loads_once_under_concurrency() -> Result<()> {
    let cell = Arc::new(ModelCell::new());
    let loads = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cell = Arc::clone(&cell);
            let loads = Arc::clone(&loads);
            thread::spawn(move || {
                cell.get_or_try_init(|| {
                    loads.fetch_add(1, Ordering::SeqCst);
                    common::constant_model(1.0)
                })
            })
        })
        .collect();

    let models = handles
        .into_iter()
        .map(|handle| handle.join().expect("loader thread panicked"))
        .collect::<Result<Vec<_>>>()?;

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(models.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    Ok(())
}

#[test]
fn test_cell_retries_after_failed_load() -> Result<()> {
    let cell = ModelCell::new();

    let err = cell
        .get_or_load("/nonexistent/model.onnx", &ModelConfig::default())
        .expect_err("missing weights must fail");
    assert_eq!(err.kind(), "model_load");
    assert!(cell.get().is_none());

    let model = cell.get_or_try_init(|| common::constant_model(0.0))?;
    assert!(Arc::ptr_eq(&model, &cell.get().expect("cell filled")));
    Ok(())
}
