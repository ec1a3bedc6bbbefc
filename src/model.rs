//! Segmentation model loading and process-wide sharing
//!
//! A [`Model`] is loaded once, verified with a warm-up forward pass, and then
//! shared read-only by every request. [`ModelCell`] guards the one-time load
//! against concurrent first callers.

use crate::{
    config::{BackendType, ModelConfig},
    error::{PassportPhotoError, Result},
    inference::InferenceBackend,
    segmentation::SegmentationEngine,
    types::{ModelTensor, ProbabilityMap},
};
use instant::Instant;
use log::{debug, info, warn};
use ndarray::Array4;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Serialized network parameters read from a weights file
#[derive(Clone)]
pub struct ModelWeights {
    name: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for ModelWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelWeights")
            .field("name", &self.name)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl ModelWeights {
    /// Read a weights file from disk
    ///
    /// # Errors
    /// - File missing, unreadable or empty
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PassportPhotoError::model_load_with_context(
                path,
                "file not found",
                &["check the --model path", "export the network to ONNX first"],
            ));
        }

        let bytes = std::fs::read(path).map_err(|e| {
            PassportPhotoError::model_load_with_context(path, &e.to_string(), &[])
        })?;

        let name = path
            .file_stem()
            .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned());

        Self::from_bytes(name, bytes)
    }

    /// Wrap in-memory weights
    ///
    /// # Errors
    /// - Empty buffer
    pub fn from_bytes<S: Into<String>>(name: S, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        if bytes.is_empty() {
            return Err(PassportPhotoError::model_load(format!(
                "Weights for '{name}' are empty"
            )));
        }
        Ok(Self { name, bytes })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend of the given type over `weights`
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        weights: ModelWeights,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Backend factory honouring the compiled-in backend features
#[derive(Debug, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        weights: ModelWeights,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_weights(
                weights,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_weights(
                weights,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                drop(weights);
                Err(PassportPhotoError::model_load(format!(
                    "Backend '{other}' is not available in this build (enable the '{other}' feature)"
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        #[allow(unused_mut)]
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Diagnostic information about a loaded model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Model name (weights file stem)
    pub name: String,
    /// Backend running the model
    pub backend: String,
    /// Size of the serialized parameters
    pub size_bytes: u64,
    /// NCHW input shape
    pub input_shape: (usize, usize, usize, usize),
    /// NCHW output shape
    pub output_shape: (usize, usize, usize, usize),
    /// Parse + warm-up time
    pub load_time_ms: u64,
}

/// Loaded, verified segmentation model shared by all requests
///
/// Immutable after construction. Forward passes are serialized through an
/// internal mutex, so a `&Model` can be used from many threads at once.
pub struct Model {
    backend: Mutex<Box<dyn InferenceBackend>>,
    config: ModelConfig,
    info: ModelInfo,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("config", &self.config)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Initialize an injected backend and verify it against `config`
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Backend initialization failures
    /// - Backend or probe output shapes that differ from the configured shapes
    pub fn from_backend<S: Into<String>>(
        mut backend: Box<dyn InferenceBackend>,
        config: &ModelConfig,
        name: S,
        size_bytes: u64,
    ) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let load_start = Instant::now();

        backend
            .initialize(config)
            .map_err(|e| Self::as_load_error(&name, e))?;

        if backend.input_shape() != config.input_shape() {
            return Err(PassportPhotoError::model_load(format!(
                "Model '{name}' expects input {:?}, configured for {:?}",
                backend.input_shape(),
                config.input_shape()
            )));
        }

        // Warm-up probe: one forward pass proves the weights fit the architecture
        let (n, c, h, w) = config.input_shape();
        let probe = backend
            .infer(&Array4::<f32>::zeros((n, c, h, w)))
            .map_err(|e| Self::as_load_error(&name, e))?;
        if probe.dim() != config.output_shape() {
            return Err(PassportPhotoError::model_load(format!(
                "Model '{name}' is shape-incompatible: produced {:?}, expected {:?}",
                probe.dim(),
                config.output_shape()
            )));
        }

        let info = ModelInfo {
            name,
            backend: backend.name().to_string(),
            size_bytes,
            input_shape: config.input_shape(),
            output_shape: config.output_shape(),
            load_time_ms: load_start.elapsed().as_millis() as u64,
        };

        info!(
            "✅ Model '{}' ready on {} backend in {}ms",
            info.name, info.backend, info.load_time_ms
        );

        Ok(Self {
            backend: Mutex::new(backend),
            config: config.clone(),
            info,
        })
    }

    fn as_load_error(name: &str, error: PassportPhotoError) -> PassportPhotoError {
        match error {
            PassportPhotoError::ModelLoad(_) => error,
            other => PassportPhotoError::model_load(format!("Model '{name}': {other}")),
        }
    }

    /// Segment one tensor into a foreground probability map
    ///
    /// # Errors
    /// See [`SegmentationEngine::segment`]
    pub fn infer(&self, tensor: &ModelTensor) -> Result<ProbabilityMap> {
        SegmentationEngine::segment(self, tensor)
    }

    /// Raw forward pass returning logits, serialized across callers
    ///
    /// # Errors
    /// - Backend inference failures
    pub fn forward(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        backend.infer(input)
    }

    /// Side length of the square model input
    #[must_use]
    pub fn input_size(&self) -> u32 {
        self.config.input_size
    }

    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.info.input_shape
    }

    #[must_use]
    pub fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.info.output_shape
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    #[must_use]
    pub fn info(&self) -> &ModelInfo {
        &self.info
    }
}

/// Loads weights files into verified [`Model`]s
pub struct ModelLoader;

impl ModelLoader {
    /// Load a model with the backends compiled into this build
    ///
    /// # Errors
    /// - Missing, unreadable or corrupt weights file
    /// - Weights incompatible with the configured input/output shape
    pub fn load<P: AsRef<Path>>(weights_path: P, config: &ModelConfig) -> Result<Model> {
        Self::load_with_factory(weights_path, config, &DefaultBackendFactory)
    }

    /// Load a model through a custom backend factory
    ///
    /// # Errors
    /// See [`ModelLoader::load`]
    pub fn load_with_factory<P: AsRef<Path>>(
        weights_path: P,
        config: &ModelConfig,
        factory: &dyn BackendFactory,
    ) -> Result<Model> {
        let path = weights_path.as_ref();
        info!("🧠 Loading segmentation model from {}", path.display());
        debug!("Backend: {}, provider: {}", config.backend, config.execution_provider);

        config.validate()?;
        let weights = ModelWeights::from_file(path)?;
        Self::load_weights(weights, config, factory)
    }

    /// Load a model from weights already in memory
    ///
    /// # Errors
    /// See [`ModelLoader::load`]
    pub fn load_weights(
        weights: ModelWeights,
        config: &ModelConfig,
        factory: &dyn BackendFactory,
    ) -> Result<Model> {
        let name = weights.name().to_string();
        let size_bytes = weights.size_bytes();
        let backend = factory.create_backend(config.backend, weights)?;
        Model::from_backend(backend, config, name, size_bytes)
    }
}

/// Once-only, process-wide holder for a loaded [`Model`]
///
/// Concurrent first callers race on an init lock; exactly one performs the
/// load and the rest receive the same `Arc<Model>`. A failed load is not
/// cached, so the next caller tries again.
#[derive(Debug, Default)]
pub struct ModelCell {
    model: OnceLock<Arc<Model>>,
    init_lock: Mutex<()>,
}

impl ModelCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            model: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// The loaded model, if initialization already succeeded
    #[must_use]
    pub fn get(&self) -> Option<Arc<Model>> {
        self.model.get().cloned()
    }

    /// Return the model, running `init` only if no model is loaded yet
    ///
    /// # Errors
    /// - Whatever `init` returns
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<Model>>
    where
        F: FnOnce() -> Result<Model>,
    {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(init()?);
        if self.model.set(Arc::clone(&model)).is_err() {
            warn!("Model cell was filled concurrently; keeping the first model");
        }
        Ok(self.get().unwrap_or(model))
    }

    /// Return the model, loading it from `weights_path` on first use
    ///
    /// # Errors
    /// See [`ModelLoader::load`]
    pub fn get_or_load<P: Into<PathBuf>>(
        &self,
        weights_path: P,
        config: &ModelConfig,
    ) -> Result<Arc<Model>> {
        let path = weights_path.into();
        self.get_or_try_init(|| ModelLoader::load(&path, config))
    }
}
