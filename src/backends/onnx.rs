//! ONNX Runtime backend for the segmentation network
//!
//! Supports CPU, CUDA and `CoreML` execution providers. Requested GPU
//! providers that are unavailable fall back to CPU with a warning.

use crate::config::{ExecutionProvider, ModelConfig};
use crate::error::{PassportPhotoError, Result};
use crate::inference::InferenceBackend;
use crate::model::ModelWeights;
use instant::{Duration, Instant};
use log;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};
use ort::{self, value::Value};

/// ONNX Runtime backend running a segmentation network from in-memory weights
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    weights: ModelWeights,
    input_size: usize,
    initialized: bool,
}

impl OnnxBackend {
    /// Create an uninitialized backend over the given weights
    #[must_use]
    pub fn with_weights(weights: ModelWeights) -> Self {
        Self {
            session: None,
            weights,
            input_size: crate::config::MODEL_INPUT_SIZE as usize,
            initialized: false,
        }
    }

    fn is_available<P: OrtExecutionProvider>(provider: &P) -> bool {
        provider.is_available().unwrap_or(false)
    }

    fn configure_providers(
        session_builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let set_providers_error = |e: ort::Error| {
            PassportPhotoError::model_load(format!("Failed to set execution providers: {e}"))
        };

        let builder = match provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();

                let cuda_provider = CUDAExecutionProvider::default();
                if Self::is_available(&cuda_provider) {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                } else {
                    log::debug!("CUDA execution provider is not available");
                }

                let coreml_provider = CoreMLExecutionProvider::default();
                if Self::is_available(&coreml_provider) {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(coreml_provider.with_subgraphs(true).build());
                } else {
                    log::debug!("CoreML execution provider is not available");
                }

                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                    session_builder
                } else {
                    session_builder
                        .with_execution_providers(providers)
                        .map_err(set_providers_error)?
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                session_builder
            },
            ExecutionProvider::Cuda => {
                let cuda_provider = CUDAExecutionProvider::default();
                if Self::is_available(&cuda_provider) {
                    log::info!("Using CUDA execution provider");
                    session_builder
                        .with_execution_providers([cuda_provider.build()])
                        .map_err(set_providers_error)?
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
            ExecutionProvider::CoreMl => {
                let coreml_provider = CoreMLExecutionProvider::default();
                if Self::is_available(&coreml_provider) {
                    log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                    session_builder
                        .with_execution_providers([coreml_provider.with_subgraphs(true).build()])
                        .map_err(set_providers_error)?
                } else {
                    log::warn!(
                        "🚫 CoreML execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
        };

        Ok(builder)
    }

    fn load_model(&mut self, config: &ModelConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let session_builder = Session::builder()
            .map_err(|e| {
                PassportPhotoError::model_load(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                PassportPhotoError::model_load(format!("Failed to set optimization level: {e}"))
            })?;

        let session_builder = Self::configure_providers(session_builder, config.execution_provider)?;

        let available = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            available
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (available / 4).max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| PassportPhotoError::model_load(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| PassportPhotoError::model_load(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| PassportPhotoError::model_load(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(self.weights.bytes())
            .map_err(|e| {
                PassportPhotoError::model_load(format!(
                    "Failed to parse weights '{}': {e}",
                    self.weights.name()
                ))
            })?;

        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = self.weights.size_bytes() as f64 / (1024.0 * 1024.0);
        log::debug!("  - Model: {} ({size_mb:.2} MB)", self.weights.name());

        self.session = Some(session);
        self.input_size = config.input_size as usize;
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &ModelConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| PassportPhotoError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            PassportPhotoError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs avoid depending on exported tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PassportPhotoError::inference(format!("ONNX inference failed: {e}")))?;

        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| PassportPhotoError::inference("No output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| PassportPhotoError::inference("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    PassportPhotoError::inference(format!("Failed to extract output tensor: {e}"))
                })?
        };

        let output_shape = output_tensor.shape().to_vec();
        if output_shape.len() != 4 {
            return Err(PassportPhotoError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_array = Array4::from_shape_vec(
            (
                output_shape[0],
                output_shape[1],
                output_shape[2],
                output_shape[3],
            ),
            output_tensor.view().to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| {
            PassportPhotoError::inference(format!("Failed to reshape output tensor: {e}"))
        })?;

        log::debug!(
            "📊 Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.input_size, self.input_size)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, self.input_size, self.input_size)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn garbage_weights() -> ModelWeights {
        ModelWeights::from_bytes("garbage", b"definitely not a protobuf".to_vec()).unwrap()
    }

    #[test]
    fn test_onnx_backend_creation() {
        let backend = OnnxBackend::with_weights(garbage_weights());
        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 3, 256, 256));
        assert_eq!(backend.output_shape(), (1, 1, 256, 256));
        assert_eq!(backend.name(), "onnx");
    }

    #[test]
    fn test_onnx_backend_uninitialized_inference() {
        let mut backend = OnnxBackend::with_weights(garbage_weights());
        let result = backend.infer(&Array4::zeros((1, 3, 256, 256)));
        assert!(matches!(result, Err(PassportPhotoError::Inference(_))));
    }
}
