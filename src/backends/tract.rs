//! Tract backend for the segmentation network
//!
//! Pure Rust CPU inference with no native runtime to install.

use crate::config::ModelConfig;
use crate::error::{PassportPhotoError, Result};
use crate::inference::InferenceBackend;
use crate::model::ModelWeights;
use log;
use ndarray::Array4;
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend running a segmentation network from in-memory weights
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    weights: ModelWeights,
    input_size: usize,
    initialized: bool,
}

impl TractBackend {
    /// Create an uninitialized backend over the given weights
    #[must_use]
    pub fn with_weights(weights: ModelWeights) -> Self {
        Self {
            model: None,
            weights,
            input_size: crate::config::MODEL_INPUT_SIZE as usize,
            initialized: false,
        }
    }

    fn load_model(&mut self, config: &ModelConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let side = config.input_size as usize;

        log::info!("🚀 Initializing Tract backend");
        log::info!("🧠 Model: {}", self.weights.name());
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = self.weights.size_bytes() as f64 / (1024.0 * 1024.0);
        log::info!("📏 Model size: {size_mb:.2} MB");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(self.weights.bytes()))
            .map_err(|e| {
                PassportPhotoError::model_load(format!(
                    "Failed to parse weights '{}': {e}",
                    self.weights.name()
                ))
            })?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| {
                PassportPhotoError::model_load(format!("Failed to set input shape: {e}"))
            })?
            .into_optimized()
            .map_err(|e| PassportPhotoError::model_load(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                PassportPhotoError::model_load(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(model);
        self.input_size = side;
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &ModelConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PassportPhotoError::inference("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| PassportPhotoError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| PassportPhotoError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            PassportPhotoError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_shape = output_data.shape();
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
            output_data.iter().copied().collect(),
        )
        .map_err(|e| {
            PassportPhotoError::inference(format!("Failed to reshape output tensor: {e}"))
        })?;

        log::debug!(
            "✅ Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
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
        "tract"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendType;

    #[test]
    fn test_tract_backend_uninitialized() {
        let weights = ModelWeights::from_bytes("garbage", vec![0xde, 0xad, 0xbe, 0xef]).unwrap();
        let mut backend = TractBackend::with_weights(weights);

        assert!(!backend.is_initialized());
        assert_eq!(backend.name(), "tract");
        assert_eq!(backend.input_shape(), (1, 3, 256, 256));
        assert!(backend.infer(&Array4::zeros((1, 3, 256, 256))).is_err());
    }

    #[test]
    fn test_tract_backend_rejects_corrupt_weights() {
        let weights = ModelWeights::from_bytes("garbage", vec![0xff; 64]).unwrap();
        let mut backend = TractBackend::with_weights(weights);
        let config = ModelConfig::builder()
            .backend(BackendType::Tract)
            .build()
            .unwrap();

        let result = backend.initialize(&config);
        assert!(matches!(result, Err(PassportPhotoError::ModelLoad(_))));
        assert!(!backend.is_initialized());
    }
}
