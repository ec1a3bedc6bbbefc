//! Forward pass and logistic activation

use crate::{
    error::{PassportPhotoError, Result},
    model::Model,
    types::{ModelTensor, ProbabilityMap},
};
use ndarray::{s, Array2};

/// Logistic activation mapping a raw logit to a probability in [0, 1]
#[must_use]
pub fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

/// Runs the loaded model and converts logits into foreground probabilities
pub struct SegmentationEngine;

impl SegmentationEngine {
    /// One deterministic forward pass followed by a per-pixel sigmoid
    ///
    /// # Errors
    /// - Tensor shape differs from the model's input shape
    /// - Backend failures or an output that is not a single-channel map
    pub fn segment(model: &Model, tensor: &ModelTensor) -> Result<ProbabilityMap> {
        if tensor.shape() != model.input_shape() {
            return Err(PassportPhotoError::inference(format!(
                "Input tensor shape {:?} does not match model input {:?}",
                tensor.shape(),
                model.input_shape()
            )));
        }

        let logits = model.forward(tensor.as_array())?;
        if logits.dim() != model.output_shape() {
            return Err(PassportPhotoError::inference(format!(
                "Model produced {:?}, expected {:?}",
                logits.dim(),
                model.output_shape()
            )));
        }

        let probabilities: Array2<f32> = logits.slice(s![0, 0, .., ..]).mapv(sigmoid);
        if probabilities.iter().any(|p| p.is_nan()) {
            return Err(PassportPhotoError::inference(
                "Model produced NaN logits",
            ));
        }

        ProbabilityMap::new(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::MockBackend;
    use crate::config::ModelConfig;
    use ndarray::Array4;

    fn model(backend: MockBackend) -> Model {
        Model::from_backend(Box::new(backend), &ModelConfig::default(), "mock", 0).unwrap()
    }

    fn zeros_tensor(side: usize) -> ModelTensor {
        ModelTensor::new(Array4::zeros((1, 3, side, side))).unwrap()
    }

    #[test]
    fn test_sigmoid_values() {
        assert!((sigmoid(0.0) - 0.5).abs() < f32::EPSILON);
        assert!(sigmoid(20.0) > 0.999);
        assert!(sigmoid(-20.0) < 0.001);
        assert!((sigmoid(f32::INFINITY) - 1.0).abs() < f32::EPSILON);
        assert!(sigmoid(f32::NEG_INFINITY).abs() < f32::EPSILON);
        assert!(sigmoid(-1000.0) >= 0.0);
    }

    #[test]
    fn test_segment_constant_probability() {
        let model = model(MockBackend::constant(1.0));
        let map = SegmentationEngine::segment(&model, &zeros_tensor(256)).unwrap();
        assert_eq!(map.dim(), (256, 256));
        assert!(map.as_array().iter().all(|&p| (p - 1.0).abs() < f32::EPSILON));
    }

    #[test]
    fn test_segment_pattern_orientation() {
        // Foreground only in the left half of each row
        let model = model(MockBackend::from_fn(|_, x| if x < 128 { 0.9 } else { 0.1 }));
        let map = SegmentationEngine::segment(&model, &zeros_tensor(256)).unwrap();
        assert!((map.get(0, 0).unwrap() - 0.9).abs() < 1e-5);
        assert!((map.get(0, 255).unwrap() - 0.1).abs() < 1e-5);
        assert!((map.get(255, 0).unwrap() - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_segment_is_deterministic() {
        let model = model(MockBackend::from_fn(|y, x| ((x + y) % 10) as f32 / 10.0));
        let tensor = zeros_tensor(256);
        let first = SegmentationEngine::segment(&model, &tensor).unwrap();
        let second = SegmentationEngine::segment(&model, &tensor).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_segment_rejects_wrong_shape() {
        let model = model(MockBackend::constant(0.3));
        let err = SegmentationEngine::segment(&model, &zeros_tensor(128)).unwrap_err();
        assert!(matches!(err, PassportPhotoError::Inference(_)));
    }

    #[test]
    fn test_segment_backend_failure() {
        let backend = MockBackend::failing_inference();
        let result = Model::from_backend(Box::new(backend), &ModelConfig::default(), "mock", 0);
        // The warm-up probe already surfaces the failure at load time
        assert!(matches!(result, Err(PassportPhotoError::ModelLoad(_))));
    }
}
