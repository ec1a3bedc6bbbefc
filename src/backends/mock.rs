//! Mock backend for tests and model-free runs
//!
//! Produces logits from a probability pattern so the sigmoid applied by the
//! segmentation engine recovers the requested probabilities.

use crate::config::{ModelConfig, MODEL_INPUT_SIZE};
use crate::error::{PassportPhotoError, Result};
use crate::inference::InferenceBackend;
use instant::Duration;
use ndarray::Array4;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type ProbabilityFn = Arc<dyn Fn(usize, usize) -> f32 + Send + Sync>;

/// Mock segmentation backend
#[derive(Clone)]
pub struct MockBackend {
    probability: ProbabilityFn,
    input_size: usize,
    output_size: usize,
    initialized: bool,
    fail_init: bool,
    fail_inference: bool,
    calls: Arc<AtomicUsize>,
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("input_size", &self.input_size)
            .field("output_size", &self.output_size)
            .field("initialized", &self.initialized)
            .field("fail_init", &self.fail_init)
            .field("fail_inference", &self.fail_inference)
            .finish_non_exhaustive()
    }
}

impl MockBackend {
    /// Backend predicting the same foreground probability for every pixel
    #[must_use]
    pub fn constant(probability: f32) -> Self {
        Self::from_fn(move |_, _| probability)
    }

    /// Backend predicting `probability(y, x)` at model resolution
    pub fn from_fn<F>(probability: F) -> Self
    where
        F: Fn(usize, usize) -> f32 + Send + Sync + 'static,
    {
        let side = MODEL_INPUT_SIZE as usize;
        Self {
            probability: Arc::new(probability),
            input_size: side,
            output_size: side,
            initialized: false,
            fail_init: false,
            fail_inference: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Backend that fails during initialization
    #[must_use]
    pub fn failing_init() -> Self {
        let mut backend = Self::constant(0.0);
        backend.fail_init = true;
        backend
    }

    /// Backend that initializes but fails every forward pass
    #[must_use]
    pub fn failing_inference() -> Self {
        let mut backend = Self::constant(0.0);
        backend.fail_inference = true;
        backend
    }

    /// Backend whose output resolution differs from its input resolution
    #[must_use]
    pub fn with_output_size(mut self, side: usize) -> Self {
        self.output_size = side;
        self
    }

    /// Backend expecting a different square input side
    #[must_use]
    pub fn with_input_size(mut self, side: usize) -> Self {
        self.input_size = side;
        self.output_size = side;
        self
    }

    /// Shared counter of forward passes, readable after the backend is moved
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn logit(probability: f32) -> f32 {
        (probability / (1.0 - probability)).ln()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &ModelConfig) -> Result<Option<Duration>> {
        if self.fail_init {
            return Err(PassportPhotoError::model_load(
                "Mock backend initialization failed",
            ));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.initialized {
            return Err(PassportPhotoError::inference("Mock backend not initialized"));
        }
        if self.fail_inference {
            return Err(PassportPhotoError::inference("Mock backend inference failed"));
        }
        if input.dim() != self.input_shape() {
            return Err(PassportPhotoError::inference(format!(
                "Mock backend expected input {:?}, got {:?}",
                self.input_shape(),
                input.dim()
            )));
        }

        let side = self.output_size;
        let probability = self.probability.as_ref();
        Ok(Array4::from_shape_fn((1, 1, side, side), |(_, _, y, x)| {
            Self::logit(probability(y, x))
        }))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.input_size, self.input_size)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, self.output_size, self.output_size)
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn test_logits_recover_probabilities() {
        assert!((sigmoid(MockBackend::logit(0.25)) - 0.25).abs() < 1e-6);
        assert!((sigmoid(MockBackend::logit(0.5)) - 0.5).abs() < f32::EPSILON);
        assert!((sigmoid(MockBackend::logit(1.0)) - 1.0).abs() < f32::EPSILON);
        assert!(sigmoid(MockBackend::logit(0.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_pattern_backend() {
        let mut backend = MockBackend::from_fn(|y, _| if y < 128 { 1.0 } else { 0.0 });
        backend.initialize(&ModelConfig::default()).unwrap();
        let output = backend.infer(&Array4::zeros((1, 3, 256, 256))).unwrap();
        assert!(output[[0, 0, 0, 0]].is_infinite() && output[[0, 0, 0, 0]] > 0.0);
        assert!(output[[0, 0, 255, 0]].is_infinite() && output[[0, 0, 255, 0]] < 0.0);
    }

    #[test]
    fn test_failure_modes() {
        let mut backend = MockBackend::failing_init();
        assert!(backend.initialize(&ModelConfig::default()).is_err());

        let mut backend = MockBackend::failing_inference();
        backend.initialize(&ModelConfig::default()).unwrap();
        assert!(backend.infer(&Array4::zeros((1, 3, 256, 256))).is_err());
    }

    #[test]
    fn test_input_shape_checked() {
        let mut backend = MockBackend::constant(1.0);
        backend.initialize(&ModelConfig::default()).unwrap();
        assert!(backend.infer(&Array4::zeros((1, 3, 128, 128))).is_err());
    }

    #[test]
    fn test_call_counter() {
        let mut backend = MockBackend::constant(1.0);
        let counter = backend.call_counter();
        backend.initialize(&ModelConfig::default()).unwrap();
        backend.infer(&Array4::zeros((1, 3, 256, 256))).unwrap();
        backend.infer(&Array4::zeros((1, 3, 256, 256))).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
