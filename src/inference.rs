//! Inference backend abstraction

use crate::{config::ModelConfig, error::Result};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends running the binary segmentation network
///
/// Backends take `&mut self` for inference because not every runtime is
/// reentrant; [`crate::model::Model`] serializes calls behind a mutex.
pub trait InferenceBackend: Send {
    /// Parse and prepare the network for inference
    ///
    /// Returns the load time on first initialization and `None` if the backend
    /// was already initialized.
    ///
    /// # Errors
    /// - Corrupt or unsupported model data
    /// - Execution provider setup failures
    fn initialize(&mut self, config: &ModelConfig) -> Result<Option<Duration>>;

    /// Run one forward pass, returning raw logits in NCHW layout
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Runtime inference failures
    /// - Output tensor conversion errors
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected NCHW input shape
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Expected NCHW output shape
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}
