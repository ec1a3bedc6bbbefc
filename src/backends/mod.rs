//! Inference backend implementations

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use mock::MockBackend;

#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use tract::TractBackend;
