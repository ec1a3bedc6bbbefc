//! Error types for passport photo generation

use thiserror::Error;

/// Result type alias for passport photo operations
pub type Result<T> = std::result::Result<T, PassportPhotoError>;

/// Errors raised by the segmentation-to-composite pipeline
///
/// `ModelLoad` is startup-fatal. Every other kind aborts only the request that
/// produced it; nothing is retried and no partial result is returned.
#[derive(Error, Debug)]
pub enum PassportPhotoError {
    /// Weights file missing, corrupt or incompatible with the network shape
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Input bytes are not a recognised or intact JPEG/PNG image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Forward pass failed or the tensor did not match the model input
    #[error("Inference error: {0}")]
    Inference(String),

    /// Mask and photo dimensions disagree (pipeline bug)
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected (width, height)
        expected: (u32, u32),
        /// Actual (width, height)
        actual: (u32, u32),
    },

    /// Final image could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Invalid configuration or request parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PassportPhotoError {
    /// Create a new model load error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new shape mismatch error from (width, height) pairs
    #[must_use]
    pub fn shape_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::ShapeMismatch { expected, actual }
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create model load error with troubleshooting context
    pub fn model_load_with_context<P: AsRef<std::path::Path>>(
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::ModelLoad(format!(
            "Failed to load model '{}': {}.{}",
            path_display, error, suggestion_text
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Whether the caller may keep serving other requests after this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ModelLoad(_) | Self::ShapeMismatch { .. })
    }

    /// Stable name of the error kind, used in reports
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelLoad(_) => "model_load",
            Self::Decode(_) => "decode",
            Self::Inference(_) => "inference",
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::Encode(_) => "encode",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Io(_) => "io",
        }
    }
}
