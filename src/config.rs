//! Configuration types for model loading and passport photo requests

use crate::error::{PassportPhotoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side length of the square segmentation input/output
pub const MODEL_INPUT_SIZE: u32 = 256;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = PassportPhotoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(PassportPhotoError::invalid_config(format!(
                "Unknown execution provider '{other}' (expected auto, cpu, cuda or coreml)"
            ))),
        }
    }
}

/// Inference engine used to run the segmentation network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, CPU only)
    Tract,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl FromStr for BackendType {
    type Err = PassportPhotoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(PassportPhotoError::invalid_config(format!(
                "Unknown backend '{other}' (expected onnx or tract)"
            ))),
        }
    }
}

/// Settings applied once when the segmentation model is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Inference engine
    pub backend: BackendType,
    /// Execution provider (ONNX only)
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
    /// Square input side length the network was exported with
    pub input_size: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            input_size: MODEL_INPUT_SIZE,
        }
    }
}

impl ModelConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }

    /// Expected NCHW input shape
    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        let side = self.input_size as usize;
        (1, 3, side, side)
    }

    /// Expected NCHW output shape
    #[must_use]
    pub fn output_shape(&self) -> (usize, usize, usize, usize) {
        let side = self.input_size as usize;
        (1, 1, side, side)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Input size of zero or larger than 4096
    /// - Tract backend combined with a GPU execution provider
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.input_size > 4096 {
            return Err(PassportPhotoError::config_value_error(
                "input size",
                self.input_size,
                "1-4096",
                Some(MODEL_INPUT_SIZE),
            ));
        }

        if self.backend == BackendType::Tract
            && matches!(
                self.execution_provider,
                ExecutionProvider::Cuda | ExecutionProvider::CoreMl
            )
        {
            return Err(PassportPhotoError::invalid_config(format!(
                "Tract backend only supports CPU execution, got '{}'",
                self.execution_provider
            )));
        }

        Ok(())
    }
}

/// Builder for `ModelConfig`
#[derive(Debug, Default)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both intra- and inter-op threads from a single total
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    #[must_use]
    pub fn input_size(mut self, size: u32) -> Self {
        self.config.input_size = size;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`ModelConfig::validate`]
    pub fn build(self) -> Result<ModelConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Background placed behind the segmented subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundSpec {
    /// Opaque background of one RGB colour
    Solid([u8; 3]),
    /// Alpha transparency (RGBA output)
    Transparent,
}

impl BackgroundSpec {
    /// Plain white
    pub const WHITE: Self = Self::Solid([255, 255, 255]);
    /// Passport blue
    pub const BLUE: Self = Self::Solid([0, 0, 200]);

    /// Whether the composited output carries an alpha channel
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        matches!(self, Self::Transparent)
    }

    /// Number of channels in the final image
    #[must_use]
    pub fn channels(&self) -> u8 {
        if self.is_transparent() {
            4
        } else {
            3
        }
    }
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for BackgroundSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::WHITE => write!(f, "white"),
            Self::BLUE => write!(f, "blue"),
            Self::Solid([r, g, b]) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
            Self::Transparent => write!(f, "transparent"),
        }
    }
}

impl FromStr for BackgroundSpec {
    type Err = PassportPhotoError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "white" => return Ok(Self::WHITE),
            "blue" => return Ok(Self::BLUE),
            "transparent" | "none" => return Ok(Self::Transparent),
            _ => {},
        }

        if let Some(hex) = value.strip_prefix('#') {
            if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                let channel = |range: std::ops::Range<usize>| {
                    hex.get(range)
                        .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                        .unwrap_or(0)
                };
                return Ok(Self::Solid([channel(0..2), channel(2..4), channel(4..6)]));
            }
        }

        Err(PassportPhotoError::invalid_config(format!(
            "Unknown background '{s}' (expected white, blue, transparent or #rrggbb)"
        )))
    }
}

/// Standard passport/ID photo sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputSize {
    /// 2×2 inch (51×51 mm), 600 × 600 px
    #[serde(rename = "2x2")]
    TwoByTwoInch,
    /// 35×45 mm, 413 × 531 px
    #[serde(rename = "35x45")]
    Mm35x45,
    /// 40×50 mm, 472 × 591 px
    #[serde(rename = "40x50")]
    Mm40x50,
}

impl OutputSize {
    /// Every supported size, in display order
    pub const ALL: [Self; 3] = [Self::TwoByTwoInch, Self::Mm35x45, Self::Mm40x50];

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::TwoByTwoInch => "2×2 inch (51×51 mm)",
            Self::Mm35x45 => "35×45 mm",
            Self::Mm40x50 => "40×50 mm",
        }
    }

    /// Short identifier accepted on the command line
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::TwoByTwoInch => "2x2",
            Self::Mm35x45 => "35x45",
            Self::Mm40x50 => "40x50",
        }
    }

    /// Exact output pixels as (width, height)
    #[must_use]
    pub fn pixels(&self) -> (u32, u32) {
        match self {
            Self::TwoByTwoInch => (600, 600),
            Self::Mm35x45 => (413, 531),
            Self::Mm40x50 => (472, 591),
        }
    }
}

impl Default for OutputSize {
    fn default() -> Self {
        Self::Mm35x45
    }
}

impl fmt::Display for OutputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize_size_label(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '×' { 'x' } else { c.to_ascii_lowercase() })
        .collect()
}

impl FromStr for OutputSize {
    type Err = PassportPhotoError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_size_label(s);
        let wanted = wanted.trim_end_matches("mm");

        Self::ALL
            .into_iter()
            .find(|size| {
                let label = normalize_size_label(size.label());
                wanted == size.short_name() || wanted == label || wanted == label.trim_end_matches("mm")
            })
            .or(match wanted {
                "2x2inch" | "51x51" => Some(Self::TwoByTwoInch),
                _ => None,
            })
            .ok_or_else(|| {
                PassportPhotoError::invalid_config(format!(
                    "Unknown photo size '{s}' (expected 2x2, 35x45 or 40x50)"
                ))
            })
    }
}

/// User choices for one passport photo request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhotoRequest {
    /// Background behind the subject
    pub background: BackgroundSpec,
    /// Physical output size
    pub size: OutputSize,
}

impl PhotoRequest {
    #[must_use]
    pub fn new(background: BackgroundSpec, size: OutputSize) -> Self {
        Self { background, size }
    }

    /// Create a new request builder
    #[must_use]
    pub fn builder() -> PhotoRequestBuilder {
        PhotoRequestBuilder::default()
    }
}

/// Builder for `PhotoRequest`
#[derive(Debug, Default)]
pub struct PhotoRequestBuilder {
    request: PhotoRequest,
}

impl PhotoRequestBuilder {
    #[must_use]
    pub fn background(mut self, background: BackgroundSpec) -> Self {
        self.request.background = background;
        self
    }

    #[must_use]
    pub fn size(mut self, size: OutputSize) -> Self {
        self.request.size = size;
        self
    }

    /// Parse and set the background from its textual form
    ///
    /// # Errors
    /// - Unknown background name or malformed hex colour
    pub fn background_str(self, background: &str) -> Result<Self> {
        Ok(self.background(background.parse()?))
    }

    /// Parse and set the size from its label or short name
    ///
    /// # Errors
    /// - Unknown size label
    pub fn size_str(self, size: &str) -> Result<Self> {
        Ok(self.size(size.parse()?))
    }

    #[must_use]
    pub fn build(self) -> PhotoRequest {
        self.request
    }
}
