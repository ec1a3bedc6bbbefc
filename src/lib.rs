#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Passport Photo
//!
//! Turns an ordinary portrait photo into a passport/ID photo: a binary
//! segmentation network separates the subject from the background, the
//! background is replaced with a solid colour (or made transparent) and the
//! result is resized to a standard passport size and encoded as PNG.
//!
//! ## Pipeline
//!
//! 1. [`Preprocessor`] decodes JPEG/PNG bytes, applies EXIF orientation and
//!    builds the 256×256 model tensor.
//! 2. [`SegmentationEngine`] runs the [`Model`] and applies a sigmoid.
//! 3. [`MaskResolver`] thresholds at 0.5 and upsamples with nearest neighbour.
//! 4. [`Compositor`] blends over the background and resizes to the output size.
//! 5. [`OutputEncoder`] writes a lossless PNG.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use passport_photo::{
//!     create_passport_photo, BackgroundSpec, ModelCell, ModelConfig, OutputSize, PhotoRequest,
//! };
//!
//! static MODEL: ModelCell = ModelCell::new();
//!
//! # fn example(upload: &[u8]) -> anyhow::Result<()> {
//! // Loaded once per process, shared by every request
//! let model = MODEL.get_or_load("unet_resnet34.onnx", &ModelConfig::default())?;
//!
//! let request = PhotoRequest::new(BackgroundSpec::BLUE, OutputSize::Mm35x45);
//! let photo = create_passport_photo(upload, &model, &request)?;
//! photo.save("passport.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): `passport-photo` command-line host
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod encoder;
pub mod error;
pub mod inference;
pub mod mask;
pub mod model;
pub mod preprocessing;
pub mod processor;
pub mod segmentation;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

use tokio::io::AsyncRead;

pub use backends::MockBackend;
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use compositor::Compositor;
pub use config::{
    BackendType, BackgroundSpec, ExecutionProvider, ModelConfig, ModelConfigBuilder, OutputSize,
    PhotoRequest, PhotoRequestBuilder, MODEL_INPUT_SIZE,
};
pub use encoder::OutputEncoder;
pub use error::{PassportPhotoError, Result};
pub use inference::InferenceBackend;
pub use mask::{MaskResolver, FOREGROUND_THRESHOLD};
pub use model::{
    BackendFactory, DefaultBackendFactory, Model, ModelCell, ModelInfo, ModelLoader, ModelWeights,
};
pub use preprocessing::Preprocessor;
pub use processor::PassportPhotoProcessor;
pub use segmentation::SegmentationEngine;
pub use types::{
    EncodedPhoto, FinalImage, Mask, ModelTensor, PassportPhoto, Photo, ProbabilityMap,
    ProcessingMetadata, ProcessingTimings,
};

/// Run the whole pipeline on uploaded bytes and return the encoded PNG
///
/// # Errors
/// - `Decode` for unrecognized or corrupt bytes
/// - `Inference` for model failures
/// - `ShapeMismatch` or `Encode` for internal pipeline failures
pub fn create_passport_photo(
    bytes: &[u8],
    model: &Model,
    request: &PhotoRequest,
) -> Result<EncodedPhoto> {
    let photo = Preprocessor::prepare(bytes)?;
    let tensor = Preprocessor::to_model_tensor(&photo, model.input_size())?;
    let probabilities = SegmentationEngine::segment(model, &tensor)?;
    let mask = MaskResolver::resolve(&probabilities, photo.height(), photo.width())?;
    let image = Compositor::compose(&photo, &mask, request.background, request.size)?;
    OutputEncoder::encode(&image)
}

/// Read an upload stream to the end and run [`create_passport_photo`]
///
/// # Errors
/// - Stream read failures
/// - See [`create_passport_photo`]
pub async fn create_passport_photo_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    model: &Model,
    request: &PhotoRequest,
) -> Result<EncodedPhoto> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    create_passport_photo(&buffer, model, request)
}
