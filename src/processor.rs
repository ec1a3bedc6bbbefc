//! Passport photo pipeline processor
//!
//! Runs decode → model tensor → segmentation → mask → composite for one
//! request at a time. The processor holds only the shared model, so a single
//! instance can serve any number of requests, concurrently or not.

use crate::{
    compositor::Compositor,
    config::PhotoRequest,
    error::Result,
    mask::MaskResolver,
    model::Model,
    preprocessing::Preprocessor,
    segmentation::SegmentationEngine,
    types::{PassportPhoto, Photo, ProcessingMetadata, ProcessingTimings},
};
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, instrument, span, warn, Level};

/// Stateless passport photo pipeline over a shared [`Model`]
#[derive(Debug, Clone)]
pub struct PassportPhotoProcessor {
    model: Arc<Model>,
}

impl PassportPhotoProcessor {
    #[must_use]
    pub fn new(model: Arc<Model>) -> Self {
        Self { model }
    }

    #[must_use]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Run the full pipeline on encoded JPEG/PNG bytes
    ///
    /// # Errors
    /// - `Decode` for unrecognized or corrupt bytes
    /// - `Inference` for model failures
    /// - `ShapeMismatch` if an internal stage breaks the mask/photo contract
    #[instrument(skip(self, bytes), fields(input_bytes = bytes.len(), background = %request.background, size = %request.size))]
    pub fn process_bytes(&self, bytes: &[u8], request: &PhotoRequest) -> Result<PassportPhoto> {
        let total_start = Instant::now();

        let photo = {
            let _span = span!(Level::DEBUG, "decode").entered();
            Preprocessor::prepare(bytes).inspect_err(|e| warn!(error = %e, "Decode failed"))?
        };
        let decode_ms = total_start.elapsed().as_millis() as u64;

        let mut result = self.run(photo, request, total_start)?;
        result.metadata.timings.decode_ms = decode_ms;
        Ok(result)
    }

    /// Run the pipeline on an already decoded photo
    ///
    /// # Errors
    /// See [`PassportPhotoProcessor::process_bytes`]
    #[instrument(skip(self, photo), fields(width = photo.width(), height = photo.height()))]
    pub fn process_photo(&self, photo: Photo, request: &PhotoRequest) -> Result<PassportPhoto> {
        self.run(photo, request, Instant::now())
    }

    /// Read a photo from disk and run the pipeline
    ///
    /// # Errors
    /// - File read failures
    /// - See [`PassportPhotoProcessor::process_bytes`]
    pub fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        request: &PhotoRequest,
    ) -> Result<PassportPhoto> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading input photo");
        let bytes = std::fs::read(path)?;
        self.process_bytes(&bytes, request)
    }

    /// Drain an async reader, then run the pipeline synchronously
    ///
    /// # Errors
    /// - Stream read failures
    /// - See [`PassportPhotoProcessor::process_bytes`]
    pub async fn process_reader<R: AsyncRead + Unpin>(
        &self,
        mut reader: R,
        request: &PhotoRequest,
    ) -> Result<PassportPhoto> {
        let mut buffer = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
        self.process_bytes(&buffer, request)
    }

    fn run(
        &self,
        photo: Photo,
        request: &PhotoRequest,
        total_start: Instant,
    ) -> Result<PassportPhoto> {
        let (width, height) = photo.dimensions();
        let mut timings = ProcessingTimings::default();

        info!(width, height, "🎯 Starting passport photo processing");

        let tensor = {
            let _span = span!(Level::DEBUG, "preprocessing", width, height).entered();
            let start = Instant::now();
            let tensor = Preprocessor::to_model_tensor(&photo, self.model.input_size())?;
            timings.preprocess_ms = start.elapsed().as_millis() as u64;
            tensor
        };

        let probabilities = {
            let _span = span!(Level::INFO, "inference", backend = %self.model.info().backend)
                .entered();
            let start = Instant::now();
            let probabilities = SegmentationEngine::segment(&self.model, &tensor)
                .inspect_err(|e| warn!(error = %e, "Inference failed"))?;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            probabilities
        };

        let mask = {
            let _span = span!(Level::DEBUG, "mask", width, height).entered();
            let start = Instant::now();
            let mask = MaskResolver::resolve(&probabilities, height, width)?;
            timings.mask_ms = start.elapsed().as_millis() as u64;
            mask
        };

        let image = {
            let (out_width, out_height) = request.size.pixels();
            let _span = span!(
                Level::DEBUG,
                "composite",
                background = %request.background,
                out_width,
                out_height
            )
            .entered();
            let start = Instant::now();
            // Compositor logs shape mismatches itself
            let image = Compositor::compose(&photo, &mask, request.background, request.size)?;
            timings.composite_ms = start.elapsed().as_millis() as u64;
            image
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;

        let mut metadata = ProcessingMetadata::new(*request, (width, height));
        metadata.output_dimensions = image.dimensions();
        metadata.foreground_ratio = mask.foreground_ratio();
        metadata.timings = timings;

        info!(
            foreground_ratio = metadata.foreground_ratio,
            "✅ {}",
            metadata.timings.summary()
        );

        Ok(PassportPhoto {
            image,
            mask,
            original_dimensions: (width, height),
            metadata,
        })
    }
}
