//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{BackendType, ExecutionProvider, ModelConfig, PhotoRequest};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable consulted when `--model` is not given
pub const MODEL_ENV_VAR: &str = "PASSPORT_PHOTO_MODEL";

/// Everything the CLI needs to load the model and build requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliSettings {
    pub model_path: PathBuf,
    pub model_config: ModelConfig,
    pub request: PhotoRequest,
}

/// Convert CLI arguments to library configuration
pub struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build model configuration and photo request from CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<CliSettings> {
        Self::validate_cli(cli)?;

        let model_path = cli.model.clone().with_context(|| {
            format!("No model given. Pass --model or set {MODEL_ENV_VAR}")
        })?;

        let (backend, execution_provider) = Self::parse_provider_string(&cli.execution_provider)?;

        let model_config = ModelConfig::builder()
            .backend(backend)
            .execution_provider(execution_provider)
            .num_threads(cli.threads)
            .build()
            .context("Invalid model configuration")?;

        let request = PhotoRequest::builder()
            .background_str(&cli.background)
            .context("Invalid --background")?
            .size_str(&cli.size)
            .context("Invalid --size")?
            .build();

        Ok(CliSettings {
            model_path,
            model_config,
            request,
        })
    }

    /// Parse `backend:provider` strings such as `onnx:auto` or `tract:cpu`
    ///
    /// A bare backend name selects that backend's default provider.
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend, provider) = match provider_str.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (provider_str, None),
        };

        let backend: BackendType = backend.parse()?;
        let provider = match (backend, provider) {
            (BackendType::Onnx, None) => ExecutionProvider::Auto,
            (BackendType::Tract, None) => ExecutionProvider::Cpu,
            (BackendType::Onnx, Some(provider)) => provider.parse()?,
            (BackendType::Tract, Some("cpu")) => ExecutionProvider::Cpu,
            (BackendType::Tract, Some(other)) => {
                anyhow::bail!("Unknown Tract provider: {other}. Tract only supports 'cpu'")
            },
        };

        Ok((backend, provider))
    }

    /// Validate CLI arguments for consistency
    pub fn validate_cli(cli: &Cli) -> Result<()> {
        Self::parse_provider_string(&cli.execution_provider)
            .context("Invalid execution provider format")?;

        if cli.input.len() > 1 && cli.input.iter().any(|input| input == "-") {
            anyhow::bail!("stdin (-) cannot be combined with other inputs");
        }

        Ok(())
    }
}
