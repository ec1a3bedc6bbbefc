//! Passport photo CLI tool
//!
//! Loads the segmentation model once, then turns each input portrait into a
//! passport-size PNG.

use super::config::{CliConfigBuilder, CliSettings, MODEL_ENV_VAR};
use crate::{
    config::OutputSize,
    model::ModelLoader,
    processor::PassportPhotoProcessor,
    tracing_config::{init_cli_tracing, spans},
    types::PassportPhoto,
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use instant::Instant;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Passport photo CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "passport-photo")]
pub struct Cli {
    /// Input JPEG/PNG files or directories (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present = "list_sizes")]
    pub input: Vec<String>,

    /// Output file (single input) or directory (several inputs). Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Background: white, blue, transparent or #rrggbb
    #[arg(short, long, default_value = "white")]
    pub background: String,

    /// Output size: 2x2, 35x45 or 40x50
    #[arg(short, long, default_value = "35x45")]
    pub size: String,

    /// Path to the ONNX segmentation model
    #[arg(short, long, env = MODEL_ENV_VAR, value_name = "MODEL")]
    pub model: Option<PathBuf>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Print processing metadata as JSON for each input
    #[arg(long)]
    pub report: bool,

    /// List supported output sizes and exit
    #[arg(long)]
    pub list_sizes: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_sizes {
        print_size_table();
        return Ok(());
    }

    let session_id = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    let settings = CliConfigBuilder::from_cli(&cli).context("Invalid CLI arguments")?;
    let _session = spans::session(&session_id, &settings.model_config.backend.to_string()).entered();

    info!("Input(s): {}", cli.input.join(", "));
    info!(
        "Background: {}, size: {} ({}x{} px)",
        settings.request.background,
        settings.request.size.label(),
        settings.request.size.pixels().0,
        settings.request.size.pixels().1
    );

    let processor = load_processor(&settings)?;

    let start_time = Instant::now();
    let summary = process_inputs(&cli, &settings, &processor).await?;
    info!(
        "Processed {} image(s) in {:.2}s",
        summary.processed,
        start_time.elapsed().as_secs_f64()
    );

    if summary.failed > 0 {
        anyhow::bail!(
            "{} of {} input(s) failed",
            summary.failed,
            summary.processed + summary.failed
        );
    }

    Ok(())
}

fn print_size_table() {
    println!("{:<22} {:<8} {:>12}", "Size", "Flag", "Pixels (w×h)");
    for size in OutputSize::ALL {
        let (width, height) = size.pixels();
        println!(
            "{:<22} {:<8} {:>12}",
            size.label(),
            size.short_name(),
            format!("{width} × {height}")
        );
    }
}

fn load_processor(settings: &CliSettings) -> Result<PassportPhotoProcessor> {
    let _span = spans::model_loading(&settings.model_path).entered();
    let model = ModelLoader::load(&settings.model_path, &settings.model_config)
        .context("Failed to load segmentation model")?;
    info!(
        "🧠 Model '{}' loaded on {} in {}ms",
        model.info().name,
        model.info().backend,
        model.info().load_time_ms
    );
    Ok(PassportPhotoProcessor::new(Arc::new(model)))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BatchSummary {
    processed: usize,
    failed: usize,
}

async fn process_inputs(
    cli: &Cli,
    settings: &CliSettings,
    processor: &PassportPhotoProcessor,
) -> Result<BatchSummary> {
    if cli.input.len() == 1 && cli.input.first().is_some_and(|s| s == "-") {
        process_stdin(cli, settings, processor).await?;
        return Ok(BatchSummary {
            processed: 1,
            failed: 0,
        });
    }

    let files = collect_input_files(&cli.input, cli.recursive)?;
    if files.is_empty() {
        warn!("No JPEG or PNG files found in the provided inputs");
        return Ok(BatchSummary::default());
    }

    let file_count = files.len();
    let _batch = spans::batch_processing(file_count).entered();
    info!("Found {file_count} image file(s) to process");

    let output_dir = prepare_output_dir(cli.output.as_deref(), file_count)?;

    let progress = (file_count > 1).then(|| {
        let pb = ProgressBar::new(file_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    });

    let mut summary = BatchSummary::default();
    for input_file in &files {
        if let Some(pb) = &progress {
            pb.set_message(format!("{}", input_file.display()));
        }

        let output_target = match (&output_dir, file_count) {
            (Some(dir), _) => OutputTarget::File(output_path_in_dir(input_file, dir)),
            (None, 1) => match cli.output.as_deref() {
                Some("-") => OutputTarget::Stdout,
                Some(path) => OutputTarget::File(PathBuf::from(path)),
                None => OutputTarget::File(default_output_path(input_file)),
            },
            (None, _) => OutputTarget::File(default_output_path(input_file)),
        };

        let _file = spans::file_processing(&input_file.display().to_string()).entered();
        match process_single_file(cli, settings, processor, input_file, &output_target) {
            Ok(()) => summary.processed += 1,
            Err(e) => {
                error!("❌ Failed to process {}: {e:#}", input_file.display());
                summary.failed += 1;
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {}",
            summary.processed, summary.failed
        ));
    }

    Ok(summary)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputTarget {
    Stdout,
    File(PathBuf),
}

fn process_single_file(
    cli: &Cli,
    settings: &CliSettings,
    processor: &PassportPhotoProcessor,
    input_path: &Path,
    output: &OutputTarget,
) -> Result<()> {
    let mut result = processor
        .process_file(input_path, &settings.request)
        .with_context(|| format!("Failed to create passport photo from {}", input_path.display()))?;

    write_result(&mut result, output, cli.report)
}

async fn process_stdin(
    cli: &Cli,
    settings: &CliSettings,
    processor: &PassportPhotoProcessor,
) -> Result<()> {
    info!("Reading image from stdin");
    let mut result = processor
        .process_reader(tokio::io::stdin(), &settings.request)
        .await
        .context("Failed to create passport photo from stdin")?;

    let output = match cli.output.as_deref() {
        None | Some("-") => OutputTarget::Stdout,
        Some(path) => OutputTarget::File(PathBuf::from(path)),
    };
    write_result(&mut result, &output, cli.report)
}

fn write_result(result: &mut PassportPhoto, output: &OutputTarget, report: bool) -> Result<()> {
    let encoded = result.encode().context("Failed to encode PNG")?;

    match output {
        OutputTarget::Stdout => {
            write_stdout(&encoded.bytes)?;
            debug!("PNG written to stdout");
        },
        OutputTarget::File(path) => {
            encoded
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "✅ Saved {}x{} passport photo to {}",
                encoded.dimensions.0,
                encoded.dimensions.1,
                path.display()
            );
        },
    }

    debug!("📊 {}", result.metadata.timings.summary());

    if report {
        let json = result.metadata.to_json()?;
        if *output == OutputTarget::Stdout {
            eprintln!("{json}");
        } else {
            println!("{json}");
        }
    }

    Ok(())
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn prepare_output_dir(output: Option<&str>, file_count: usize) -> Result<Option<PathBuf>> {
    let Some(output) = output else {
        return Ok(None);
    };
    if file_count <= 1 {
        return Ok(None);
    }
    if output == "-" {
        anyhow::bail!("Cannot use stdout (-) as output when processing multiple files");
    }

    let output_path = PathBuf::from(output);
    if output_path.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output_path.display()
        );
    }
    std::fs::create_dir_all(&output_path).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;
    Ok(Some(output_path))
}

fn collect_input_files(inputs: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let path = PathBuf::from(input);
        if path.is_file() {
            if is_image_file(&path) {
                files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            files.extend(find_image_files(&path, recursive));
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    // Sort for a stable processing order
    files.sort();
    files.dedup();
    Ok(files)
}

fn find_image_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                None
            },
        })
        .filter(|entry| entry.file_type().is_file() && is_image_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn output_file_name(input_path: &Path) -> String {
    let stem = input_path
        .file_stem()
        .map_or_else(|| "photo".into(), |s| s.to_string_lossy());
    format!("{stem}_passport.png")
}

fn default_output_path(input_path: &Path) -> PathBuf {
    input_path.with_file_name(output_file_name(input_path))
}

fn output_path_in_dir(input_path: &Path, dir: &Path) -> PathBuf {
    dir.join(output_file_name(input_path))
}
