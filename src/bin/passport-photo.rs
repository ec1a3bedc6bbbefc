//! Passport photo CLI tool
//!
//! Command-line host for the passport-photo library with support for ONNX
//! Runtime and Tract backends.

#[cfg(feature = "cli")]
use passport_photo::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
