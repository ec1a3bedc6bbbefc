//! CLI host for the passport photo pipeline
//!
//! This module is only available when the "cli" feature is enabled.

pub mod config;
#[path = "main.rs"]
mod main_impl;

pub use config::{CliConfigBuilder, CliSettings};
pub use main_impl::{main, Cli};
