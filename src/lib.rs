#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # fal-bgremove
//!
//! Background removal through the hosted BiRefNet v2 model on FAL.ai.
//!
//! No image processing happens locally. For every input the crate runs one
//! linear pipeline:
//!
//! 1. resolve the input (local file or `http(s)` URL)
//! 2. upload local files to FAL storage
//! 3. submit the job and poll it until completion
//! 4. download the result image
//! 5. write it next to the input as `<stem>-nobg.png`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fal_bgremove::{remove_background, BiRefNetModel, RemovalConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Reads the API key from FAL_KEY
//! let config = RemovalConfig::builder()
//!     .model(BiRefNetModel::Portrait)
//!     .build()?;
//!
//! let processed = remove_background("portrait.jpg", &config).await?;
//! println!("saved {}", processed.output_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom setup
//!
//! [`BackgroundRemovalProcessor`] takes any [`RemoteService`]; [`FalClient`]
//! is the HTTP implementation configured through [`FalConfig`].
//!
//! ```rust,no_run
//! use fal_bgremove::{BackgroundRemovalProcessor, FalConfig, RemovalConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fal = FalConfig::builder()
//!     .api_key("my-key")
//!     .poll_interval(Duration::from_millis(250))
//!     .job_timeout(Some(Duration::from_secs(120)))
//!     .build()?;
//!
//! let processor = BackgroundRemovalProcessor::with_fal(fal, RemovalConfig::default())?
//!     .with_concurrency(4);
//! let report = processor.process_batch(&["a.jpg", "b.png"], None).await;
//! println!("{} ok, {} failed", report.succeeded.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bar and subscriber setup
//! - `tracing-json`: JSON log output for the CLI

#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod input;
pub mod models;
pub mod processor;
pub mod queue;
pub mod services;
pub mod storage;
pub mod tracing_config;
pub mod types;

use std::path::Path;

// Public API exports
pub use client::{FalClient, JobObserver, RemoteService};
pub use config::{FalConfig, FalConfigBuilder, RemovalConfig, RemovalConfigBuilder};
pub use error::{BgRemovalError, Result};
pub use input::{is_remote_url, mime_type_for_path, ImageSource};
pub use models::{BiRefNetModel, OperatingResolution, OutputFormat};
pub use processor::{BackgroundRemovalProcessor, BatchReport};
pub use queue::{parse_job_output, JobHandle};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
pub use types::{
    JobRequest, JobResult, JobStatus, JobUpdate, ProcessedImage, ProcessingTimings, ResultImage,
};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;

/// Remove the background of one image, writing `<stem><suffix>.png` next to it
///
/// The API key is read from `FAL_KEY`; URL inputs are written to the current
/// directory.
///
/// # Errors
/// - `MissingCredential` if `FAL_KEY` is not set (no request is made)
/// - `NotFound`, `Upload`, `Model`, `Download` or `Write` from the pipeline
pub async fn remove_background(input: &str, config: &RemovalConfig) -> Result<ProcessedImage> {
    let processor = BackgroundRemovalProcessor::with_fal(FalConfig::from_env()?, config.clone())?;
    processor.process(input, None).await
}

/// Remove the background of one image, writing the result to `output`
///
/// # Errors
/// See [`remove_background`]
pub async fn remove_background_to(
    input: &str,
    output: &Path,
    config: &RemovalConfig,
) -> Result<ProcessedImage> {
    let processor = BackgroundRemovalProcessor::with_fal(FalConfig::from_env()?, config.clone())?;
    processor.process(input, Some(output)).await
}

/// Remove the background of many images, one at a time, continuing past failures
///
/// # Errors
/// - `MissingCredential` if `FAL_KEY` is not set
/// - Invalid removal configuration
///
/// Per-input failures are collected in the returned [`BatchReport`].
pub async fn remove_background_batch<S: AsRef<str>>(
    inputs: &[S],
    output_dir: Option<&Path>,
    config: &RemovalConfig,
) -> Result<BatchReport> {
    let processor = BackgroundRemovalProcessor::with_fal(FalConfig::from_env()?, config.clone())?;
    Ok(processor.process_batch(inputs, output_dir).await)
}
