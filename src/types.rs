//! Core types shared by the remote client and the pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::RemovalConfig;
use crate::input::ImageSource;
use crate::models::{BiRefNetModel, OperatingResolution, OutputFormat};

/// Arguments of a BiRefNet v2 job, serialized verbatim as the request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Publicly fetchable URL of the input image
    pub image_url: String,
    pub model: BiRefNetModel,
    pub operating_resolution: OperatingResolution,
    pub refine_foreground: bool,
    pub output_format: OutputFormat,
}

impl JobRequest {
    /// Build the request for an already uploaded (or remote) image
    #[must_use]
    pub fn new<S: Into<String>>(image_url: S, config: &RemovalConfig) -> Self {
        Self {
            image_url: image_url.into(),
            model: config.model,
            operating_resolution: config.operating_resolution,
            refine_foreground: config.refine_foreground,
            output_format: config.output_format,
        }
    }
}

/// Output image description returned by the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Result of a completed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub image: ResultImage,
}

/// Queue state reported while polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InQueue => write!(f, "in queue"),
            Self::InProgress => write!(f, "in progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Snapshot passed to the job observer on every poll
///
/// `logs` only contains lines not delivered by an earlier update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub queue_position: Option<u32>,
    pub logs: Vec<String>,
}

/// Per-stage timings of a pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingTimings {
    /// Reading and uploading the input (0 for URL inputs)
    pub upload_ms: u64,
    /// Submission until the job result is available
    pub inference_ms: u64,
    pub download_ms: u64,
    pub write_ms: u64,
    pub total_ms: u64,
}

/// Outcome of one successful pipeline run
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub source: ImageSource,
    pub output_path: PathBuf,
    pub result: JobResult,
    pub bytes_written: usize,
    pub timings: ProcessingTimings,
}
