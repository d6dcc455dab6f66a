//! Progress reporting service
//!
//! This module separates progress reporting concerns from the pipeline,
//! allowing different frontends to implement their own progress handling.

use crate::types::{JobUpdate, ProcessingTimings};
use instant::Instant;
use std::sync::Arc;

/// Pipeline stages of a single image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Checking the input path or URL
    Resolving,
    /// Reading and uploading the local file
    Uploading,
    /// Submitting the job to the queue
    Submitting,
    /// Job is waiting in the remote queue
    Queued,
    /// Remote model is running
    Running,
    /// Fetching the result image
    Downloading,
    /// Writing the result to disk
    Writing,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Resolving => "Resolving input",
            ProcessingStage::Uploading => "Uploading image",
            ProcessingStage::Submitting => "Submitting job",
            ProcessingStage::Queued => "Waiting in queue",
            ProcessingStage::Running => "Removing background",
            ProcessingStage::Downloading => "Downloading result",
            ProcessingStage::Writing => "Saving result",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Resolving => 2,
            ProcessingStage::Uploading => 10,
            ProcessingStage::Submitting => 25,
            ProcessingStage::Queued => 30,
            ProcessingStage::Running => 50,
            ProcessingStage::Downloading => 85,
            ProcessingStage::Writing => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Input the update belongs to (path or URL)
    pub item: String,
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing of this item started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(item: &str, stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            item: item.to_string(),
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }

    /// Create a progress update with custom description
    #[must_use]
    pub fn with_description(
        item: &str,
        stage: ProcessingStage,
        description: String,
        start_time: Instant,
    ) -> Self {
        Self {
            item: item.to_string(),
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Trait for reporting progress during background removal operations
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report a log line streamed by the remote job
    fn report_remote_log(&self, item: &str, message: &str) {
        let _ = (item, message);
    }

    /// Report processing completion with final timings
    fn report_completion(&self, item: &str, timings: ProcessingTimings);

    /// Report an error during processing
    fn report_error(&self, item: &str, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _item: &str, _timings: ProcessingTimings) {}

    fn report_error(&self, _item: &str, _stage: ProcessingStage, _error: &str) {}
}

/// Console progress reporter that logs progress through `log`
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to show stage-by-stage and remote log output
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {}: {} ({}ms elapsed)",
                update.progress,
                update.item,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::debug!("[{}%] {}: {}", update.progress, update.item, update.description);
        }
    }

    fn report_remote_log(&self, item: &str, message: &str) {
        if self.verbose {
            log::info!("  ↳ {}: {}", item, message);
        } else {
            log::debug!("  ↳ {}: {}", item, message);
        }
    }

    fn report_completion(&self, item: &str, timings: ProcessingTimings) {
        log::info!("✅ {} done in {}ms", item, timings.total_ms);

        if self.verbose {
            log::info!("  📊 Detailed timings:");
            log::info!("    • Upload: {}ms", timings.upload_ms);
            log::info!("    • Inference: {}ms", timings.inference_ms);
            log::info!("    • Download: {}ms", timings.download_ms);
            log::info!("    • Write: {}ms", timings.write_ms);
        }
    }

    fn report_error(&self, item: &str, stage: ProcessingStage, error: &str) {
        log::error!("❌ {}: error during {}: {}", item, stage.description(), error);
    }
}

/// Per-item tracker that remembers the start time and current stage
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    item: String,
    start_time: Instant,
    current_stage: ProcessingStage,
    queue_position: Option<u32>,
}

impl ProgressTracker {
    /// Create a new progress tracker for one input
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>, item: impl Into<String>) -> Self {
        Self {
            reporter,
            item: item.into(),
            start_time: Instant::now(),
            current_stage: ProcessingStage::Resolving,
            queue_position: None,
        }
    }

    /// Create a progress tracker with no-op reporter (for testing/disabled progress)
    #[must_use]
    pub fn no_op(item: impl Into<String>) -> Self {
        Self::new(Arc::new(NoOpProgressReporter), item)
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = stage;
        let update = ProgressUpdate::new(&self.item, stage, self.start_time);
        self.reporter.report_progress(update);
    }

    /// Report progress with custom description
    pub fn report_stage_with_description(&mut self, stage: ProcessingStage, description: String) {
        self.current_stage = stage;
        let update =
            ProgressUpdate::with_description(&self.item, stage, description, self.start_time);
        self.reporter.report_progress(update);
    }

    /// Translate a remote job update into stage changes and log lines
    ///
    /// Updates are only reported when the remote status or queue position
    /// moves, so a long queue wait does not flood the reporter.
    pub fn report_job_update(&mut self, update: &JobUpdate) {
        use crate::types::JobStatus;

        match update.status {
            JobStatus::InQueue
                if self.current_stage != ProcessingStage::Queued
                    || self.queue_position != update.queue_position =>
            {
                self.queue_position = update.queue_position;
                let description = match update.queue_position {
                    Some(position) => format!("Waiting in queue (position {})", position),
                    None => ProcessingStage::Queued.description().to_string(),
                };
                self.report_stage_with_description(ProcessingStage::Queued, description);
            },
            JobStatus::InProgress if self.current_stage != ProcessingStage::Running => {
                self.report_stage(ProcessingStage::Running);
            },
            JobStatus::InQueue | JobStatus::InProgress | JobStatus::Completed => {},
        }

        for line in &update.logs {
            self.reporter.report_remote_log(&self.item, line);
        }
    }

    /// Report completion with final timings
    pub fn report_completion(&mut self, timings: ProcessingTimings) {
        self.report_stage(ProcessingStage::Completed);
        self.reporter.report_completion(&self.item, timings);
    }

    /// Report an error at the current stage
    pub fn report_error(&self, error: &str) {
        self.reporter
            .report_error(&self.item, self.current_stage, error);
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get the current processing stage
    #[must_use]
    pub fn current_stage(&self) -> ProcessingStage {
        self.current_stage
    }
}
