//! Unified background removal processor
//!
//! This module provides the `BackgroundRemovalProcessor` that runs the remote
//! pipeline for one image (resolve, upload, run the job, download, write) and
//! repeats it for batches. The CLI and library entry points both go through it.

use crate::{
    client::{FalClient, RemoteService},
    config::{FalConfig, RemovalConfig},
    error::{BgRemovalError, Result},
    input::{mime_type_for_path, ImageSource},
    services::{
        ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker,
    },
    tracing_config::{events, spans},
    types::{JobRequest, JobUpdate, ProcessedImage, ProcessingTimings},
};
use futures::stream::{self, StreamExt};
use instant::Instant;
use log::{debug, info, warn};
use std::collections::{hash_map::Entry, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::Instrument;

/// Outcome of a batch run
///
/// Both lists keep the order of the inputs.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<ProcessedImage>,
    pub failed: Vec<(String, BgRemovalError)>,
}

impl BatchReport {
    /// Number of inputs the batch saw
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// `true` when there was at least one input and none succeeded
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

/// Shares one tracker between the pipeline and the job observer
struct SharedTracker(Mutex<ProgressTracker>);

impl SharedTracker {
    fn new(reporter: Arc<dyn ProgressReporter>, item: &str) -> Self {
        Self(Mutex::new(ProgressTracker::new(reporter, item)))
    }

    fn with<F: FnOnce(&mut ProgressTracker)>(&self, f: F) {
        // Poisoned only if a reporter panicked
        match self.0.lock() {
            Ok(mut tracker) => f(&mut tracker),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn stage(&self, stage: ProcessingStage) {
        self.with(|t| t.report_stage(stage));
    }
}

/// Runs the background removal pipeline against a [`RemoteService`]
pub struct BackgroundRemovalProcessor {
    service: Arc<dyn RemoteService>,
    config: RemovalConfig,
    reporter: Arc<dyn ProgressReporter>,
    concurrency: usize,
}

impl BackgroundRemovalProcessor {
    /// Create a processor over any remote service implementation
    ///
    /// # Errors
    /// - Invalid removal configuration (see [`RemovalConfig::validate`])
    pub fn new(service: Arc<dyn RemoteService>, config: RemovalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            service,
            config,
            reporter: Arc::new(NoOpProgressReporter),
            concurrency: 1,
        })
    }

    /// Create a processor talking to FAL.ai over HTTP
    ///
    /// # Errors
    /// - Invalid connection or removal configuration
    /// - Failed to create the HTTP client
    pub fn with_fal(fal_config: FalConfig, config: RemovalConfig) -> Result<Self> {
        let client = FalClient::new(fal_config)?;
        Self::new(Arc::new(client), config)
    }

    /// Route progress to the given reporter
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Maximum number of images processed at once in [`Self::process_batch`]
    ///
    /// `0` is treated as `1`.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Removal settings in use
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process one input given as a path or URL
    ///
    /// `output_override` replaces the derived output path.
    ///
    /// # Errors
    /// - `NotFound` for a missing local file, before anything is uploaded
    /// - `Upload`, `Model`, `Download` or `Write` from the matching step
    pub async fn process(
        &self,
        input: &str,
        output_override: Option<&Path>,
    ) -> Result<ProcessedImage> {
        self.run_tracked(input, ImageSource::resolve(input), |source| {
            Ok(self.output_path(source, output_override, None))
        })
        .await
    }

    /// Process an already classified source
    ///
    /// # Errors
    /// See [`Self::process`]
    pub async fn process_source(
        &self,
        source: ImageSource,
        output_override: Option<&Path>,
    ) -> Result<ProcessedImage> {
        let item = source.to_string();
        let resolved = source.validate().map(|()| source);
        self.run_tracked(&item, resolved, |source| {
            Ok(self.output_path(source, output_override, None))
        })
        .await
    }

    /// Process many inputs, continuing past failures
    ///
    /// Results are written next to each input, or into `output_dir` when
    /// given. Up to [`Self::concurrency`] inputs run at once; the report
    /// keeps input order either way. An input whose output path is already
    /// claimed by an earlier input fails with `Write` and is not sent.
    pub async fn process_batch<S: AsRef<str>>(
        &self,
        inputs: &[S],
        output_dir: Option<&Path>,
    ) -> BatchReport {
        let span = spans::batch_processing(inputs.len(), self.concurrency);
        async {
            info!(
                "Processing {} input(s) with concurrency {}",
                inputs.len(),
                self.concurrency
            );

            let collisions = self.output_collisions(inputs, output_dir);
            let outcomes: Vec<(String, Result<ProcessedImage>)> =
                stream::iter(inputs.iter().zip(collisions))
                    .map(|(input, collides_with)| {
                        let input = input.as_ref().to_string();
                        async move {
                            let resolved = ImageSource::resolve(&input);
                            let outcome = self
                                .run_tracked(&input, resolved, |source| {
                                    let path = self.output_path(source, None, output_dir);
                                    match collides_with {
                                        Some(earlier) => {
                                            Err(BgRemovalError::output_collision(&path, &earlier))
                                        },
                                        None => Ok(path),
                                    }
                                })
                                .await;
                            (input, outcome)
                        }
                    })
                    .buffered(self.concurrency)
                    .collect()
                    .await;

            let mut report = BatchReport::default();
            for (input, outcome) in outcomes {
                match outcome {
                    Ok(processed) => report.succeeded.push(processed),
                    Err(e) => {
                        warn!("Failed to process {}: {}", input, e);
                        report.failed.push((input, e));
                    },
                }
            }

            info!(
                "Batch finished: {} succeeded, {} failed",
                report.succeeded.len(),
                report.failed.len()
            );
            report
        }
        .instrument(span)
        .await
    }

    /// For each input, the earlier input whose output path it would overwrite
    fn output_collisions<S: AsRef<str>>(
        &self,
        inputs: &[S],
        output_dir: Option<&Path>,
    ) -> Vec<Option<String>> {
        let mut claimed: HashMap<PathBuf, &str> = HashMap::new();
        inputs
            .iter()
            .map(|input| {
                let input = input.as_ref();
                let path = self.output_path(&ImageSource::parse(input), None, output_dir);
                match claimed.entry(path) {
                    Entry::Occupied(first) => Some((*first.get()).to_string()),
                    Entry::Vacant(slot) => {
                        slot.insert(input);
                        None
                    },
                }
            })
            .collect()
    }

    /// Resolve the output path and run the pipeline, reporting any failure
    async fn run_tracked<F>(
        &self,
        item: &str,
        resolved: Result<ImageSource>,
        output_path: F,
    ) -> Result<ProcessedImage>
    where
        F: FnOnce(&ImageSource) -> Result<PathBuf>,
    {
        let tracker = SharedTracker::new(self.reporter.clone(), item);
        tracker.stage(ProcessingStage::Resolving);

        let planned = resolved.and_then(|source| output_path(&source).map(|path| (source, path)));
        let result = match planned {
            Ok((source, path)) => self.run_pipeline(source, path, &tracker).await,
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            tracker.with(|t| t.report_error(&e.to_string()));
        }
        result
    }

    fn output_path(
        &self,
        source: &ImageSource,
        output_override: Option<&Path>,
        output_dir: Option<&Path>,
    ) -> PathBuf {
        match output_override {
            Some(path) => path.to_path_buf(),
            None => ImageIOService::derive_output_path(
                source,
                output_dir,
                &self.config.output_suffix,
                self.config.output_format,
            ),
        }
    }

    async fn run_pipeline(
        &self,
        source: ImageSource,
        output_path: PathBuf,
        tracker: &SharedTracker,
    ) -> Result<ProcessedImage> {
        let span = spans::image_processing(&source.to_string(), self.config.model.api_name());
        async {
            let total_start = Instant::now();
            let mut timings = ProcessingTimings::default();

            let image_url = match &source {
                ImageSource::Local(path) => {
                    tracker.stage(ProcessingStage::Uploading);
                    let upload_start = Instant::now();
                    let bytes = ImageIOService::read_input(path).await?;
                    let file_name = source.file_name();
                    let content_type = mime_type_for_path(path);
                    let upload_span = spans::upload(&file_name, bytes.len());
                    let url = self
                        .service
                        .upload(bytes, content_type, &file_name)
                        .instrument(upload_span)
                        .await?;
                    timings.upload_ms = upload_start.elapsed().as_millis() as u64;
                    events::performance_metric("upload", timings.upload_ms);
                    url
                },
                ImageSource::Remote(url) => {
                    debug!("Using remote input as-is: {}", url);
                    url.clone()
                },
            };

            tracker.stage(ProcessingStage::Submitting);
            let request = JobRequest::new(image_url, &self.config);
            let observer = |update: &JobUpdate| tracker.with(|t| t.report_job_update(update));

            let inference_start = Instant::now();
            let result = self
                .service
                .run_job(&request, &observer)
                .instrument(spans::remote_job(
                    request.model.api_name(),
                    request.operating_resolution.api_name(),
                ))
                .await?;
            timings.inference_ms = inference_start.elapsed().as_millis() as u64;
            events::performance_metric("inference", timings.inference_ms);

            tracker.stage(ProcessingStage::Downloading);
            let download_start = Instant::now();
            let bytes = self
                .service
                .download(&result.image.url)
                .instrument(spans::download(&result.image.url, &output_path))
                .await?;
            timings.download_ms = download_start.elapsed().as_millis() as u64;

            tracker.stage(ProcessingStage::Writing);
            let write_start = Instant::now();
            ImageIOService::write_output(&output_path, &bytes).await?;
            timings.write_ms = write_start.elapsed().as_millis() as u64;
            timings.total_ms = total_start.elapsed().as_millis() as u64;

            tracker.with(|t| t.report_completion(timings));
            info!("Saved {} -> {}", source, output_path.display());

            Ok(ProcessedImage {
                source,
                output_path,
                result,
                bytes_written: bytes.len(),
                timings,
            })
        }
        .instrument(span)
        .await
    }
}
