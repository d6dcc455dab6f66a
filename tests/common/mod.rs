//! Shared test fixtures: an in-memory remote service and input helpers

#![allow(dead_code)]

use async_trait::async_trait;
use fal_bgremove::{
    BgRemovalError, JobObserver, JobRequest, JobResult, JobStatus, JobUpdate, RemoteService,
    Result, ResultImage,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Bytes every mocked download returns
pub const RESULT_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nmock-result";

/// One call made against the mock, in order of arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upload {
        file_name: String,
        content_type: String,
        size: usize,
    },
    RunJob(JobRequest),
    Download(String),
}

/// Remote service double that records calls and can be told to fail
#[derive(Default)]
pub struct MockRemoteService {
    pub calls: Mutex<Vec<Call>>,
    /// Upload fails for file names in this list
    pub failing_uploads: Vec<String>,
    /// `run_job` fails when the image URL contains one of these markers
    pub failing_jobs: Vec<String>,
    /// Download fails when the result URL contains one of these markers
    pub failing_downloads: Vec<String>,
    /// Artificial job latency keyed by image URL marker
    pub job_delays: HashMap<String, Duration>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

/// Counts a running job until dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockRemoteService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Upload { .. }))
            .count()
    }

    pub fn job_requests(&self) -> Vec<JobRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RunJob(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Highest number of jobs that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter_job(&self) -> InFlight<'_> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteService for MockRemoteService {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        file_name: &str,
    ) -> Result<String> {
        self.record(Call::Upload {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        });
        if self.failing_uploads.iter().any(|f| f == file_name) {
            return Err(BgRemovalError::upload("storage rejected the file"));
        }
        Ok(format!("https://storage.test/files/{}", file_name))
    }

    async fn run_job(
        &self,
        request: &JobRequest,
        observer: JobObserver<'_>,
    ) -> Result<JobResult> {
        self.record(Call::RunJob(request.clone()));
        let _running = self.enter_job();

        observer(&JobUpdate {
            status: JobStatus::InQueue,
            queue_position: Some(1),
            logs: vec![],
        });

        if let Some(delay) = self
            .job_delays
            .iter()
            .find(|(marker, _)| request.image_url.contains(marker.as_str()))
            .map(|(_, d)| *d)
        {
            tokio::time::sleep(delay).await;
        }

        observer(&JobUpdate {
            status: JobStatus::InProgress,
            queue_position: None,
            logs: vec!["Removing background".to_string()],
        });

        if self
            .failing_jobs
            .iter()
            .any(|m| request.image_url.contains(m.as_str()))
        {
            return Err(BgRemovalError::model("job failed remotely"));
        }

        let name = request
            .image_url
            .rsplit('/')
            .next()
            .unwrap_or("image")
            .to_string();
        Ok(JobResult {
            image: ResultImage {
                url: format!("https://cdn.test/results/{}", name),
                width: Some(1024),
                height: Some(1024),
                content_type: Some("image/png".to_string()),
                file_name: Some(format!("{}.png", name)),
            },
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.record(Call::Download(url.to_string()));
        if self
            .failing_downloads
            .iter()
            .any(|m| url.contains(m.as_str()))
        {
            return Err(BgRemovalError::download(format!("HTTP error 404 for {}", url)));
        }
        Ok(RESULT_BYTES.to_vec())
    }
}

/// Write a small fake image file and return its path
pub fn write_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
    path
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
