//! Job submission and polling against the FAL queue
//!
//! `POST {queue}/{endpoint}` enqueues a job and returns its handle. The
//! status URL is polled until the job reports `COMPLETED`, then the result is
//! fetched from the response URL. Remote log lines are forwarded to the
//! observer once each; they never influence control flow.

use crate::client::{FalClient, JobObserver};
use crate::error::{BgRemovalError, Result};
use crate::types::{JobRequest, JobResult, JobStatus, JobUpdate, ResultImage};
use instant::Instant;
use serde::Deserialize;
use serde_json::Value;

/// Handle returned when a job is enqueued
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobHandle {
    pub request_id: String,
    pub status_url: Option<String>,
    pub response_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// One remote log entry
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteLog {
    pub(crate) message: String,
}

/// Body of a status poll
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: JobStatus,
    pub(crate) queue_position: Option<u32>,
    #[serde(default)]
    pub(crate) logs: Option<Vec<RemoteLog>>,
    /// Set by the queue when a completed job failed
    #[serde(default)]
    pub(crate) error: Option<String>,
}

impl StatusResponse {
    /// Build the observer update, skipping the `seen` log lines already delivered
    pub(crate) fn to_update(&self, seen: &mut usize) -> JobUpdate {
        let all_logs = self.logs.as_deref().unwrap_or(&[]);
        // Queues may send the whole log so far or only a recent tail
        let start = if all_logs.len() >= *seen { *seen } else { 0 };
        let logs: Vec<String> = all_logs
            .iter()
            .skip(start)
            .map(|entry| entry.message.clone())
            .collect();
        *seen = start + logs.len();

        JobUpdate {
            status: self.status,
            queue_position: self.queue_position,
            logs,
        }
    }
}

/// `owner/app` part of an endpoint id (`fal-ai/birefnet/v2` → `fal-ai/birefnet`)
#[must_use]
pub fn app_root(endpoint: &str) -> String {
    endpoint
        .trim_matches('/')
        .split('/')
        .take(2)
        .collect::<Vec<_>>()
        .join("/")
}

/// Extract the job result from a response body
///
/// Accepts the bare output (`{"image": {...}}`) as well as a client-style
/// envelope (`{"data": {"image": {...}}}`). A missing or empty `image.url` is
/// a malformed response.
///
/// # Errors
/// - `Model` if `image` or `image.url` is missing
pub fn parse_job_output(body: &Value) -> Result<JobResult> {
    let output = body.get("data").filter(|d| d.is_object()).unwrap_or(body);

    let image = output
        .get("image")
        .filter(|i| i.is_object())
        .ok_or_else(|| BgRemovalError::malformed_response("missing 'image' in job result"))?;

    let url = image
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| BgRemovalError::malformed_response("missing 'image.url' in job result"))?;

    let dimension = |key: &str| {
        image
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    };
    let text = |key: &str| image.get(key).and_then(Value::as_str).map(ToString::to_string);

    Ok(JobResult {
        image: ResultImage {
            url: url.to_string(),
            width: dimension("width"),
            height: dimension("height"),
            content_type: text("content_type"),
            file_name: text("file_name"),
        },
    })
}

impl FalClient {
    /// URL jobs for the configured endpoint are posted to
    #[must_use]
    pub fn submit_url(&self) -> String {
        format!("{}/{}", self.config.queue_base_url, self.config.endpoint)
    }

    fn request_base_url(&self, request_id: &str) -> String {
        format!(
            "{}/{}/requests/{}",
            self.config.queue_base_url,
            app_root(&self.config.endpoint),
            request_id
        )
    }

    /// Status URL of a job, derived when the queue did not return one
    #[must_use]
    pub fn status_url(&self, handle: &JobHandle) -> String {
        handle
            .status_url
            .clone()
            .unwrap_or_else(|| format!("{}/status", self.request_base_url(&handle.request_id)))
    }

    /// Response URL of a job, derived when the queue did not return one
    #[must_use]
    pub fn response_url(&self, handle: &JobHandle) -> String {
        handle
            .response_url
            .clone()
            .unwrap_or_else(|| self.request_base_url(&handle.request_id))
    }

    /// Cancel URL of a job, derived when the queue did not return one
    #[must_use]
    pub fn cancel_url(&self, handle: &JobHandle) -> String {
        handle
            .cancel_url
            .clone()
            .unwrap_or_else(|| format!("{}/cancel", self.request_base_url(&handle.request_id)))
    }

    /// Enqueue a job
    ///
    /// # Errors
    /// - `Model` on network failure, non-success status or a handle without `request_id`
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        let url = self.submit_url();
        tracing::debug!(url = %url, model = %request.model, "Submitting job");

        let response = self
            .authorized(self.http.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| BgRemovalError::model(format!("Failed to submit job: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::error_body(response).await;
            return Err(BgRemovalError::remote_status("Job submission", status.as_u16(), &body));
        }

        let handle: JobHandle = response.json().await.map_err(|e| {
            BgRemovalError::malformed_response(format!("invalid submission response: {}", e))
        })?;
        log::debug!("Job enqueued with request id {}", handle.request_id);
        Ok(handle)
    }

    /// Poll a job's status once
    pub(crate) async fn poll_status(&self, handle: &JobHandle) -> Result<StatusResponse> {
        let mut request = self.authorized(self.http.get(self.status_url(handle)));
        if self.config.stream_logs {
            request = request.query(&[("logs", "1")]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BgRemovalError::model(format!("Failed to poll job status: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::error_body(response).await;
            return Err(BgRemovalError::remote_status("Status poll", status.as_u16(), &body));
        }

        response.json().await.map_err(|e| {
            BgRemovalError::malformed_response(format!("invalid status response: {}", e))
        })
    }

    /// Fetch the output of a completed job
    ///
    /// # Errors
    /// - `Model` on network failure, non-success status or malformed result
    pub async fn fetch_result(&self, handle: &JobHandle) -> Result<JobResult> {
        let response = self
            .authorized(self.http.get(self.response_url(handle)))
            .send()
            .await
            .map_err(|e| BgRemovalError::model(format!("Failed to fetch job result: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::error_body(response).await;
            return Err(BgRemovalError::remote_status("Job", status.as_u16(), &body));
        }

        let body: Value = response.json().await.map_err(|e| {
            BgRemovalError::malformed_response(format!("job result is not JSON: {}", e))
        })?;
        parse_job_output(&body)
    }

    /// Ask the queue to cancel a job, ignoring the outcome
    pub async fn cancel(&self, handle: &JobHandle) {
        let result = self
            .authorized(self.http.put(self.cancel_url(handle)))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                log::info!("Cancelled job {}", handle.request_id);
            },
            Ok(response) => {
                log::warn!(
                    "Cancelling job {} returned HTTP {}",
                    handle.request_id,
                    response.status()
                );
            },
            Err(e) => log::warn!("Failed to cancel job {}: {}", handle.request_id, e),
        }
    }

    /// Submit a job and poll it until completion
    ///
    /// # Errors
    /// - `Model` on submission, polling or result failures, or when the job timeout expires
    pub async fn subscribe(
        &self,
        request: &JobRequest,
        observer: JobObserver<'_>,
    ) -> Result<JobResult> {
        let handle = self.submit(request).await?;
        let started = Instant::now();
        let mut seen_logs = 0usize;

        loop {
            let status = self.poll_status(&handle).await?;
            observer(&status.to_update(&mut seen_logs));

            if status.status == JobStatus::Completed {
                if let Some(error) = status.error {
                    return Err(BgRemovalError::model(format!(
                        "Job {} failed: {}",
                        handle.request_id, error
                    )));
                }
                break;
            }

            if let Some(limit) = self.config.job_timeout {
                if started.elapsed() >= limit {
                    self.cancel(&handle).await;
                    return Err(BgRemovalError::model(format!(
                        "Job {} did not complete within {:.0}s",
                        handle.request_id,
                        limit.as_secs_f64()
                    )));
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        tracing::debug!(
            request_id = %handle.request_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job completed"
        );
        self.fetch_result(&handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FalConfig;
    use crate::models::{BiRefNetModel, OperatingResolution};
    use serde_json::json;

    fn client() -> FalClient {
        FalClient::new(FalConfig::new("k").unwrap()).unwrap()
    }

    fn handle(status_url: Option<&str>) -> JobHandle {
        JobHandle {
            request_id: "req-123".to_string(),
            status_url: status_url.map(ToString::to_string),
            response_url: None,
            cancel_url: None,
        }
    }

    #[test]
    fn test_app_root() {
        assert_eq!(app_root("fal-ai/birefnet/v2"), "fal-ai/birefnet");
        assert_eq!(app_root("fal-ai/birefnet"), "fal-ai/birefnet");
        assert_eq!(app_root("/owner/app/a/b/"), "owner/app");
    }

    #[test]
    fn test_derived_urls() {
        let client = client();
        assert_eq!(client.submit_url(), "https://queue.fal.run/fal-ai/birefnet/v2");

        let h = handle(None);
        assert_eq!(
            client.status_url(&h),
            "https://queue.fal.run/fal-ai/birefnet/requests/req-123/status"
        );
        assert_eq!(
            client.response_url(&h),
            "https://queue.fal.run/fal-ai/birefnet/requests/req-123"
        );
        assert_eq!(
            client.cancel_url(&h),
            "https://queue.fal.run/fal-ai/birefnet/requests/req-123/cancel"
        );

        let h = handle(Some("https://elsewhere/status"));
        assert_eq!(client.status_url(&h), "https://elsewhere/status");
    }

    #[test]
    fn test_request_body_passes_values_through() {
        let request = JobRequest {
            image_url: "https://cdn.example/in.jpg".to_string(),
            model: BiRefNetModel::Matting,
            operating_resolution: OperatingResolution::R2048,
            refine_foreground: true,
            output_format: crate::models::OutputFormat::Png,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "image_url": "https://cdn.example/in.jpg",
                "model": "Matting",
                "operating_resolution": "2048x2048",
                "refine_foreground": true,
                "output_format": "png"
            })
        );
    }

    #[test]
    fn test_parse_job_output_bare_and_enveloped() {
        let image = json!({
            "url": "https://cdn.example/out.png",
            "width": 800,
            "height": 600,
            "content_type": "image/png",
            "file_name": "out.png"
        });

        let bare = parse_job_output(&json!({ "image": image.clone() })).unwrap();
        let wrapped = parse_job_output(&json!({ "data": { "image": image } })).unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.image.url, "https://cdn.example/out.png");
        assert_eq!(bare.image.width, Some(800));
        assert_eq!(bare.image.height, Some(600));
        assert_eq!(bare.image.content_type.as_deref(), Some("image/png"));
        assert_eq!(bare.image.file_name.as_deref(), Some("out.png"));
    }

    #[test]
    fn test_parse_job_output_optional_fields() {
        let result = parse_job_output(&json!({ "image": { "url": "https://x/y.png" } })).unwrap();
        assert_eq!(result.image.width, None);
        assert_eq!(result.image.file_name, None);
    }

    #[test]
    fn test_parse_job_output_missing_url_is_model_error() {
        for body in [
            json!({}),
            json!({ "image": null }),
            json!({ "image": { "width": 10 } }),
            json!({ "image": { "url": "" } }),
            json!({ "data": { "image": { "height": 3 } } }),
        ] {
            let err = parse_job_output(&body).unwrap_err();
            assert!(
                matches!(err, BgRemovalError::Model(_)),
                "expected model error for {}",
                body
            );
            assert!(err.to_string().contains("Malformed response"));
        }
    }

    #[test]
    fn test_status_response_parsing() {
        let status: StatusResponse = serde_json::from_value(json!({
            "status": "IN_QUEUE",
            "queue_position": 2,
            "response_url": "https://queue/x"
        }))
        .unwrap();
        assert_eq!(status.status, JobStatus::InQueue);
        assert_eq!(status.queue_position, Some(2));
        assert!(status.logs.is_none());

        let status: StatusResponse = serde_json::from_value(json!({
            "status": "IN_PROGRESS",
            "logs": [{"message": "step 1", "level": "INFO", "timestamp": "2024-01-01T00:00:00"}]
        }))
        .unwrap();
        assert_eq!(status.status, JobStatus::InProgress);
        assert_eq!(status.logs.unwrap().len(), 1);
    }

    #[test]
    fn test_status_logs_delivered_once() {
        let mut seen = 0;
        let first: StatusResponse = serde_json::from_value(json!({
            "status": "IN_PROGRESS",
            "logs": [{"message": "a"}, {"message": "b"}]
        }))
        .unwrap();
        assert_eq!(first.to_update(&mut seen).logs, vec!["a", "b"]);

        let second: StatusResponse = serde_json::from_value(json!({
            "status": "IN_PROGRESS",
            "logs": [{"message": "a"}, {"message": "b"}, {"message": "c"}]
        }))
        .unwrap();
        assert_eq!(second.to_update(&mut seen).logs, vec!["c"]);

        let done: StatusResponse = serde_json::from_value(json!({
            "status": "COMPLETED",
            "logs": [{"message": "a"}, {"message": "b"}, {"message": "c"}]
        }))
        .unwrap();
        let update = done.to_update(&mut seen);
        assert!(update.logs.is_empty());
        assert_eq!(update.status, JobStatus::Completed);
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_status_logs_restart_when_shorter() {
        let mut seen = 5;
        let status: StatusResponse = serde_json::from_value(json!({
            "status": "IN_PROGRESS",
            "logs": [{"message": "fresh"}]
        }))
        .unwrap();
        assert_eq!(status.to_update(&mut seen).logs, vec!["fresh"]);
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_job_handle_parsing() {
        let h: JobHandle = serde_json::from_value(json!({
            "request_id": "abc",
            "status_url": "https://q/s",
            "response_url": "https://q/r",
            "cancel_url": "https://q/c",
            "queue_position": 0
        }))
        .unwrap();
        assert_eq!(h.request_id, "abc");
        assert_eq!(h.response_url.as_deref(), Some("https://q/r"));
    }
}
