//! Remote service abstraction and its HTTP implementation
//!
//! [`RemoteService`] is the seam between the pipeline and the hosted model.
//! [`FalClient`] implements it over HTTP; the upload, queue and download halves
//! live in [`crate::storage`], [`crate::queue`] and [`crate::download`].

use crate::config::FalConfig;
use crate::error::{BgRemovalError, Result};
use crate::types::{JobRequest, JobResult, JobUpdate};
use async_trait::async_trait;
use reqwest::Client;

/// Observer called zero or more times while a job runs
pub type JobObserver<'a> = &'a (dyn Fn(&JobUpdate) + Send + Sync);

/// Operations the pipeline needs from the hosted service
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Upload raw bytes and return a publicly fetchable URL
    ///
    /// # Errors
    /// - `Upload` on network failure, rejected or oversized payload
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, file_name: &str) -> Result<String>;

    /// Submit a job and wait for its result
    ///
    /// # Errors
    /// - `Model` on any remote failure or malformed response
    async fn run_job(&self, request: &JobRequest, observer: JobObserver<'_>) -> Result<JobResult>;

    /// Download the bytes behind a result URL
    ///
    /// # Errors
    /// - `Download` on network failure or non-success status
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP client for the FAL.ai storage and queue APIs
#[derive(Debug, Clone)]
pub struct FalClient {
    pub(crate) http: Client,
    pub(crate) config: FalConfig,
}

impl FalClient {
    /// Create a new client
    ///
    /// # Errors
    /// - Invalid configuration (see [`FalConfig::validate`])
    /// - Failed to create HTTP client
    pub fn new(config: FalConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BgRemovalError::invalid_config(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { http, config })
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    ///
    /// # Errors
    /// - Invalid configuration (see [`FalConfig::validate`])
    pub fn with_client(http: Client, config: FalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { http, config })
    }

    /// Connection settings in use
    #[must_use]
    pub fn config(&self) -> &FalConfig {
        &self.config
    }

    /// Attach the `Authorization` header
    pub(crate) fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(reqwest::header::AUTHORIZATION, self.config.authorization())
    }

    /// Read a response body for an error message without failing on unreadable bodies
    pub(crate) async fn error_body(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string())
    }
}

#[async_trait]
impl RemoteService for FalClient {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, file_name: &str) -> Result<String> {
        self.upload_bytes(bytes, content_type, file_name).await
    }

    async fn run_job(&self, request: &JobRequest, observer: JobObserver<'_>) -> Result<JobResult> {
        self.subscribe(request, observer).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_bytes(url).await
    }
}
