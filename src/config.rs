//! Configuration types for remote background removal
//!
//! [`FalConfig`] describes how to reach the hosted service (credential,
//! endpoints, timeouts). [`RemovalConfig`] describes what to ask the model for.
//! Both are plain values passed explicitly; nothing is read from the
//! environment after construction.

use crate::error::{BgRemovalError, Result};
use crate::models::{BiRefNetModel, OperatingResolution, OutputFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the API credential
pub const FAL_KEY_ENV: &str = "FAL_KEY";

/// Default queue host
pub const DEFAULT_QUEUE_BASE_URL: &str = "https://queue.fal.run";

/// Default storage REST host
pub const DEFAULT_STORAGE_BASE_URL: &str = "https://rest.alpha.fal.ai";

/// Hosted BiRefNet v2 application id
pub const DEFAULT_ENDPOINT: &str = "fal-ai/birefnet/v2";

/// Default suffix appended to the input stem
pub const DEFAULT_OUTPUT_SUFFIX: &str = "-nobg";

/// Connection settings for the hosted service
#[derive(Clone, PartialEq, Eq)]
pub struct FalConfig {
    /// API key sent as `Authorization: Key <api_key>`
    pub api_key: String,
    /// Queue base URL (job submission, status, result)
    pub queue_base_url: String,
    /// Storage REST base URL (uploads)
    pub storage_base_url: String,
    /// Application id of the model endpoint
    pub endpoint: String,
    /// Delay between two status polls
    pub poll_interval: Duration,
    /// Timeout applied to each individual HTTP request
    pub request_timeout: Duration,
    /// Upper bound for a whole job (submission to completion), `None` = wait forever
    pub job_timeout: Option<Duration>,
    /// Ask the queue for log lines while polling
    pub stream_logs: bool,
    /// Reject uploads above this size before sending them
    pub max_upload_bytes: Option<u64>,
}

// Hand-written so the key never ends up in a log line
impl std::fmt::Debug for FalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FalConfig")
            .field("api_key", &"<redacted>")
            .field("queue_base_url", &self.queue_base_url)
            .field("storage_base_url", &self.storage_base_url)
            .field("endpoint", &self.endpoint)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("job_timeout", &self.job_timeout)
            .field("stream_logs", &self.stream_logs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl FalConfig {
    /// Build a configuration for the given API key with default endpoints
    ///
    /// # Errors
    /// - `MissingCredential` if the key is empty
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    /// Read the API key from `FAL_KEY`
    ///
    /// # Errors
    /// - `MissingCredential` if `FAL_KEY` is unset or empty
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the API key through an arbitrary lookup (environment, test fixtures)
    ///
    /// # Errors
    /// - `MissingCredential` if the lookup returns nothing for `FAL_KEY`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = lookup(FAL_KEY_ENV)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                BgRemovalError::missing_credential(format!(
                    "{} is not set. Export your FAL.ai API key: export {}=<key>",
                    FAL_KEY_ENV, FAL_KEY_ENV
                ))
            })?;
        Self::new(key)
    }

    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> FalConfigBuilder {
        FalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - `MissingCredential` for an empty API key
    /// - `InvalidConfig` for empty URLs/endpoint or a zero poll interval
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(BgRemovalError::missing_credential(format!(
                "{} is empty",
                FAL_KEY_ENV
            )));
        }

        for (name, url) in [
            ("queue base URL", &self.queue_base_url),
            ("storage base URL", &self.storage_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(BgRemovalError::invalid_config(format!(
                    "Invalid {}: '{}' (expected http:// or https://)",
                    name, url
                )));
            }
        }

        if self.endpoint.trim_matches('/').split('/').count() < 2 {
            return Err(BgRemovalError::invalid_config(format!(
                "Invalid endpoint '{}'. Expected format: owner/app[/path]",
                self.endpoint
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(BgRemovalError::invalid_config(
                "Poll interval must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Value of the `Authorization` header
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Key {}", self.api_key)
    }
}

/// Builder for [`FalConfig`]
#[derive(Debug)]
pub struct FalConfigBuilder {
    api_key: Option<String>,
    queue_base_url: String,
    storage_base_url: String,
    endpoint: String,
    poll_interval: Duration,
    request_timeout: Duration,
    job_timeout: Option<Duration>,
    stream_logs: bool,
    max_upload_bytes: Option<u64>,
}

impl Default for FalConfigBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            queue_base_url: DEFAULT_QUEUE_BASE_URL.to_string(),
            storage_base_url: DEFAULT_STORAGE_BASE_URL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(300), // 5 minute timeout
            job_timeout: None,
            stream_logs: true,
            max_upload_bytes: None,
        }
    }
}

impl FalConfigBuilder {
    #[must_use]
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn queue_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.queue_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn storage_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.storage_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into().trim_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    #[must_use]
    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - `MissingCredential` if no API key was given
    /// - `InvalidConfig` from [`FalConfig::validate`]
    pub fn build(self) -> Result<FalConfig> {
        let api_key = self.api_key.ok_or_else(|| {
            BgRemovalError::missing_credential(format!("{} is not set", FAL_KEY_ENV))
        })?;

        let config = FalConfig {
            api_key,
            queue_base_url: self.queue_base_url,
            storage_base_url: self.storage_base_url,
            endpoint: self.endpoint,
            poll_interval: self.poll_interval,
            request_timeout: self.request_timeout,
            job_timeout: self.job_timeout,
            stream_logs: self.stream_logs,
            max_upload_bytes: self.max_upload_bytes,
        };
        config.validate()?;
        Ok(config)
    }
}

/// What to ask the remote model for, and how to name the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Model preset
    pub model: BiRefNetModel,
    /// Resolution the model operates at
    pub operating_resolution: OperatingResolution,
    /// Request higher-fidelity edge extraction
    pub refine_foreground: bool,
    /// Remote output format
    pub output_format: OutputFormat,
    /// Suffix appended to the input stem when deriving the output name
    pub output_suffix: String,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model: BiRefNetModel::default(),
            operating_resolution: OperatingResolution::default(),
            refine_foreground: false,
            output_format: OutputFormat::default(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use fal_bgremove::{BiRefNetModel, OperatingResolution, RemovalConfig};
    ///
    /// let config = RemovalConfig::builder()
    ///     .model(BiRefNetModel::Matting)
    ///     .operating_resolution(OperatingResolution::R2048)
    ///     .refine_foreground(true)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.output_suffix, "-nobg");
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty output suffix (the output would overwrite the input)
    /// - Output suffix containing a path separator
    pub fn validate(&self) -> Result<()> {
        if self.output_suffix.is_empty() {
            return Err(BgRemovalError::invalid_config(
                "Output suffix cannot be empty",
            ));
        }

        if self.output_suffix.contains(['/', '\\']) {
            return Err(BgRemovalError::invalid_config(format!(
                "Output suffix '{}' cannot contain path separators",
                self.output_suffix
            )));
        }

        Ok(())
    }
}

/// Builder for [`RemovalConfig`]
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn model(mut self, model: BiRefNetModel) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn operating_resolution(mut self, resolution: OperatingResolution) -> Self {
        self.config.operating_resolution = resolution;
        self
    }

    #[must_use]
    pub fn refine_foreground(mut self, refine: bool) -> Self {
        self.config.refine_foreground = refine;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn output_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`RemovalConfig::validate`]
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
