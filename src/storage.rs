//! Uploading local images to FAL storage
//!
//! Two-step protocol: `initiate` returns a signed upload URL plus the public
//! file URL, then the bytes are `PUT` to the signed URL.

use crate::client::FalClient;
use crate::error::{BgRemovalError, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Body of the `initiate` call
#[derive(Debug, Serialize)]
pub(crate) struct InitiateUploadRequest<'a> {
    pub(crate) content_type: &'a str,
    pub(crate) file_name: &'a str,
}

/// Response of the `initiate` call
#[derive(Debug, Deserialize)]
pub(crate) struct InitiateUploadResponse {
    pub(crate) upload_url: Option<String>,
    pub(crate) file_url: Option<String>,
}

impl InitiateUploadResponse {
    /// Both URLs are required; anything else is an upload failure
    pub(crate) fn into_urls(self) -> Result<(String, String)> {
        match (self.upload_url, self.file_url) {
            (Some(upload_url), Some(file_url))
                if !upload_url.is_empty() && !file_url.is_empty() =>
            {
                Ok((upload_url, file_url))
            },
            _ => Err(BgRemovalError::upload(
                "Storage did not return upload_url and file_url",
            )),
        }
    }
}

/// Map a non-success storage status to an upload error
pub(crate) fn upload_status_error(
    operation: &str,
    status: StatusCode,
    body: &str,
) -> BgRemovalError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        BgRemovalError::upload(format!("{}: payload too large (HTTP 413)", operation))
    } else {
        BgRemovalError::upload(format!(
            "{} failed with HTTP {}: {}",
            operation,
            status.as_u16(),
            body.trim()
        ))
    }
}

impl FalClient {
    /// Upload bytes and return the public file URL
    ///
    /// No retry is attempted on failure.
    ///
    /// # Errors
    /// - `Upload` if the payload exceeds the configured limit
    /// - `Upload` on network failure or non-success status in either step
    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        file_name: &str,
    ) -> Result<String> {
        if let Some(limit) = self.config.max_upload_bytes {
            if bytes.len() as u64 > limit {
                return Err(BgRemovalError::upload(format!(
                    "'{}' is {} bytes, above the upload limit of {} bytes",
                    file_name,
                    bytes.len(),
                    limit
                )));
            }
        }

        let initiate_url = format!(
            "{}/storage/upload/initiate?storage_type=fal-cdn-v3",
            self.config.storage_base_url
        );
        tracing::debug!(file_name, content_type, size = bytes.len(), "Initiating upload");

        let response = self
            .authorized(self.http.post(&initiate_url))
            .json(&InitiateUploadRequest {
                content_type,
                file_name,
            })
            .send()
            .await
            .map_err(|e| BgRemovalError::upload_error("initiate upload", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::error_body(response).await;
            return Err(upload_status_error("Upload initiation", status, &body));
        }

        let (upload_url, file_url) = response
            .json::<InitiateUploadResponse>()
            .await
            .map_err(|e| BgRemovalError::upload_error("parse upload initiation response", &e))?
            .into_urls()?;

        let response = self
            .http
            .put(&upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| BgRemovalError::upload_error("upload file bytes", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::error_body(response).await;
            return Err(upload_status_error("Upload", status, &body));
        }

        log::info!("Uploaded {} to {}", file_name, file_url);
        Ok(file_url)
    }
}
