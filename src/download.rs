//! Fetching result images
//!
//! Results are small (a single PNG), so the body is streamed into memory and
//! handed to the writer in one piece.

use crate::client::FalClient;
use crate::error::{BgRemovalError, Result};
use futures_util::stream::TryStreamExt;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

/// Upper bound for preallocating from `Content-Length`; larger bodies grow as they stream
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

impl FalClient {
    /// Download the bytes behind a result URL
    ///
    /// The result URL is public; no credential is sent with it.
    ///
    /// # Errors
    /// - `Download` on network failure, non-success status or an interrupted body
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("Downloading result: {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::download(format!("Failed to download {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(BgRemovalError::download(format!(
                "HTTP error {} for {}",
                response.status(),
                url
            )));
        }

        let total_size = response.content_length();
        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let capacity = total_size.map_or(0, |n| n.min(MAX_PREALLOCATION) as usize);
        let mut buffer = Vec::with_capacity(capacity);
        let downloaded = stream.read_to_end(&mut buffer).await.map_err(|e| {
            BgRemovalError::download(format!("Failed to read download stream: {}", e))
        })?;

        if let Some(total) = total_size {
            if downloaded as u64 != total {
                return Err(BgRemovalError::download(format!(
                    "Truncated download from {}: got {} of {} bytes",
                    url, downloaded, total
                )));
            }
        }

        crate::tracing_config::events::download_progress(url, downloaded as u64, total_size);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FalConfig;

    #[tokio::test]
    async fn test_download_unreachable_host_is_download_error() {
        let config = FalConfig::builder()
            .api_key("k")
            .request_timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let client = FalClient::new(config).unwrap();

        // Port 9 (discard) on loopback is closed on test machines
        let err = client
            .fetch_bytes("http://127.0.0.1:9/result.png")
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::Download(_)));
    }

    #[tokio::test]
    async fn test_download_invalid_url_is_download_error() {
        let client = FalClient::new(FalConfig::new("k").unwrap()).unwrap();
        let err = client.fetch_bytes("not a url").await.unwrap_err();
        assert!(matches!(err, BgRemovalError::Download(_)));
    }
}
