//! Error types for background removal operations

use std::path::Path;
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Every failure a pipeline run can report
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// `FAL_KEY` (or an explicit API key) was not provided
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Local input file does not exist or is not a readable file
    #[error("Input not found: {0}")]
    NotFound(String),

    /// Storage upload failed (network, HTTP status or payload size)
    #[error("Upload error: {0}")]
    Upload(String),

    /// Remote inference failed, the model name was invalid or the response was malformed
    #[error("Model error: {0}")]
    Model(String),

    /// Fetching the result image failed
    #[error("Download error: {0}")]
    Download(String),

    /// Persisting the result image failed
    #[error("Write error: {0}")]
    Write(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors outside the writer (reading inputs, listing directories)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BgRemovalError {
    /// Create a new missing credential error
    pub fn missing_credential<S: Into<String>>(msg: S) -> Self {
        Self::MissingCredential(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new upload error
    pub fn upload<S: Into<String>>(msg: S) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a new download error
    pub fn download<S: Into<String>>(msg: S) -> Self {
        Self::Download(msg.into())
    }

    // Contextual error creators

    /// Create a not-found error for a local input path
    pub fn not_found<P: AsRef<Path>>(path: P) -> Self {
        Self::NotFound(format!(
            "'{}' does not exist or is not a file",
            path.as_ref().display()
        ))
    }

    /// Create a write error with the destination path
    pub fn write_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        Self::Write(format!(
            "Failed to {} '{}': {}",
            operation,
            path.as_ref().display(),
            error
        ))
    }

    /// Create a write error for a batch output already claimed by another input
    pub fn output_collision<P: AsRef<Path>>(path: P, earlier_input: &str) -> Self {
        Self::Write(format!(
            "Output '{}' collides with the output of '{}'",
            path.as_ref().display(),
            earlier_input
        ))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create an upload error from a transport failure
    pub fn upload_error(operation: &str, error: &dyn std::error::Error) -> Self {
        Self::Upload(format!("Failed to {}: {}", operation, error))
    }

    /// Create a model error from a non-success HTTP response
    pub fn remote_status(operation: &str, status: u16, body: &str) -> Self {
        Self::Model(format!(
            "{} failed with HTTP {}: {}",
            operation,
            status,
            summarize_body(body)
        ))
    }

    /// Create a model error for a response missing required fields
    pub fn malformed_response<S: AsRef<str>>(details: S) -> Self {
        Self::Model(format!("Malformed response: {}", details.as_ref()))
    }

    /// Short, stable name of the error category (used in logs and batch summaries)
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential(_) => "MissingCredential",
            Self::NotFound(_) => "NotFound",
            Self::Upload(_) => "UploadError",
            Self::Model(_) => "ModelError",
            Self::Download(_) => "DownloadError",
            Self::Write(_) => "WriteError",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::Io(_) => "IoError",
        }
    }
}

/// Trim remote error bodies so a whole HTML error page never lands in a log line
fn summarize_body(body: &str) -> String {
    const LIMIT: usize = 512;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    if trimmed.chars().count() > LIMIT {
        let head: String = trimmed.chars().take(LIMIT).collect();
        format!("{}…", head)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BgRemovalError::invalid_config("test config error");
        assert!(matches!(err, BgRemovalError::InvalidConfig(_)));

        let err = BgRemovalError::model("unknown model");
        assert!(matches!(err, BgRemovalError::Model(_)));
    }

    #[test]
    fn test_error_display() {
        let err = BgRemovalError::missing_credential("FAL_KEY is not set");
        assert_eq!(err.to_string(), "Missing credential: FAL_KEY is not set");
    }

    #[test]
    fn test_contextual_errors() {
        let err = BgRemovalError::not_found(Path::new("/tmp/missing.jpg"));
        assert!(matches!(err, BgRemovalError::NotFound(_)));
        assert!(err.to_string().contains("/tmp/missing.jpg"));

        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = BgRemovalError::write_error("write output", Path::new("/out/a.png"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.starts_with("Write error:"));
        assert!(error_string.contains("/out/a.png"));
        assert!(error_string.contains("access denied"));

        let err = BgRemovalError::remote_status("Job submission", 422, "{\"detail\":\"bad\"}");
        assert!(matches!(err, BgRemovalError::Model(_)));
        assert!(err.to_string().contains("HTTP 422"));

        let err = BgRemovalError::malformed_response("missing image.url");
        assert_eq!(
            err.to_string(),
            "Model error: Malformed response: missing image.url"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(BgRemovalError::upload("x").kind(), "UploadError");
        assert_eq!(BgRemovalError::download("x").kind(), "DownloadError");
        assert_eq!(BgRemovalError::not_found("x").kind(), "NotFound");
        assert_eq!(
            BgRemovalError::missing_credential("x").kind(),
            "MissingCredential"
        );
    }

    #[test]
    fn test_summarize_body() {
        assert_eq!(summarize_body("   "), "<empty body>");
        assert_eq!(summarize_body(" oops "), "oops");
        let long = "x".repeat(2000);
        let summary = summarize_body(&long);
        assert!(summary.chars().count() <= 513);
        assert!(summary.ends_with('…'));
    }
}
