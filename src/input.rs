//! Input resolution: local file paths versus remote URLs

use crate::error::{BgRemovalError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Image extensions picked up when expanding directories
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Where an image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Local file, uploaded before the job is submitted
    Local(PathBuf),
    /// Publicly fetchable URL, passed to the job as-is
    Remote(String),
}

impl ImageSource {
    /// Classify a raw input string without touching the filesystem
    #[must_use]
    pub fn parse(input: &str) -> Self {
        if is_remote_url(input) {
            Self::Remote(input.to_string())
        } else {
            Self::Local(PathBuf::from(input))
        }
    }

    /// Classify an input string and check that a local path is a readable file
    ///
    /// # Errors
    /// - `NotFound` if a local path does not exist, is not a file, or cannot be opened
    pub fn resolve(input: &str) -> Result<Self> {
        let source = Self::parse(input);
        source.validate()?;
        Ok(source)
    }

    /// Check that a local source exists and is readable; URLs are not checked
    ///
    /// # Errors
    /// - `NotFound` for missing or unreadable local files
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Local(path) => {
                if !path.is_file() {
                    return Err(BgRemovalError::not_found(path));
                }
                std::fs::File::open(path).map_err(|e| {
                    BgRemovalError::NotFound(format!(
                        "'{}' is not readable: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(())
            },
            Self::Remote(_) => Ok(()),
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// File stem used to name the output (`photo` for `a/b/photo.jpg`)
    ///
    /// For URLs this is the stem of the last path segment, ignoring query and
    /// fragment. Returns `None` when no usable name exists.
    #[must_use]
    pub fn stem(&self) -> Option<String> {
        match self {
            Self::Local(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .filter(|s| !s.is_empty()),
            Self::Remote(url) => url_file_name(url).and_then(|name| {
                Path::new(&name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .filter(|s| !s.is_empty())
            }),
        }
    }

    /// File name announced to the storage endpoint on upload
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_name()
                .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().to_string()),
            Self::Remote(url) => url_file_name(url).unwrap_or_else(|| "image".to_string()),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

/// `true` for `http://` and `https://` inputs (scheme compared case-insensitively)
#[must_use]
pub fn is_remote_url(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// MIME type announced when uploading a local file
///
/// `.png` maps to `image/png`; every other extension is sent as `image/jpeg`.
#[must_use]
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if is_png {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// Check if file is a supported image based on extension
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Last non-empty path segment of a URL, without query string or fragment
fn url_file_name(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_mime_type_selection() {
        assert_eq!(mime_type_for_path(Path::new("a.png")), "image/png");
        assert_eq!(mime_type_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("a.webp")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("no_extension")), "image/jpeg");
    }

    #[test]
    fn test_parse_classifies_urls() {
        assert!(ImageSource::parse("https://example.com/cat.jpg").is_remote());
        assert!(ImageSource::parse("HTTP://example.com/cat.jpg").is_remote());
        assert!(!ImageSource::parse("photos/cat.jpg").is_remote());
        assert!(!ImageSource::parse("ftp://example.com/cat.jpg").is_remote());
    }

    #[test]
    fn test_resolve_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.jpg");
        let err = ImageSource::resolve(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, BgRemovalError::NotFound(_)));
    }

    #[test]
    fn test_resolve_directory_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = ImageSource::resolve(temp_dir.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, BgRemovalError::NotFound(_)));
    }

    #[test]
    fn test_resolve_existing_file_and_url() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("photo.jpg");
        fs::write(&file, b"jpeg").unwrap();

        let source = ImageSource::resolve(file.to_str().unwrap()).unwrap();
        assert_eq!(source, ImageSource::Local(file));

        // URLs are never checked locally
        let source = ImageSource::resolve("https://does-not-exist.invalid/x.png").unwrap();
        assert!(source.is_remote());
    }

    #[test]
    fn test_stem_and_file_name() {
        let local = ImageSource::parse("a/b/photo.jpg");
        assert_eq!(local.stem().as_deref(), Some("photo"));
        assert_eq!(local.file_name(), "photo.jpg");

        let remote = ImageSource::parse("https://cdn.example.com/img/cat.webp?size=large#top");
        assert_eq!(remote.stem().as_deref(), Some("cat"));
        assert_eq!(remote.file_name(), "cat.webp");

        let bare = ImageSource::parse("https://cdn.example.com/");
        assert_eq!(bare.stem(), None);
        assert_eq!(bare.file_name(), "image");
    }

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("a.jpg")));
        assert!(is_supported_image(Path::new("a.JPEG")));
        assert!(is_supported_image(Path::new("a.webp")));
        assert!(is_supported_image(Path::new("a.png")));
        assert!(!is_supported_image(Path::new("a.gif")));
        assert!(!is_supported_image(Path::new("a")));
    }
}
