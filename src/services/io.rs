//! File I/O service: reading inputs, naming outputs, writing results
//!
//! This module keeps filesystem concerns out of the pipeline so the
//! processor only deals with bytes and paths.

use crate::{
    error::{BgRemovalError, Result},
    input::ImageSource,
    models::OutputFormat,
};
use std::path::{Path, PathBuf};

/// Name used for URL inputs whose URL carries no usable file name
pub const FALLBACK_STEM: &str = "output";

/// Service for input reading and result writing
pub struct ImageIOService;

impl ImageIOService {
    /// Read a local input file into memory
    ///
    /// # Errors
    /// - `NotFound` if the file is missing
    /// - `Io` for any other read failure
    pub async fn read_input<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        tokio::fs::read(path_ref).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BgRemovalError::not_found(path_ref)
            } else {
                BgRemovalError::file_io_error("read input file", path_ref, &e)
            }
        })
    }

    /// Write result bytes, replacing any existing file
    ///
    /// Parent directories are created as needed. The write is not atomic.
    ///
    /// # Errors
    /// - `Write` if the directory cannot be created or the file cannot be written
    pub async fn write_output<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BgRemovalError::write_error("create output directory", parent, &e)
            })?;
        }

        tokio::fs::write(path_ref, bytes)
            .await
            .map_err(|e| BgRemovalError::write_error("write output file", path_ref, &e))?;

        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }

    /// Output file name for a source: `<stem><suffix>.<ext>`
    #[must_use]
    pub fn output_file_name(source: &ImageSource, suffix: &str, format: OutputFormat) -> String {
        let stem = source.stem().unwrap_or_else(|| FALLBACK_STEM.to_string());
        format!("{}{}.{}", stem, suffix, format.extension())
    }

    /// Derive the output path for a source
    ///
    /// - local input, no directory: sibling of the input (`a/b/photo.jpg` → `a/b/photo-nobg.png`)
    /// - URL input, no directory: current directory
    /// - any input with `output_dir`: inside that directory
    #[must_use]
    pub fn derive_output_path(
        source: &ImageSource,
        output_dir: Option<&Path>,
        suffix: &str,
        format: OutputFormat,
    ) -> PathBuf {
        let file_name = Self::output_file_name(source, suffix, format);
        match (output_dir, source) {
            (Some(dir), _) => dir.join(file_name),
            (None, ImageSource::Local(path)) => path
                .parent()
                .map_or_else(|| PathBuf::from(&file_name), |dir| dir.join(&file_name)),
            (None, ImageSource::Remote(_)) => PathBuf::from(file_name),
        }
    }
}
