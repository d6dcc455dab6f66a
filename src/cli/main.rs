//! Background Removal CLI Tool
//!
//! Command-line interface for removing backgrounds from images through the
//! hosted BiRefNet v2 model.

use super::config::CliConfigBuilder;
use super::progress::CliProgressReporter;
use crate::{
    input::{is_remote_url, is_supported_image, ImageSource},
    models::{BiRefNetModel, OperatingResolution},
    processor::BackgroundRemovalProcessor,
    services::ImageIOService,
    tracing_config::{events, init_cli_tracing, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Remove image backgrounds with BiRefNet v2 on FAL.ai
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "fal-bgremove")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files, directories or http(s) URLs
    #[arg(value_name = "INPUT", required_unless_present = "list_models")]
    pub input: Vec<String>,

    /// Output file (single input) or directory (batch processing)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Model preset: exact name or alias (light, heavy, portrait, matting)
    #[arg(short, long, default_value = "General Use (Light)")]
    pub model: String,

    /// Operating resolution (1024x1024 or 2048x2048)
    #[arg(long, default_value = "1024x1024")]
    pub resolution: String,

    /// Ask the model for higher-fidelity foreground edges
    #[arg(long)]
    pub refine_foreground: bool,

    /// Suffix appended to the input name for the output file
    #[arg(long, default_value = crate::config::DEFAULT_OUTPUT_SUFFIX)]
    pub suffix: String,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for batch processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Number of images processed at the same time
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Delay between job status polls in milliseconds
    #[arg(long, default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Timeout for each HTTP request in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Give up on a job after this many seconds (the job is cancelled)
    #[arg(long)]
    pub job_timeout: Option<u64>,

    /// Do not stream remote job logs
    #[arg(long)]
    pub no_logs: bool,

    /// List the available models and resolutions and exit
    #[arg(long)]
    pub list_models: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    if cli.list_models {
        list_models();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;

    // Credential first: nothing touches the network without it
    let fal_config = CliConfigBuilder::fal_config(&cli)?;
    let removal_config = CliConfigBuilder::removal_config(&cli)?;

    let (inputs, batch_mode) = collect_inputs(&cli.input, cli.recursive, cli.pattern.as_deref())?;
    if inputs.is_empty() {
        warn!("No supported images found in the provided inputs");
        return Ok(());
    }

    info!("Model: {}", removal_config.model);
    info!("Operating resolution: {}", removal_config.operating_resolution);

    let reporter = Arc::new(CliProgressReporter::new(cli.verbose > 0, inputs.len()));
    let processor = BackgroundRemovalProcessor::with_fal(fal_config, removal_config)
        .context("Failed to create background removal processor")?
        .with_progress_reporter(reporter.clone())
        .with_concurrency(cli.jobs);

    let start_time = Instant::now();
    if batch_mode {
        process_batch(&cli, &processor, &inputs, &reporter).await?;
    } else {
        process_single(&cli, &processor, &inputs[0]).await?;
    }

    info!("Finished in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

async fn process_single(
    cli: &Cli,
    processor: &BackgroundRemovalProcessor,
    input: &str,
) -> Result<()> {
    // An existing directory given as -o receives the derived file name
    let output = match &cli.output {
        Some(dir) if dir.is_dir() => Some(ImageIOService::derive_output_path(
            &ImageSource::parse(input),
            Some(dir),
            &processor.config().output_suffix,
            processor.config().output_format,
        )),
        other => other.clone(),
    };

    let processed = processor
        .process(input, output.as_deref())
        .await
        .with_context(|| format!("Failed to process {}", input))?;

    println!("{}", processed.output_path.display());
    Ok(())
}

async fn process_batch(
    cli: &Cli,
    processor: &BackgroundRemovalProcessor,
    inputs: &[String],
    reporter: &CliProgressReporter,
) -> Result<()> {
    let output_dir = match &cli.output {
        Some(dir) if dir.is_file() => anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            dir.display()
        ),
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            Some(dir.as_path())
        },
        None => None,
    };

    events::progress(&format!("Found {} image(s) to process", inputs.len()), "🔍");
    let report = processor.process_batch(inputs, output_dir).await;

    reporter.finish(format!(
        "{} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    ));

    for processed in &report.succeeded {
        println!("{}", processed.output_path.display());
    }
    for (input, error) in &report.failed {
        events::error_with_context(error, &format!("{} ({})", input, error.kind()));
    }

    info!(
        "Batch complete: {} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );

    if report.all_failed() {
        anyhow::bail!("All {} input(s) failed", report.total());
    }
    Ok(())
}

fn list_models() {
    println!("Models:");
    for model in BiRefNetModel::ALL {
        println!(
            "  {:<22} alias: {:<9} {}",
            model.api_name(),
            model.alias(),
            model.description()
        );
    }
    println!("Operating resolutions:");
    for resolution in OperatingResolution::ALL {
        println!("  {}", resolution.api_name());
    }
}

/// Expand the raw inputs into the list of images to process
///
/// URLs and file paths are kept in the order given; directories expand to
/// their sorted image files. Paths that do not exist are kept so they fail
/// with `NotFound` in the pipeline. The flag is `true` when the run is a
/// batch (more than one input or any directory).
fn collect_inputs(
    inputs: &[String],
    recursive: bool,
    pattern: Option<&str>,
) -> Result<(Vec<String>, bool)> {
    let mut collected = Vec::new();
    let mut saw_directory = false;

    for input in inputs {
        if is_remote_url(input) {
            collected.push(input.clone());
            continue;
        }

        let path = PathBuf::from(input);
        if path.is_dir() {
            saw_directory = true;
            let mut files = find_image_files(&path, recursive, pattern)?;
            files.sort();
            collected.extend(files.into_iter().map(|p| p.to_string_lossy().to_string()));
        } else {
            if path.is_file() && !is_supported_image(&path) {
                warn!(
                    "{} does not look like a supported image; sending it anyway",
                    path.display()
                );
            }
            collected.push(input.clone());
        }
    }

    let batch_mode = saw_directory || collected.len() > 1;
    Ok((collected, batch_mode))
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if is_supported_image(path) && matches_pattern(path, pattern) {
                    files.push(path.to_path_buf());
                }
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if is_supported_image(&path) && matches_pattern(&path, pattern) {
                    files.push(path);
                }
            }
        }
    }

    Ok(files)
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => {
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            } else {
                false
            }
        },
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_collect_directory_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("b.png"));
        touch(&temp_dir.path().join("a.jpg"));
        touch(&temp_dir.path().join("notes.txt"));
        touch(&temp_dir.path().join("sub/c.webp"));

        let dir = temp_dir.path().to_string_lossy().to_string();
        let (inputs, batch) = collect_inputs(&[dir.clone()], false, None).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| Path::new(p).file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
        assert!(batch);

        let (inputs, _) = collect_inputs(&[dir], true, None).unwrap();
        assert_eq!(inputs.len(), 3);
    }

    #[test]
    fn test_collect_with_pattern() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("a.jpg"));
        touch(&temp_dir.path().join("b.png"));

        let dir = temp_dir.path().to_string_lossy().to_string();
        let (inputs, _) = collect_inputs(&[dir], false, Some("*.png")).unwrap();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].ends_with("b.png"));
    }

    #[test]
    fn test_collect_keeps_urls_and_missing_paths() {
        let inputs = vec![
            "https://example.com/cat.jpg".to_string(),
            "/definitely/missing.jpg".to_string(),
        ];
        let (collected, batch) = collect_inputs(&inputs, false, None).unwrap();
        assert_eq!(collected, inputs);
        assert!(batch);

        let (collected, batch) = collect_inputs(&inputs[..1], false, None).unwrap();
        assert_eq!(collected.len(), 1);
        assert!(!batch);
    }

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern(Path::new("dir/a.jpg"), None));
        assert!(matches_pattern(Path::new("dir/a.jpg"), Some("*.jpg")));
        assert!(!matches_pattern(Path::new("dir/a.jpg"), Some("*.png")));
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "fal-bgremove",
            "a.jpg",
            "b.jpg",
            "-o",
            "out",
            "-j",
            "4",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.input, vec!["a.jpg", "b.jpg"]);
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        assert_eq!(cli.jobs, 4);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.suffix, "-nobg");

        assert!(Cli::try_parse_from(["fal-bgremove"]).is_err());
        assert!(Cli::try_parse_from(["fal-bgremove", "--list-models"]).is_ok());
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::try_parse_from(["fal-bgremove", "a.jpg"]).unwrap();
        assert_eq!(cli.log_format, CliLogFormat::Console);
        assert_eq!(TracingFormat::from(cli.log_format), TracingFormat::Console);

        let cli =
            Cli::try_parse_from(["fal-bgremove", "a.jpg", "--log-format", "compact"]).unwrap();
        assert_eq!(TracingFormat::from(cli.log_format), TracingFormat::Compact);

        assert!(Cli::try_parse_from(["fal-bgremove", "a.jpg", "--log-format", "xml"]).is_err());
    }

    #[cfg(feature = "tracing-json")]
    #[test]
    fn test_log_format_json() {
        let cli = Cli::try_parse_from(["fal-bgremove", "a.jpg", "--log-format", "json"]).unwrap();
        assert_eq!(TracingFormat::from(cli.log_format), TracingFormat::Json);
    }
}
