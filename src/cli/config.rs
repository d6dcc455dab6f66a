//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{FalConfig, RemovalConfig},
    models::{BiRefNetModel, OperatingResolution},
};
use anyhow::{Context, Result};
use std::time::Duration;

/// Convert CLI arguments into the library configuration values
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Validate argument combinations clap cannot express
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.jobs == 0 {
            anyhow::bail!("--jobs must be at least 1");
        }
        if cli.poll_interval_ms == 0 {
            anyhow::bail!("--poll-interval-ms must be greater than 0");
        }
        if cli.timeout == 0 {
            anyhow::bail!("--timeout must be greater than 0");
        }
        if cli.job_timeout == Some(0) {
            anyhow::bail!("--job-timeout must be greater than 0");
        }
        Ok(())
    }

    /// Build the connection settings, reading `FAL_KEY` from the environment
    pub(crate) fn fal_config(cli: &Cli) -> Result<FalConfig> {
        Self::fal_config_with_lookup(cli, |name| std::env::var(name).ok())
    }

    /// Build the connection settings with an explicit variable lookup
    pub(crate) fn fal_config_with_lookup<F>(cli: &Cli, lookup: F) -> Result<FalConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = FalConfig::from_lookup(lookup)?;

        let config = FalConfig::builder()
            .api_key(base.api_key)
            .poll_interval(Duration::from_millis(cli.poll_interval_ms))
            .request_timeout(Duration::from_secs(cli.timeout))
            .job_timeout(cli.job_timeout.map(Duration::from_secs))
            .stream_logs(!cli.no_logs)
            .build()
            .context("Invalid connection settings")?;

        Ok(config)
    }

    /// Build the removal settings from model, resolution and naming flags
    pub(crate) fn removal_config(cli: &Cli) -> Result<RemovalConfig> {
        let model: BiRefNetModel = cli.model.parse()?;
        let resolution: OperatingResolution = cli.resolution.parse()?;

        let config = RemovalConfig::builder()
            .model(model)
            .operating_resolution(resolution)
            .refine_foreground(cli.refine_foreground)
            .output_suffix(cli.suffix.clone())
            .build()
            .context("Invalid removal settings")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BgRemovalError;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["fal-bgremove"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_missing_key_is_missing_credential() {
        let cli = parse(&["in.jpg"]);
        let err = CliConfigBuilder::fal_config_with_lookup(&cli, |_| None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BgRemovalError>(),
            Some(BgRemovalError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_fal_config_from_flags() {
        let cli = parse(&[
            "in.jpg",
            "--poll-interval-ms",
            "250",
            "--timeout",
            "30",
            "--job-timeout",
            "120",
            "--no-logs",
        ]);
        let config =
            CliConfigBuilder::fal_config_with_lookup(&cli, |_| Some("secret".to_string())).unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.job_timeout, Some(Duration::from_secs(120)));
        assert!(!config.stream_logs);
    }

    #[test]
    fn test_removal_config_from_flags() {
        let cli = parse(&[
            "in.jpg",
            "-m",
            "Matting",
            "--resolution",
            "2048x2048",
            "--refine-foreground",
            "--suffix",
            "_cut",
        ]);
        let config = CliConfigBuilder::removal_config(&cli).unwrap();

        assert_eq!(config.model, BiRefNetModel::Matting);
        assert_eq!(config.operating_resolution, OperatingResolution::R2048);
        assert!(config.refine_foreground);
        assert_eq!(config.output_suffix, "_cut");
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["in.jpg"]);
        let config = CliConfigBuilder::removal_config(&cli).unwrap();
        assert_eq!(config, RemovalConfig::default());
        assert!(CliConfigBuilder::validate_cli(&cli).is_ok());
    }

    #[test]
    fn test_unknown_model_is_model_error() {
        let cli = parse(&["in.jpg", "-m", "Landscape"]);
        let err = CliConfigBuilder::removal_config(&cli).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BgRemovalError>(),
            Some(BgRemovalError::Model(_))
        ));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let cli = parse(&["in.jpg", "-j", "0"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());
    }
}
