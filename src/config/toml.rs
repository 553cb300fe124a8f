//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with a base configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Estimate settings
    if let Some(ref intervals) = cli.intervals {
        config.estimate.intervals = cli_convert::parse_count(intervals)
            .context("Invalid interval count")?;
    }
    if let Some(summation) = cli.summation {
        config.estimate.summation = cli_convert::convert_summation(summation);
    }

    // Worker settings; an explicit count replaces a sweep from the file
    if let Some(count) = cli.workers {
        config.workers.count = count;
        config.workers.sweep.clear();
    }
    if let Some(ref sweep) = cli.sweep {
        config.workers.sweep = cli_convert::parse_worker_list(sweep)
            .context("Invalid --sweep list")?;
    }
    if let Some(launcher) = cli.launcher {
        config.workers.launcher = cli_convert::convert_launcher(launcher);
    }

    // Output settings
    if let Some(format) = cli.format {
        config.output.format = cli_convert::convert_format(format);
    }
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if let Some(ref path) = cli.csv_output {
        config.output.csv_output = Some(path.clone());
    }

    // Runtime settings
    if cli.dry_run {
        config.runtime.dry_run = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    Ok(config)
}

/// Build the run configuration: TOML file if given, then CLI overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, base)
}
