//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::integrate::summation::Summation;
use crate::integrate::{EstimateParams, DEFAULT_INTERVALS};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub estimate: EstimateConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Worker counts to run, in order: the sweep if given, else the single count
    pub fn worker_counts(&self) -> Vec<usize> {
        if self.workers.sweep.is_empty() {
            vec![self.workers.count]
        } else {
            self.workers.sweep.clone()
        }
    }

    /// Estimator parameters for this configuration
    pub fn params(&self) -> Result<EstimateParams> {
        Ok(EstimateParams::new(self.estimate.intervals, self.estimate.summation)?)
    }
}

/// What to integrate and how to sum it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Number of midpoint intervals (N)
    #[serde(default = "default_intervals")]
    pub intervals: u64,
    /// Summation used for each worker's local sum
    #[serde(default)]
    pub summation: Summation,
}

fn default_intervals() -> u64 {
    DEFAULT_INTERVALS
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            intervals: default_intervals(),
            summation: Summation::default(),
        }
    }
}

/// How workers are run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Launcher {
    /// Worker threads in this process
    #[default]
    Threads,
    /// Worker processes connected to a local hub
    Processes,
    /// This process is one rank of an `mpirun` job
    Mpi,
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of workers (W)
    #[serde(default = "default_workers")]
    pub count: usize,
    /// Thread or process workers
    #[serde(default)]
    pub launcher: Launcher,
    /// Worker counts to run one after another (overrides `count`)
    #[serde(default)]
    pub sweep: Vec<usize>,
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_workers(),
            launcher: Launcher::default(),
            sweep: Vec::new(),
        }
    }
}

/// Stdout format for results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One aligned line per run
    #[default]
    Text,
    /// Aligned lines preceded by a column header
    Table,
    /// One JSON object per run
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Stdout format
    #[serde(default)]
    pub format: OutputFormat,
    /// JSON results file
    pub json_output: Option<PathBuf>,
    /// CSV results file
    pub csv_output: Option<PathBuf>,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Dry run mode
    #[serde(default)]
    pub dry_run: bool,
    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Estimate: {}", self.estimate)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Output: {}", self.output)?;
        writeln!(f, "  Runtime: {}", self.runtime)?;
        Ok(())
    }
}

impl fmt::Display for EstimateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intervals={}, summation={}", self.intervals, self.summation)
    }
}

impl fmt::Display for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Launcher::Threads => write!(f, "threads"),
            Launcher::Processes => write!(f, "processes"),
            Launcher::Mpi => write!(f, "mpi"),
        }
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sweep.is_empty() {
            write!(f, "count={}", self.count)?;
        } else {
            write!(
                f,
                "sweep=[{}]",
                self.sweep.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(", ")
            )?;
        }
        write!(f, ", launcher={}", self.launcher)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format={}", self.format)?;
        if let Some(ref path) = self.json_output {
            write!(f, ", json={}", path.display())?;
        }
        if let Some(ref path) = self.csv_output {
            write!(f, ", csv={}", path.display())?;
        }
        Ok(())
    }
}

impl fmt::Display for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dry_run={}, debug={}", self.dry_run, self.debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.estimate.intervals, DEFAULT_INTERVALS);
        assert_eq!(config.estimate.summation, Summation::Exact);
        assert!(config.workers.count >= 1);
        assert_eq!(config.workers.launcher, Launcher::Threads);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(!config.runtime.debug);
    }

    #[test]
    fn test_worker_counts() {
        let mut config = Config::default();
        config.workers.count = 4;
        assert_eq!(config.worker_counts(), vec![4]);

        config.workers.sweep = vec![1, 2, 8];
        assert_eq!(config.worker_counts(), vec![1, 2, 8]);
    }

    #[test]
    fn test_params() {
        let mut config = Config::default();
        config.estimate.intervals = 1000;
        config.estimate.summation = Summation::Naive;
        let params = config.params().unwrap();
        assert_eq!(params.intervals(), 1000);
        assert_eq!(params.summation(), Summation::Naive);

        config.estimate.intervals = 0;
        assert!(config.params().is_err());
    }

    #[test]
    fn test_display() {
        let mut config = Config::default();
        config.workers.count = 2;
        config.workers.launcher = Launcher::Processes;
        let text = config.to_string();
        assert!(text.contains("intervals=100000000"));
        assert!(text.contains("count=2, launcher=processes"));

        config.workers.sweep = vec![1, 4];
        assert!(config.to_string().contains("sweep=[1, 4]"));
    }
}
