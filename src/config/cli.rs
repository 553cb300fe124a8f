//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Run an estimate (default)
    Run,
    /// Worker process spawned by the process launcher (internal)
    Worker,
}

/// piquad - parallel midpoint-rule estimation of pi
#[derive(Parser, Debug)]
#[command(name = "piquad")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: run, or worker (internal)
    #[arg(long, value_enum, default_value = "run")]
    pub mode: ExecutionMode,

    // === Estimate Options ===
    /// Number of midpoint intervals, e.g. 10000, 100M, 1e8 (default: 100M)
    #[arg(short = 'N', long)]
    pub intervals: Option<String>,

    /// Summation used for each worker's local sum
    #[arg(long, value_enum)]
    pub summation: Option<SummationArg>,

    // === Worker Options ===
    /// Number of workers (default: number of CPUs)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Run workers as threads, separate processes, or MPI ranks
    #[arg(long, value_enum)]
    pub launcher: Option<LauncherArg>,

    /// Comma-separated worker counts to run in turn (e.g., "1,2,4,8")
    #[arg(long)]
    pub sweep: Option<String>,

    // === Output Options ===
    /// Stdout format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// JSON results file path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// CSV results file path
    #[arg(long)]
    pub csv_output: Option<PathBuf>,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output (per-rank timings, hub events, etc.)
    #[arg(long)]
    pub debug: bool,

    // === Worker Mode (set by the process launcher) ===
    /// Rank of this worker process
    #[arg(long, hide = true)]
    pub rank: Option<usize>,

    /// Number of worker processes in the group
    #[arg(long, hide = true)]
    pub size: Option<usize>,

    /// Hub address to connect to
    #[arg(long, hide = true)]
    pub hub: Option<String>,
}

/// Summation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummationArg {
    /// Plain running addition
    Naive,
    /// Neumaier compensated summation
    Neumaier,
    /// Correctly rounded summation (fsum)
    Exact,
}

/// Worker launcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LauncherArg {
    /// Worker threads in this process
    Threads,
    /// Separate worker processes
    Processes,
    /// One rank of an mpirun job (requires the `mpi` feature)
    Mpi,
}

/// Stdout format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// One aligned line per run
    Text,
    /// Aligned lines with a header row
    Table,
    /// One JSON object per run
    Json,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mode == ExecutionMode::Worker {
            let (rank, size) = match (self.rank, self.size) {
                (Some(r), Some(s)) => (r, s),
                _ => anyhow::bail!("worker mode requires --rank and --size"),
            };
            if self.hub.is_none() {
                anyhow::bail!("worker mode requires --hub");
            }
            if size == 0 {
                anyhow::bail!("size must be at least 1");
            }
            if rank >= size {
                anyhow::bail!("rank {} is out of range for size {}", rank, size);
            }
            return Ok(());
        }

        if self.rank.is_some() || self.size.is_some() || self.hub.is_some() {
            anyhow::bail!("--rank, --size and --hub are only valid in worker mode");
        }

        if let Some(ref intervals) = self.intervals {
            if super::cli_convert::parse_count(intervals)? == 0 {
                anyhow::bail!("intervals must be at least 1");
            }
        }

        if let Some(0) = self.workers {
            anyhow::bail!("workers must be at least 1");
        }

        if self.workers.is_some() && self.sweep.is_some() {
            anyhow::bail!("can only specify one of --workers or --sweep");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("piquad").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.mode, ExecutionMode::Run);
        assert!(cli.intervals.is_none());
        assert!(cli.workers.is_none());
        assert!(!cli.debug);
        cli.validate().unwrap();
    }

    #[test]
    fn test_parse_run_options() {
        let cli = parse(&[
            "-N", "1000", "-w", "4", "--summation", "neumaier", "--launcher", "processes",
            "--format", "table",
        ]);
        assert_eq!(cli.intervals.as_deref(), Some("1000"));
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.summation, Some(SummationArg::Neumaier));
        assert_eq!(cli.launcher, Some(LauncherArg::Processes));
        assert_eq!(cli.format, Some(FormatArg::Table));
        cli.validate().unwrap();
    }

    #[test]
    fn test_validate_zero_workers() {
        assert!(parse(&["-w", "0"]).validate().is_err());
        assert!(parse(&["-N", "0"]).validate().is_err());
        assert!(parse(&["-N", "lots"]).validate().is_err());
    }

    #[test]
    fn test_validate_workers_and_sweep_conflict() {
        assert!(parse(&["-w", "2", "--sweep", "1,2"]).validate().is_err());
    }

    #[test]
    fn test_validate_worker_mode() {
        let cli = parse(&[
            "--mode", "worker", "--rank", "1", "--size", "4", "--hub", "127.0.0.1:9",
        ]);
        cli.validate().unwrap();

        let cli = parse(&[
            "--mode", "worker", "--rank", "4", "--size", "4", "--hub", "127.0.0.1:9",
        ]);
        assert!(cli.validate().is_err());

        let cli = parse(&["--mode", "worker", "--rank", "0", "--size", "1"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_worker_flags_rejected_in_run_mode() {
        assert!(parse(&["--rank", "0"]).validate().is_err());
    }
}
