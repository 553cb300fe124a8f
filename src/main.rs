//! piquad CLI entry point

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use piquad::collective::remote::RemoteComm;
use piquad::config::cli::{Cli, ExecutionMode};
use piquad::config::{toml::load_config, validator::validate_config, Config, Launcher};
use piquad::integrate::EstimateParams;
use piquad::output::{self, csv::write_csv_output, json::JsonReport, json::write_json_output};
use piquad::stats::Estimate;
use piquad::worker::{spawn_workers, Worker};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();
    cli.validate()?;

    // Handle different execution modes
    match cli.mode {
        ExecutionMode::Run => run(cli),
        ExecutionMode::Worker => run_worker(cli),
    }
}

/// Run one estimate per configured worker count
fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    validate_config(&config).context("Configuration validation failed")?;

    if config.runtime.dry_run {
        print_configuration(&config);
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let debug = config.runtime.debug;
    if debug {
        for line in config.to_string().lines() {
            eprintln!("DEBUG: {}", line);
        }
    }

    let params = config.params()?;
    let format = config.output.format;
    let started_at = Utc::now();

    if config.workers.launcher == Launcher::Mpi {
        return run_mpi(&config, params, started_at);
    }

    output::print_preamble(format);

    let mut runs: Vec<(DateTime<Utc>, Estimate)> = Vec::new();
    for workers in config.worker_counts() {
        let estimate = if config.workers.launcher == Launcher::Processes {
            // Rank 0 of the worker processes prints its own line
            piquad::coordinator::launch(&params, workers, format, debug)
                .with_context(|| format!("Run with {} worker processes failed", workers))?
        } else {
            let run = spawn_workers(params, workers, debug)
                .with_context(|| format!("Run with {} worker threads failed", workers))?;
            if debug {
                output::text::print_timings(&run.timings);
            }
            output::print_estimate(&run.estimate, format)?;
            run.estimate
        };
        runs.push((Utc::now(), estimate));
    }

    write_result_files(&config, started_at, &runs)
}

/// Run as one rank of an mpirun job; only the root reports
#[cfg(feature = "mpi")]
fn run_mpi(config: &Config, params: EstimateParams, started_at: DateTime<Utc>) -> Result<()> {
    use piquad::collective::mpi_comm::MpiComm;

    let debug = config.runtime.debug;
    let comm = MpiComm::initialize()?;
    let worker = Worker::new(comm, params, debug);
    if debug {
        eprintln!("DEBUG: MPI rank {} (PID: {})", worker.rank(), std::process::id());
    }

    let outcome = worker.run()?;
    if let Some(estimate) = outcome.estimate {
        let format = config.output.format;
        output::print_preamble(format);
        output::print_estimate(&estimate, format)?;
        write_result_files(config, started_at, &[(Utc::now(), estimate)])?;
    }

    Ok(())
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_config: &Config, _params: EstimateParams, _started_at: DateTime<Utc>) -> Result<()> {
    anyhow::bail!("mpi launcher not available (feature not enabled)")
}

/// Run as one rank of a process launch
fn run_worker(cli: Cli) -> Result<()> {
    let (rank, size, hub) = match (cli.rank, cli.size, cli.hub.as_deref()) {
        (Some(rank), Some(size), Some(hub)) => (rank, size, hub),
        _ => anyhow::bail!("worker mode requires --rank, --size and --hub"),
    };

    let config = load_config(&cli)?;
    let params = config.params()?;
    let debug = config.runtime.debug;

    let comm = RemoteComm::connect(hub, rank, size)
        .with_context(|| format!("Worker {} failed to join hub at {}", rank, hub))?;
    if debug {
        eprintln!("DEBUG: Worker {} joined hub at {} (PID: {})", rank, hub, std::process::id());
    }

    let worker = Worker::new(comm, params, debug);
    let outcome = worker.run()?;

    if let Some(ref estimate) = outcome.estimate {
        output::print_estimate(estimate, config.output.format)?;
    }

    worker
        .into_comm()
        .finish(outcome.estimate)
        .with_context(|| format!("Worker {} failed to close hub session", rank))?;

    Ok(())
}

/// Write JSON and CSV result files, if configured
fn write_result_files(
    config: &Config,
    started_at: DateTime<Utc>,
    runs: &[(DateTime<Utc>, Estimate)],
) -> Result<()> {
    if let Some(ref path) = config.output.json_output {
        let estimates: Vec<Estimate> = runs.iter().map(|(_, e)| e.clone()).collect();
        let report = JsonReport::new(config, started_at, &estimates);
        write_json_output(path, &report)?;
        if config.runtime.debug {
            eprintln!("DEBUG: JSON results written to {}", path.display());
        }
    }

    if let Some(ref path) = config.output.csv_output {
        write_csv_output(path, runs)?;
        if config.runtime.debug {
            eprintln!("DEBUG: CSV results written to {}", path.display());
        }
    }

    Ok(())
}

/// Print configuration summary
fn print_configuration(config: &Config) {
    println!("Configuration:");
    println!("  Intervals: {}", config.estimate.intervals);
    println!("  Summation: {}", config.estimate.summation);
    if config.workers.launcher == Launcher::Mpi {
        println!("  Workers: set by mpirun (mpi)");
    } else {
        let counts: Vec<String> = config.worker_counts().iter().map(|w| w.to_string()).collect();
        println!("  Workers: {} ({})", counts.join(", "), config.workers.launcher);
    }
    println!("  Format: {}", config.output.format);
    if let Some(ref path) = config.output.json_output {
        println!("  JSON output: {}", path.display());
    }
    if let Some(ref path) = config.output.csv_output {
        println!("  CSV output: {}", path.display());
    }
}
