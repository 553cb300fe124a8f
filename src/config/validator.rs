//! Configuration validation

use super::*;
use anyhow::Result;
use std::path::Path;

/// Worker counts above this many times the CPU count get a warning
const OVERSUBSCRIBE_FACTOR: usize = 4;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_estimate(&config.estimate)?;
    validate_workers(&config.workers)?;
    validate_output(&config.output)?;

    // Workers beyond N own no intervals; legal, but worth mentioning
    let widest = config.worker_counts().into_iter().max().unwrap_or(0);
    if config.workers.launcher != Launcher::Mpi && widest as u64 > config.estimate.intervals {
        eprintln!(
            "Warning: {} workers for {} intervals, {} workers will have no intervals",
            widest,
            config.estimate.intervals,
            widest as u64 - config.estimate.intervals
        );
    }

    Ok(())
}

/// Validate estimate configuration
pub fn validate_estimate(estimate: &EstimateConfig) -> Result<()> {
    if estimate.intervals == 0 {
        anyhow::bail!("estimate.intervals must be at least 1");
    }

    Ok(())
}

/// Validate workers configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.launcher == Launcher::Mpi {
        if !cfg!(feature = "mpi") {
            anyhow::bail!("workers.launcher = mpi requires a build with the `mpi` feature");
        }
        // The group size comes from mpirun
        if !workers.sweep.is_empty() {
            anyhow::bail!("workers.sweep cannot be used with the mpi launcher");
        }
        return Ok(());
    }

    if workers.sweep.is_empty() {
        validate_worker_count(workers.count, "workers.count")?;
    } else {
        for (i, &count) in workers.sweep.iter().enumerate() {
            validate_worker_count(count, &format!("workers.sweep[{}]", i))?;
        }
    }

    Ok(())
}

fn validate_worker_count(count: usize, field: &str) -> Result<()> {
    if count == 0 {
        anyhow::bail!("{} must be at least 1", field);
    }

    let cpus = num_cpus::get().max(1);
    if count > cpus * OVERSUBSCRIBE_FACTOR {
        eprintln!(
            "Warning: {} = {} is far above the {} available CPUs; timings will be noisy",
            field, count, cpus
        );
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let Some(ref path) = output.json_output {
        validate_output_path(path, "output.json_output")?;
    }
    if let Some(ref path) = output.csv_output {
        validate_output_path(path, "output.csv_output")?;
    }
    if output.json_output.is_some() && output.json_output == output.csv_output {
        anyhow::bail!("output.json_output and output.csv_output must be different files");
    }

    Ok(())
}

fn validate_output_path(path: &Path, field: &str) -> Result<()> {
    if path.is_dir() {
        anyhow::bail!("{} is a directory: {}", field, path.display());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            anyhow::bail!(
                "{} directory does not exist: {}",
                field,
                parent.display()
            );
        }
    }

    Ok(())
}
