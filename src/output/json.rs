//! JSON output formatting
//!
//! Each run is reported as a `JsonRun`. On stdout (`--format json`) every
//! run is one compact JSON object per line; `--json-output` writes all runs
//! of an invocation to one pretty-printed report with host and time info.

use crate::config::Config;
use crate::stats::Estimate;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One estimation run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRun {
    pub workers: usize,
    pub intervals: u64,
    pub summation: String,
    pub pi: f64,
    pub abs_error: f64,
    pub max_runtime_secs: f64,
}

impl From<&Estimate> for JsonRun {
    fn from(estimate: &Estimate) -> Self {
        Self {
            workers: estimate.workers,
            intervals: estimate.intervals,
            summation: estimate.summation.to_string(),
            pi: estimate.pi,
            abs_error: estimate.abs_error,
            max_runtime_secs: estimate.max_runtime_secs,
        }
    }
}

/// Run settings recorded in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub launcher: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub run_info: JsonRunInfo,
    pub runs: Vec<JsonRun>,
}

impl JsonReport {
    pub fn new(config: &Config, started_at: DateTime<Utc>, estimates: &[Estimate]) -> Self {
        Self {
            run_info: JsonRunInfo {
                hostname: local_hostname(),
                launcher: config.workers.launcher.to_string(),
                started_at,
                finished_at: Utc::now(),
            },
            runs: estimates.iter().map(JsonRun::from).collect(),
        }
    }
}

/// Compact single-line JSON for one run
pub fn format_run(estimate: &Estimate) -> Result<String> {
    serde_json::to_string(&JsonRun::from(estimate)).context("Failed to serialize run")
}

/// Print one run as a JSON line to stdout
pub fn print_run(estimate: &Estimate) -> Result<()> {
    println!("{}", format_run(estimate)?);
    Ok(())
}

/// Write the report to a file
pub fn write_json_output(output_path: &Path, report: &JsonReport) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("Failed to write JSON output: {}", output_path.display()))?;
    writer.flush()?;

    Ok(())
}

fn local_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate::summation::Summation;

    fn estimate(workers: usize) -> Estimate {
        Estimate::new(workers, 10_000, Summation::Exact, 3.1415926544231265, 0.25)
    }

    #[test]
    fn test_format_run() {
        let line = format_run(&estimate(4)).unwrap();
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["workers"], 4);
        assert_eq!(value["intervals"], 10_000);
        assert_eq!(value["summation"], "exact");
        assert!((value["pi"].as_f64().unwrap() - 3.1415926544231265).abs() < 1e-15);
        assert_eq!(value["max_runtime_secs"], 0.25);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        let started = Utc::now();
        let report = JsonReport::new(&Config::default(), started, &[estimate(1), estimate(2)]);
        write_json_output(&path, &report).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: JsonReport = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.runs.len(), 2);
        assert_eq!(parsed.runs[1].workers, 2);
        assert_eq!(parsed.run_info.launcher, "threads");
        assert!(parsed.run_info.finished_at >= started);
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let report = JsonReport::new(&Config::default(), Utc::now(), &[]);
        assert!(write_json_output(Path::new("/nonexistent/dir/out.json"), &report).is_err());
    }
}
