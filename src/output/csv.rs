//! CSV output formatting
//!
//! One header row, then one row per run. Sweeps produce one row per worker
//! count, which is the shape most plotting tools want for scaling curves.

use crate::stats::Estimate;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column names, in row order
pub const CSV_HEADER: &str = "timestamp,workers,intervals,summation,pi,abs_error,max_runtime_secs";

/// CSV writer for run results
pub struct CsvWriter<W: Write> {
    out: W,
}

impl CsvWriter<BufWriter<File>> {
    /// Create the file and write the header row
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV output: {}", path.display()))?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvWriter<W> {
    /// Wrap a writer and write the header row
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "{}", CSV_HEADER)?;
        Ok(Self { out })
    }

    /// Append one run
    pub fn append(&mut self, estimate: &Estimate, timestamp: DateTime<Utc>) -> Result<()> {
        writeln!(
            self.out,
            "{},{},{},{},{:.17},{:e},{:.9}",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            estimate.workers,
            estimate.intervals,
            estimate.summation,
            estimate.pi,
            estimate.abs_error,
            estimate.max_runtime_secs
        )?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Write a complete CSV file for a set of timestamped runs
pub fn write_csv_output(path: &Path, runs: &[(DateTime<Utc>, Estimate)]) -> Result<()> {
    let mut writer = CsvWriter::create(path)?;
    for (timestamp, estimate) in runs {
        writer.append(estimate, *timestamp)?;
    }
    writer.finish()?;
    Ok(())
}
