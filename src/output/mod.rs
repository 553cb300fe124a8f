//! Result output
//!
//! - `text`: aligned result line, optional table header
//! - `json`: one JSON object per run on stdout, or a report file
//! - `csv`: one row per run

pub mod csv;
pub mod json;
pub mod text;

use crate::config::OutputFormat;
use crate::stats::Estimate;
use crate::Result;

/// Print the stdout preamble for a format (the table header)
pub fn print_preamble(format: OutputFormat) {
    if format == OutputFormat::Table {
        text::print_header();
    }
}

/// Print one run's result to stdout in the given format
pub fn print_estimate(estimate: &Estimate, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text | OutputFormat::Table => text::print_row(estimate),
        OutputFormat::Json => json::print_run(estimate)?,
    }
    Ok(())
}
