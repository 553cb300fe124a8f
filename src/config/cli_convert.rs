//! CLI to Config conversion utilities

use crate::config::cli;
use crate::config::{Launcher, OutputFormat};
use crate::integrate::summation::Summation;
use anyhow::{Context, Result};

/// Parse a count string (e.g., "10000", "100M", "1e8", "100_000_000")
///
/// Suffixes are decimal: k = 10^3, m = 10^6, g = 10^9.
pub fn parse_count(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase().replace('_', "");

    if let Some((mantissa, exponent)) = s.split_once('e') {
        let mantissa: u64 = mantissa
            .parse()
            .with_context(|| format!("Invalid count format: {}", s))?;
        let exponent: u32 = exponent
            .parse()
            .with_context(|| format!("Invalid count format: {}", s))?;
        return 10u64
            .checked_pow(exponent)
            .and_then(|p| mantissa.checked_mul(p))
            .with_context(|| format!("Count out of range: {}", s));
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('k') {
        (n, 1_000u64)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 1_000_000)
    } else if let Some(n) = s.strip_suffix('g') {
        (n, 1_000_000_000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid count format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Count out of range: {}", s))
}

/// Parse a comma-separated list of worker counts (e.g., "1,2,4,8")
pub fn parse_worker_list(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .with_context(|| format!("Invalid worker count in list: {}", part))
        })
        .collect()
}

/// Convert CLI SummationArg to Summation
pub fn convert_summation(arg: cli::SummationArg) -> Summation {
    match arg {
        cli::SummationArg::Naive => Summation::Naive,
        cli::SummationArg::Neumaier => Summation::Neumaier,
        cli::SummationArg::Exact => Summation::Exact,
    }
}

/// Convert CLI LauncherArg to Launcher
pub fn convert_launcher(arg: cli::LauncherArg) -> Launcher {
    match arg {
        cli::LauncherArg::Threads => Launcher::Threads,
        cli::LauncherArg::Processes => Launcher::Processes,
        cli::LauncherArg::Mpi => Launcher::Mpi,
    }
}

/// Convert CLI FormatArg to OutputFormat
pub fn convert_format(arg: cli::FormatArg) -> OutputFormat {
    match arg {
        cli::FormatArg::Text => OutputFormat::Text,
        cli::FormatArg::Table => OutputFormat::Table,
        cli::FormatArg::Json => OutputFormat::Json,
    }
}

/// Summation flag as passed on a worker process command line
pub fn summation_flag(summation: Summation) -> &'static str {
    match summation {
        Summation::Naive => "naive",
        Summation::Neumaier => "neumaier",
        Summation::Exact => "exact",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("10000").unwrap(), 10_000);
        assert_eq!(parse_count("100M").unwrap(), 100_000_000);
        assert_eq!(parse_count("5k").unwrap(), 5_000);
        assert_eq!(parse_count("2g").unwrap(), 2_000_000_000);
        assert_eq!(parse_count("1e8").unwrap(), 100_000_000);
        assert_eq!(parse_count("100_000_000").unwrap(), 100_000_000);
        assert_eq!(parse_count(" 42 ").unwrap(), 42);
    }

    #[test]
    fn test_parse_count_invalid() {
        assert!(parse_count("").is_err());
        assert!(parse_count("abc").is_err());
        assert!(parse_count("1.5M").is_err());
        assert!(parse_count("1e30").is_err());
        assert!(parse_count("-5").is_err());
    }

    #[test]
    fn test_parse_worker_list() {
        assert_eq!(parse_worker_list("1,2,4,8").unwrap(), vec![1, 2, 4, 8]);
        assert_eq!(parse_worker_list(" 3 , 5 ,").unwrap(), vec![3, 5]);
        assert!(parse_worker_list("1,two").is_err());
    }

    #[test]
    fn test_summation_flag_parses_back() {
        for s in [Summation::Naive, Summation::Neumaier, Summation::Exact] {
            assert_eq!(summation_flag(s).parse::<Summation>().unwrap(), s);
        }
    }

    #[test]
    fn test_conversions() {
        assert_eq!(convert_summation(cli::SummationArg::Exact), Summation::Exact);
        assert_eq!(convert_launcher(cli::LauncherArg::Processes), Launcher::Processes);
        assert_eq!(convert_launcher(cli::LauncherArg::Mpi), Launcher::Mpi);
        assert_eq!(convert_format(cli::FormatArg::Json), OutputFormat::Json);
    }
}
