//! Human-readable text output

use crate::stats::{Estimate, TimingAggregator};
use crate::util::time::format_duration;

/// Column header for table output
pub fn format_header() -> String {
    format!(
        "{:<4} {:>19} {:<14} {:<12}",
        "W", "pi", "abs_error", "max_time_s"
    )
}

/// One result line: workers, estimate, absolute error, slowest runtime
///
/// # Examples
///
/// ```
/// use piquad::integrate::summation::Summation;
/// use piquad::output::text::format_row;
/// use piquad::stats::Estimate;
///
/// let e = Estimate::new(4, 100_000_000, Summation::Exact, 3.141592653589793, 0.5);
/// assert_eq!(format_row(&e), "4       3.14159265358979 0.000e+00      0.500000    ");
/// ```
pub fn format_row(estimate: &Estimate) -> String {
    format!(
        "{:<4} {:19.14} {:<14} {:<12.6}",
        estimate.workers,
        estimate.pi,
        format_scientific(estimate.abs_error, 3),
        estimate.max_runtime_secs
    )
}

/// Scientific notation with a signed, two-digit exponent (`1.234e-09`)
pub fn format_scientific(value: f64, precision: usize) -> String {
    let plain = format!("{:.*e}", precision, value);
    let Some((mantissa, exponent)) = plain.split_once('e') else {
        return plain;
    };
    match exponent.parse::<i32>() {
        Ok(exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.unsigned_abs())
        }
        Err(_) => plain,
    }
}

/// Print the table header to stdout
pub fn print_header() {
    println!("{}", format_header());
}

/// Print one result line to stdout
pub fn print_row(estimate: &Estimate) {
    println!("{}", format_row(estimate));
}

/// Print per-worker contributions and timings to stderr
pub fn print_timings(timings: &TimingAggregator) {
    eprintln!("DEBUG: {:<6} {:>24} {:>12}", "rank", "local", "elapsed");
    for timing in timings.by_rank() {
        eprintln!(
            "DEBUG: {:<6} {:>24.17e} {:>12}",
            timing.rank,
            timing.local,
            format_duration(timing.elapsed)
        );
    }
    if let Some(slowest) = timings.slowest() {
        eprintln!(
            "DEBUG: {} workers, slowest {}",
            timings.num_workers(),
            format_duration(slowest)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate::summation::Summation;

    #[test]
    fn test_row_layout() {
        let e = Estimate::new(1, 10_000, Summation::Exact, 3.1415926544231265, 0.001234567);
        let row = format_row(&e);

        let fields: Vec<&str> = row.split_whitespace().collect();
        assert_eq!(fields[0], "1");
        assert_eq!(fields[1], "3.14159265442313");
        assert!(fields[2].ends_with("e-10"), "error field: {}", fields[2]);
        assert_eq!(fields[3], "0.001235");

        // Fixed column positions
        assert_eq!(&row[0..5], "1    ");
        assert_eq!(row[5..24].trim_start(), "3.14159265442313");
        assert_eq!(row.len(), 4 + 1 + 19 + 1 + 14 + 1 + 12);
    }

    #[test]
    fn test_error_exponent_has_two_digits() {
        assert_eq!(format_scientific(1.234e-9, 3), "1.234e-09");
        assert_eq!(format_scientific(8.8817841970012523e-16, 3), "8.882e-16");
        assert_eq!(format_scientific(0.0, 3), "0.000e+00");
        assert_eq!(format_scientific(12.5, 3), "1.250e+01");
        assert_eq!(format_scientific(1e-100, 2), "1.00e-100");
        assert_eq!(format_scientific(f64::INFINITY, 3), "inf");

        let e = Estimate::new(2, 10_000, Summation::Exact, 3.1415926544231265, 0.25);
        let row = format_row(&e);
        assert_eq!(&row[25..40], "8.333e-10      ");
    }

    #[test]
    fn test_wide_worker_count() {
        let e = Estimate::new(12345, 100, Summation::Naive, 3.0, 1.0);
        assert!(format_row(&e).starts_with("12345 "));
    }

    #[test]
    fn test_header_aligns_with_rows() {
        let header = format_header();
        let e = Estimate::new(8, 100, Summation::Exact, 3.14, 2.0);
        assert_eq!(header.len(), format_row(&e).len());
        assert!(header.starts_with("W    "));
    }
}
