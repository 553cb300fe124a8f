//! Timing utilities
//!
//! Wall-clock measurement of worker runtimes and the human-readable
//! formatting used in debug output.

use std::time::{Duration, Instant};

/// Monotonic start point of a timed region
///
/// Workers take one right after the start barrier; `elapsed()` at the end
/// of local work is the runtime fed into the max reduction.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp(Instant);

impl Timestamp {
    #[inline]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Time since this timestamp was taken
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Unit thresholds for `format_duration`, largest first
const DURATION_UNITS: [(u128, &str); 3] = [
    (1_000_000_000, "s"),
    (1_000_000, "ms"),
    (1_000, "us"),
];

/// Format a duration with the largest unit that keeps it ≥ 1
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use piquad::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_micros(42)), "42.00us");
/// assert_eq!(format_duration(Duration::from_millis(1250)), "1.25s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    DURATION_UNITS
        .iter()
        .find(|(scale, _)| nanos >= *scale)
        .map(|(scale, unit)| format!("{:.2}{}", nanos as f64 / *scale as f64, unit))
        .unwrap_or_else(|| format!("{}ns", nanos))
}

/// Integrand evaluations per second; zero for an empty duration
pub fn sample_rate(samples: u64, duration: Duration) -> f64 {
    match duration.as_secs_f64() {
        secs if secs > 0.0 => samples as f64 / secs,
        _ => 0.0,
    }
}

/// Format a rate with a K/M/G suffix
///
/// # Examples
///
/// ```
/// use piquad::util::time::format_rate;
///
/// assert_eq!(format_rate(12.0), "12");
/// assert_eq!(format_rate(4_200.0), "4.20K");
/// assert_eq!(format_rate(310_000_000.0), "310.00M");
/// ```
pub fn format_rate(rate: f64) -> String {
    const SUFFIXES: [(f64, &str); 3] = [(1e9, "G"), (1e6, "M"), (1e3, "K")];
    SUFFIXES
        .iter()
        .find(|(scale, _)| rate >= *scale)
        .map(|(scale, suffix)| format!("{:.2}{}", rate / scale, suffix))
        .unwrap_or_else(|| format!("{:.0}", rate))
}
