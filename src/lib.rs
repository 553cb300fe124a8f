//! piquad - parallel midpoint-rule estimation of pi
//!
//! piquad integrates 4/(1+x²) over [0, 1] with the midpoint rule, splitting
//! the intervals across W workers by striding and combining the partial
//! results with a sum reduction, plus a max reduction of the runtimes.
//!
//! # Architecture
//!
//! - **Estimator**: pure per-rank computation over the `Collective` trait
//! - **Summation**: naive, Neumaier, or correctly rounded local sums
//! - **Runtimes**: worker threads over channels, or worker processes over a localhost hub
//! - **Output**: aligned text line or table, JSON, CSV

pub mod collective;
pub mod config;
pub mod coordinator;
pub mod integrate;
pub mod output;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use collective::{Collective, ReduceOp};
pub use config::Config;
pub use integrate::{estimate, EstimateParams};
pub use stats::Estimate;
pub use worker::Worker;

/// Result type used throughout piquad
pub type Result<T> = anyhow::Result<T>;
