//! Floating-point summation strategies
//!
//! The midpoint rule adds up to 10^8 terms per run, so the way partial sums
//! are accumulated is visible in the last digits of the estimate. Three
//! strategies are provided:
//!
//! - **Naive**: plain running addition
//! - **Neumaier**: compensated summation (improved Kahan), O(1) extra state
//! - **Exact**: Shewchuk's non-overlapping partials; the result is the
//!   correctly rounded value of the exact sum, independent of input order
//!
//! # Example
//!
//! ```
//! use piquad::integrate::summation::Summation;
//!
//! let values = [1e100, 1.0, -1e100];
//! assert_eq!(Summation::Naive.sum(values), 0.0);
//! assert_eq!(Summation::Exact.sum(values), 1.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Summation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Summation {
    /// Plain running addition
    Naive,
    /// Neumaier compensated summation
    Neumaier,
    /// Correctly rounded summation over exact partials
    #[default]
    Exact,
}

impl Summation {
    /// Sum a sequence of values with this strategy
    pub fn sum<I>(self, values: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        match self {
            Self::Naive => accumulate(NaiveSum::new(), values),
            Self::Neumaier => accumulate(NeumaierSum::new(), values),
            Self::Exact => accumulate(ExactSum::new(), values),
        }
    }
}

fn accumulate<A, I>(mut acc: A, values: I) -> f64
where
    A: Accumulator,
    I: IntoIterator<Item = f64>,
{
    for v in values {
        acc.add(v);
    }
    acc.total()
}

impl fmt::Display for Summation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Naive => write!(f, "naive"),
            Self::Neumaier => write!(f, "neumaier"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

impl FromStr for Summation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(Self::Naive),
            "neumaier" | "kahan" => Ok(Self::Neumaier),
            "exact" | "fsum" => Ok(Self::Exact),
            other => {
                anyhow::bail!("unknown summation '{}' (expected naive, neumaier or exact)", other)
            }
        }
    }
}

/// Running floating-point accumulator
pub trait Accumulator: Send {
    /// Add one value
    fn add(&mut self, value: f64);

    /// Current total
    fn total(&self) -> f64;
}

/// Plain running sum
#[derive(Debug, Clone, Default)]
pub struct NaiveSum {
    sum: f64,
}

impl NaiveSum {
    pub fn new() -> Self {
        Self { sum: 0.0 }
    }
}

impl Accumulator for NaiveSum {
    #[inline]
    fn add(&mut self, value: f64) {
        self.sum += value;
    }

    fn total(&self) -> f64 {
        self.sum
    }
}

/// Neumaier compensated sum
///
/// Like Kahan summation, but also correct when the incoming term is larger
/// in magnitude than the running sum.
#[derive(Debug, Clone, Default)]
pub struct NeumaierSum {
    sum: f64,
    compensation: f64,
}

impl NeumaierSum {
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            compensation: 0.0,
        }
    }
}

impl Accumulator for NeumaierSum {
    #[inline]
    fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Exact sum over non-overlapping partials (Shewchuk)
///
/// Holds a short list of partials whose exact sum equals the exact sum of
/// every value added so far. `total()` rounds that sum once, with
/// round-half-even applied across the partials.
#[derive(Debug, Clone, Default)]
pub struct ExactSum {
    /// Non-overlapping partials in increasing magnitude
    partials: Vec<f64>,
    /// Sum of non-finite inputs (inf/nan bypass the partials)
    special: f64,
    has_special: bool,
}

impl ExactSum {
    pub fn new() -> Self {
        Self {
            partials: Vec::with_capacity(32),
            special: 0.0,
            has_special: false,
        }
    }
}

impl Accumulator for ExactSum {
    fn add(&mut self, value: f64) {
        if !value.is_finite() {
            self.special += value;
            self.has_special = true;
            return;
        }

        let mut x = value;
        let mut i = 0;
        for j in 0..self.partials.len() {
            let mut y = self.partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                self.partials[i] = lo;
                i += 1;
            }
            x = hi;
        }
        self.partials.truncate(i);
        self.partials.push(x);
    }

    fn total(&self) -> f64 {
        if self.has_special {
            return self.special;
        }

        let p = &self.partials;
        let mut n = p.len();
        if n == 0 {
            return 0.0;
        }

        n -= 1;
        let mut hi = p[n];
        let mut lo = 0.0;
        while n > 0 {
            let x = hi;
            n -= 1;
            let y = p[n];
            hi = x + y;
            let yr = hi - x;
            lo = y - yr;
            if lo != 0.0 {
                break;
            }
        }

        // Half-way case: the remaining partials decide the rounding direction
        if n > 0 && ((lo < 0.0 && p[n - 1] < 0.0) || (lo > 0.0 && p[n - 1] > 0.0)) {
            let y = lo * 2.0;
            let x = hi + y;
            let yr = x - hi;
            if y == yr {
                hi = x;
            }
        }

        hi
    }
}
