//! Combining backend counts into one estimate and a crowd-level tier.
//!
//! Zeros are treated as "no answer": they never pull the average down. With
//! two or more nonzero counts the estimate is their mean rounded half to even
//! (2.5 → 2, 3.5 → 4); with one it is that count; with none it is 0.

use crate::dispatch::BackendReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discretized crowd level, ordered from emptiest to fullest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CrowdLevel {
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl CrowdLevel {
    /// Classify a people count.
    ///
    /// | count   | level     |
    /// |---------|-----------|
    /// | 0..=10  | Low       |
    /// | 11..=25 | Moderate  |
    /// | 26..=45 | High      |
    /// | 46..    | Very High |
    pub fn classify(count: u32) -> Self {
        match count {
            0..=10 => CrowdLevel::Low,
            11..=25 => CrowdLevel::Moderate,
            26..=45 => CrowdLevel::High,
            _ => CrowdLevel::VeryHigh,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdLevel::Low => "Low",
            CrowdLevel::Moderate => "Moderate",
            CrowdLevel::High => "High",
            CrowdLevel::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final people count for one image plus its tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateEstimate {
    pub count: u32,
    pub level: CrowdLevel,
}

impl AggregateEstimate {
    /// Combine the reports of one dispatch, collapsing unavailable backends
    /// to the sentinel 0.
    pub fn from_reports(reports: &[BackendReport]) -> Self {
        let counts: Vec<u32> = reports.iter().map(|r| r.outcome.count()).collect();
        combine(&counts)
    }
}

impl Default for AggregateEstimate {
    fn default() -> Self {
        Self {
            count: 0,
            level: CrowdLevel::Low,
        }
    }
}

/// Combine backend counts into one estimate.
pub fn combine(results: &[u32]) -> AggregateEstimate {
    let nonzero: Vec<u64> = results
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| u64::from(c))
        .collect();

    let count = match nonzero.as_slice() {
        [] => 0,
        [only] => *only,
        many => round_half_even(many.iter().sum(), many.len() as u64),
    };
    // The mean of u32 values always fits in u32.
    let count = u32::try_from(count).unwrap_or(u32::MAX);

    AggregateEstimate {
        count,
        level: CrowdLevel::classify(count),
    }
}

/// `sum / n` rounded to the nearest integer, ties to even. `n` must be > 0.
fn round_half_even(sum: u64, n: u64) -> u64 {
    let quotient = sum / n;
    let twice_remainder = (sum % n) * 2;
    if twice_remainder > n || (twice_remainder == n && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}
