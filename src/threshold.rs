//! Threshold specifications and percentile resolution.
//!
//! A threshold is either a literal value or a percentile tag
//! (`percentile_95`). The tagged form is resolved once against the full
//! sample of a variable rather than being inspected ad hoc at each call
//! site.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// A threshold: literal value or percentile of the analyzed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ThresholdSpec {
    /// Use the value directly.
    Literal(f64),
    /// Resolve to the p-th percentile (0..=100) of the sample.
    Percentile(f64),
}

impl ThresholdSpec {
    /// Resolve to a concrete numeric value against `sample`.
    ///
    /// Literal thresholds pass through unchanged. Percentile thresholds
    /// interpolate linearly between order statistics (the same convention
    /// as numpy's default percentile), and require a non-empty sample and
    /// `0 <= p <= 100`.
    pub fn resolve(&self, sample: &[f64]) -> Result<f64> {
        match *self {
            ThresholdSpec::Literal(value) => Ok(value),
            ThresholdSpec::Percentile(p) => {
                if !(0.0..=100.0).contains(&p) || !p.is_finite() {
                    return Err(AnalysisError::InvalidThreshold {
                        spec: format!("percentile_{}", p),
                    });
                }
                percentile(sample, p).ok_or(AnalysisError::InsufficientData {
                    required: 1,
                    actual: 0,
                })
            }
        }
    }
}

impl FromStr for ThresholdSpec {
    type Err = AnalysisError;

    /// Parse `percentile_<p>` or a numeric literal.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(tag) = s.strip_prefix("percentile_") {
            let p: f64 = tag.parse().map_err(|_| AnalysisError::InvalidThreshold {
                spec: s.to_string(),
            })?;
            if !(0.0..=100.0).contains(&p) {
                return Err(AnalysisError::InvalidThreshold {
                    spec: s.to_string(),
                });
            }
            return Ok(ThresholdSpec::Percentile(p));
        }
        s.parse::<f64>()
            .map(ThresholdSpec::Literal)
            .map_err(|_| AnalysisError::InvalidThreshold {
                spec: s.to_string(),
            })
    }
}

impl std::fmt::Display for ThresholdSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdSpec::Literal(v) => write!(f, "{}", v),
            ThresholdSpec::Percentile(p) => write!(f, "percentile_{}", p),
        }
    }
}

/// Linearly interpolated percentile of an unsorted sample.
///
/// Returns `None` for an empty sample. `p` is clamped to `[0, 100]` by
/// callers; rank `p/100 * (n-1)` interpolates between the two bracketing
/// order statistics.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}
