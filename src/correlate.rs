//! Cross-variable correlation matrices.
//!
//! Each variable collapses to its spatial-mean series; series are aligned
//! to the shortest length and correlated pairwise. With a positive lag L
//! the entry (i, j) correlates `x_i[t]` against `x_j[t + L]` over the
//! overlapping window, making the matrix directional; at lag 0 the matrix
//! is symmetric with unit diagonal.

use std::str::FromStr;

#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use serde::Serialize;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::iter_maybe_parallel;
use crate::model::ClimateModel;

/// Closed set of correlation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
            CorrelationMethod::Kendall => "kendall",
        }
    }
}

impl FromStr for CorrelationMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            "kendall" => Ok(CorrelationMethod::Kendall),
            other => Err(AnalysisError::UnknownMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Square correlation matrix labeled by variable names.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    variables: Vec<String>,
    /// Row-major entries; `values[i * n + j]` correlates variable i
    /// against variable j (shifted forward when lagged).
    values: Vec<f64>,
}

impl CorrelationMatrix {
    /// Variable names labeling rows and columns.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.variables.len()
    }

    /// Entry for `(row, col)`.
    ///
    /// # Panics
    /// Panics if either index is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.size() && col < self.size());
        self.values[row * self.size() + col]
    }

    /// Entry by variable names, `None` if either is unknown.
    pub fn get_by_name(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.variables.iter().position(|v| v == a)?;
        let j = self.variables.iter().position(|v| v == b)?;
        Some(self.get(i, j))
    }
}

/// Computes correlation matrices across model variables.
pub struct CorrelationEngine<'m, M> {
    model: &'m M,
}

impl<'m, M: ClimateModel> CorrelationEngine<'m, M> {
    pub fn new(model: &'m M) -> Self {
        Self { model }
    }

    /// Correlate the spatial means of `variables` pairwise.
    pub fn correlate(
        &self,
        variables: &[&str],
        method: CorrelationMethod,
        lag: usize,
    ) -> Result<CorrelationMatrix> {
        if variables.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                required: 2,
                actual: variables.len(),
            });
        }
        let mut series = Vec::with_capacity(variables.len());
        for variable in variables {
            let grid = self.model.get_variable_data(variable, None)?;
            series.push(grid.spatial_mean_series());
        }
        debug!(
            count = variables.len(),
            method = %method,
            lag,
            "correlating variables"
        );
        let names: Vec<String> = variables.iter().map(|v| v.to_string()).collect();
        correlation_matrix(names, &series, method, lag)
    }
}

/// Pairwise correlation over already-extracted series.
///
/// Series are truncated to the shortest length before shifting.
pub fn correlation_matrix(
    variables: Vec<String>,
    series: &[Vec<f64>],
    method: CorrelationMethod,
    lag: usize,
) -> Result<CorrelationMatrix> {
    let n = variables.len();
    if n < 2 || series.len() != n {
        return Err(AnalysisError::InsufficientData {
            required: 2,
            actual: series.len().min(n),
        });
    }
    let len = series.iter().map(|s| s.len()).min().unwrap_or(0);
    let overlap = len.saturating_sub(lag);
    if overlap < 2 {
        return Err(AnalysisError::InsufficientData {
            required: 2,
            actual: overlap,
        });
    }

    let mut values = vec![0.0; n * n];
    if lag == 0 {
        // Symmetric: compute the upper triangle, mirror, pin the diagonal
        let upper: Vec<(usize, usize, f64)> = iter_maybe_parallel!(0..n)
            .flat_map(|i| {
                ((i + 1)..n)
                    .map(|j| {
                        let r = correlate_pair(&series[i][..len], &series[j][..len], method);
                        (i, j, r)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        for (i, j, r) in upper {
            values[i * n + j] = r;
            values[j * n + i] = r;
        }
        for i in 0..n {
            values[i * n + i] = 1.0;
        }
    } else {
        // Directional: x_i[t] against x_j[t + lag], all entries
        let entries: Vec<(usize, f64)> = iter_maybe_parallel!(0..n * n)
            .map(|idx| {
                let (i, j) = (idx / n, idx % n);
                let x = &series[i][..overlap];
                let y = &series[j][lag..len];
                (idx, correlate_pair(x, y, method))
            })
            .collect();
        for (idx, r) in entries {
            values[idx] = r;
        }
    }

    Ok(CorrelationMatrix { variables, values })
}

fn correlate_pair(x: &[f64], y: &[f64], method: CorrelationMethod) -> f64 {
    match method {
        CorrelationMethod::Pearson => pearson(x, y),
        CorrelationMethod::Spearman => {
            let rx = average_ranks(x);
            let ry = average_ranks(y);
            pearson(&rx, &ry)
        }
        CorrelationMethod::Kendall => kendall_tau_b(x, y),
    }
}

/// Pearson product-moment correlation; 0 for degenerate variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return 0.0;
    }
    let n = x.len() as f64;
    let mean_x: f64 = x.iter().sum::<f64>() / n;
    let mean_y: f64 = y.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&xv, &yv) in x.iter().zip(y.iter()) {
        let dx = xv - mean_x;
        let dy = yv - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom < 1e-15 {
        0.0
    } else {
        sxy / denom
    }
}

/// Ranks with ties assigned the average of their rank range.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && values[order[j]] == values[order[i]] {
            j += 1;
        }
        // Average 1-based rank across the tie group
        let avg = (i + j + 1) as f64 / 2.0;
        for &k in &order[i..j] {
            ranks[k] = avg;
        }
        i = j;
    }
    ranks
}

/// Kendall tau-b with tie correction; 0 for degenerate denominators.
pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 || y.len() != n {
        return 0.0;
    }
    let mut concordant = 0i64;
    let mut discordant = 0i64;
    for i in 0..n - 1 {
        for j in (i + 1)..n {
            let dx = x[j] - x[i];
            let dy = y[j] - y[i];
            let product = dx * dy;
            if product > 0.0 {
                concordant += 1;
            } else if product < 0.0 {
                discordant += 1;
            }
        }
    }
    let n0 = (n * (n - 1) / 2) as f64;
    let n1 = tie_pair_count(x);
    let n2 = tie_pair_count(y);
    let denom = ((n0 - n1) * (n0 - n2)).sqrt();
    if denom < 1e-15 {
        0.0
    } else {
        (concordant - discordant) as f64 / denom
    }
}

fn tie_pair_count(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let mut pairs = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && sorted[j] == sorted[i] {
            j += 1;
        }
        let t = (j - i) as f64;
        pairs += t * (t - 1.0) / 2.0;
        i = j;
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SyntheticModel;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| 3.0 * v + 1.0).collect();
        let z: Vec<f64> = x.iter().map(|&v| -2.0 * v).collect();
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &z) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_degenerate_variance() {
        let x = vec![1.0; 10];
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert_eq!(pearson(&x, &y), 0.0);
    }

    #[test]
    fn test_spearman_monotone_nonlinear() {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| (v / 3.0).exp()).collect();
        let m = correlation_matrix(
            names(&["x", "y"]),
            &[x, y],
            CorrelationMethod::Spearman,
            0,
        )
        .unwrap();
        assert!((m.get(0, 1) - 1.0).abs() < 1e-12, "rho: {}", m.get(0, 1));
    }

    #[test]
    fn test_kendall_monotone() {
        let x: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| v * v).collect();
        assert!((kendall_tau_b(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_symmetric_unit_diagonal() {
        let model = SyntheticModel::new(13);
        let engine = CorrelationEngine::new(&model);
        let m = engine
            .correlate(
                &["temperature", "precipitation", "humidity"],
                CorrelationMethod::Pearson,
                0,
            )
            .unwrap();
        assert_eq!(m.size(), 3);
        for i in 0..3 {
            assert_eq!(m.get(i, i), 1.0, "diagonal at {}", i);
            for j in 0..3 {
                assert!(
                    (m.get(i, j) - m.get(j, i)).abs() < 1e-12,
                    "symmetry at ({}, {})",
                    i,
                    j
                );
                assert!(m.get(i, j).abs() <= 1.0 + 1e-12);
            }
        }
    }

    #[test]
    fn test_matrix_permutation_invariant() {
        let model = SyntheticModel::new(13);
        let engine = CorrelationEngine::new(&model);
        let ab = engine
            .correlate(&["temperature", "precipitation"], CorrelationMethod::Pearson, 0)
            .unwrap();
        let ba = engine
            .correlate(&["precipitation", "temperature"], CorrelationMethod::Pearson, 0)
            .unwrap();
        let r1 = ab.get_by_name("temperature", "precipitation").unwrap();
        let r2 = ba.get_by_name("temperature", "precipitation").unwrap();
        assert!((r1 - r2).abs() < 1e-12, "{} vs {}", r1, r2);
    }

    #[test]
    fn test_lagged_correlation_detects_shift() {
        // y is x delayed by 2 steps
        let x: Vec<f64> = (0..50).map(|i| ((i * 37) % 17) as f64).collect();
        let mut y = vec![0.0, 0.0];
        y.extend_from_slice(&x[..48]);
        let m = correlation_matrix(
            names(&["x", "y"]),
            &[x, y],
            CorrelationMethod::Pearson,
            2,
        )
        .unwrap();
        // x[t] matches y[t + 2] exactly
        assert!(
            (m.get(0, 1) - 1.0).abs() < 1e-12,
            "forward entry: {}",
            m.get(0, 1)
        );
        // The reverse direction is not perfect
        assert!(m.get(1, 0) < 0.99, "reverse entry: {}", m.get(1, 0));
    }

    #[test]
    fn test_lag_zero_diagonal_not_forced_elsewhere() {
        // At lag > 0 the diagonal is an autocorrelation, not 1
        let x: Vec<f64> = (0..40).map(|i| ((i * 31) % 13) as f64).collect();
        let y: Vec<f64> = (0..40).map(|i| ((i * 7) % 11) as f64).collect();
        let m = correlation_matrix(
            names(&["x", "y"]),
            &[x, y],
            CorrelationMethod::Pearson,
            1,
        )
        .unwrap();
        assert!(m.get(0, 0).abs() < 1.0, "lagged diagonal: {}", m.get(0, 0));
    }

    #[test]
    fn test_too_few_variables() {
        let model = SyntheticModel::new(1);
        let engine = CorrelationEngine::new(&model);
        assert!(matches!(
            engine.correlate(&["temperature"], CorrelationMethod::Pearson, 0),
            Err(AnalysisError::InsufficientData {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_insufficient_overlap() {
        let x = vec![1.0, 2.0, 3.0];
        let y = vec![3.0, 2.0, 1.0];
        assert!(matches!(
            correlation_matrix(names(&["x", "y"]), &[x, y], CorrelationMethod::Pearson, 2),
            Err(AnalysisError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(
            "kendall".parse::<CorrelationMethod>().unwrap(),
            CorrelationMethod::Kendall
        );
        assert!(matches!(
            "cosine".parse::<CorrelationMethod>(),
            Err(AnalysisError::UnknownMethod { .. })
        ));
    }
}
