//! Trend fitting over spatially averaged series.
//!
//! [`TrendEngine`] pulls a variable from the model, collapses it to a 1-D
//! series by spatial averaging (optionally restricted to a year range and
//! region first) and fits one of:
//! - Linear least squares (slope, intercept, r-squared, p-value, standard
//!   error of the slope)
//! - Degree-2 polynomial least squares (coefficient vector + equation
//!   string), solved via SVD over a Vandermonde design
//! - Theil-Sen (median of pairwise slopes, resistant to outliers)
//! - Mann-Kendall rank test (tau, p-value, direction label)
//!
//! Each fit is written through to the engine's [`AnalysisCache`] under
//! `"<variable>:<method>"`.

use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use tracing::debug;

use crate::cache::AnalysisCache;
use crate::error::{AnalysisError, Result};
use crate::grid::RegionBounds;
use crate::iter_maybe_parallel;
use crate::model::ClimateModel;

/// Closed set of fitting methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMethod {
    Linear,
    Polynomial,
    Robust,
    Nonparametric,
}

impl TrendMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendMethod::Linear => "linear",
            TrendMethod::Polynomial => "polynomial",
            TrendMethod::Robust => "robust",
            TrendMethod::Nonparametric => "nonparametric",
        }
    }

    /// Minimum series length the method can fit.
    fn min_points(&self) -> usize {
        match self {
            TrendMethod::Polynomial => 3,
            _ => 2,
        }
    }
}

impl FromStr for TrendMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(TrendMethod::Linear),
            "polynomial" => Ok(TrendMethod::Polynomial),
            "robust" => Ok(TrendMethod::Robust),
            "nonparametric" => Ok(TrendMethod::Nonparametric),
            other => Err(AnalysisError::UnknownMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for TrendMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinary least-squares fit against the integer time index.
#[derive(Debug, Clone, Serialize)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub std_error: f64,
}

/// Degree-2 least-squares fit.
#[derive(Debug, Clone, Serialize)]
pub struct PolynomialTrend {
    /// Coefficients, highest degree first.
    pub coefficients: Vec<f64>,
    /// Human-readable fitted equation.
    pub equation: String,
}

/// Theil-Sen fit: median of pairwise slopes.
#[derive(Debug, Clone, Serialize)]
pub struct RobustTrend {
    pub slope: f64,
    pub intercept: f64,
    /// Fitted value at every time index.
    pub fitted: Vec<f64>,
}

/// Mann-Kendall rank test.
#[derive(Debug, Clone, Serialize)]
pub struct NonparametricTrend {
    pub tau: f64,
    pub p_value: f64,
    /// `"increasing"`, `"decreasing"` or `"no trend"`.
    pub direction: String,
}

/// Result of a trend fit; shape depends on the method.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TrendFit {
    Linear(LinearTrend),
    Polynomial(PolynomialTrend),
    Robust(RobustTrend),
    Nonparametric(NonparametricTrend),
}

impl TrendFit {
    pub fn as_linear(&self) -> Option<&LinearTrend> {
        match self {
            TrendFit::Linear(fit) => Some(fit),
            _ => None,
        }
    }

    pub fn as_polynomial(&self) -> Option<&PolynomialTrend> {
        match self {
            TrendFit::Polynomial(fit) => Some(fit),
            _ => None,
        }
    }

    pub fn as_robust(&self) -> Option<&RobustTrend> {
        match self {
            TrendFit::Robust(fit) => Some(fit),
            _ => None,
        }
    }

    pub fn as_nonparametric(&self) -> Option<&NonparametricTrend> {
        match self {
            TrendFit::Nonparametric(fit) => Some(fit),
            _ => None,
        }
    }
}

/// Fits trends to model variables, caching each result.
pub struct TrendEngine<'m, M> {
    model: &'m M,
    cache: AnalysisCache,
}

impl<'m, M: ClimateModel> TrendEngine<'m, M> {
    pub fn new(model: &'m M) -> Self {
        Self {
            model,
            cache: AnalysisCache::new(),
        }
    }

    /// The cache written by [`fit`](Self::fit).
    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut AnalysisCache {
        &mut self.cache
    }

    /// Fetch, spatially average and fit one variable.
    ///
    /// The fitted result is also written to the cache under
    /// `"<variable>:<method>"` together with its field names and a
    /// timestamp.
    pub fn fit(
        &mut self,
        variable: &str,
        years: Option<(i32, i32)>,
        method: TrendMethod,
        region: Option<&RegionBounds>,
    ) -> Result<TrendFit> {
        let grid = self.model.get_variable_data(variable, years)?;
        let grid = match region {
            Some(bounds) => grid.subset_region(bounds),
            None => grid,
        };
        let series = grid.spatial_mean_series();
        debug!(
            variable,
            method = %method,
            points = series.len(),
            "fitting trend"
        );

        let fit = fit_series(&series, method)?;
        let payload = serde_json::to_value(&fit).unwrap_or(serde_json::Value::Null);
        self.cache.insert(format!("{}:{}", variable, method), payload);
        Ok(fit)
    }
}

/// Fit an already-extracted series with the given method.
pub fn fit_series(series: &[f64], method: TrendMethod) -> Result<TrendFit> {
    let required = method.min_points();
    if series.len() < required {
        return Err(AnalysisError::InsufficientData {
            required,
            actual: series.len(),
        });
    }
    match method {
        TrendMethod::Linear => Ok(TrendFit::Linear(linear_trend(series))),
        TrendMethod::Polynomial => Ok(TrendFit::Polynomial(polynomial_trend(series))),
        TrendMethod::Robust => Ok(TrendFit::Robust(theil_sen_trend(series))),
        TrendMethod::Nonparametric => Ok(TrendFit::Nonparametric(mann_kendall_trend(series))),
    }
}

/// Ordinary least squares against the index 0..n-1.
///
/// The p-value is a two-sided t-test on the slope with n-2 degrees of
/// freedom; a numerically perfect fit reports p = 0.
pub fn linear_trend(series: &[f64]) -> LinearTrend {
    let n = series.len();
    if n < 2 {
        return LinearTrend {
            slope: 0.0,
            intercept: series.first().copied().unwrap_or(0.0),
            r_squared: 0.0,
            p_value: 1.0,
            std_error: 0.0,
        };
    }
    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y: f64 = series.iter().sum::<f64>() / nf;

    let mut ss_x = 0.0;
    let mut sp = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let dx = i as f64 - mean_x;
        ss_x += dx * dx;
        sp += dx * (y - mean_y);
    }
    let slope = sp / ss_x;
    let intercept = mean_y - slope * mean_x;

    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let fitted = intercept + slope * i as f64;
        ss_tot += (y - mean_y).powi(2);
        ss_res += (y - fitted).powi(2);
    }
    let r_squared = if ss_tot > 1e-15 {
        1.0 - ss_res / ss_tot
    } else {
        1.0
    };

    let dof = n.saturating_sub(2);
    let (std_error, p_value) = if dof == 0 {
        (0.0, if slope.abs() > 1e-15 { 0.0 } else { 1.0 })
    } else {
        let se = (ss_res / dof as f64 / ss_x).sqrt();
        if se < 1e-15 {
            (se, if slope.abs() > 1e-15 { 0.0 } else { 1.0 })
        } else {
            let t = slope / se;
            let dist = StudentsT::new(0.0, 1.0, dof as f64).expect("positive dof");
            (se, 2.0 * (1.0 - dist.cdf(t.abs())))
        }
    };

    LinearTrend {
        slope,
        intercept,
        r_squared,
        p_value,
        std_error,
    }
}

/// Degree-2 least squares via SVD over a Vandermonde design.
pub fn polynomial_trend(series: &[f64]) -> PolynomialTrend {
    const DEGREE: usize = 2;
    let m = series.len();
    let n_coef = DEGREE + 1;

    let mut design = DMatrix::zeros(m, n_coef);
    for j in 0..m {
        let t = j as f64;
        let mut power = 1.0;
        for k in 0..n_coef {
            design[(j, k)] = power;
            power *= t;
        }
    }
    let y = DVector::from_row_slice(series);
    let svd = design.svd(true, true);
    let beta = svd
        .solve(&y, 1e-10)
        .unwrap_or_else(|_| DVector::zeros(n_coef));

    // Constant-first solve order, highest-degree-first result order
    let coefficients: Vec<f64> = beta.iter().rev().cloned().collect();
    let equation = format_quadratic(&coefficients);
    PolynomialTrend {
        coefficients,
        equation,
    }
}

fn format_quadratic(coefficients: &[f64]) -> String {
    let (c2, c1, c0) = (coefficients[0], coefficients[1], coefficients[2]);
    let sign = |v: f64| if v < 0.0 { '-' } else { '+' };
    format!(
        "y = {:.6}*t^2 {} {:.6}*t {} {:.6}",
        c2,
        sign(c1),
        c1.abs(),
        sign(c0),
        c0.abs()
    )
}

/// Theil-Sen estimator: median of all pairwise slopes.
///
/// Intercept is the median of `y[i] - slope * i`, and `fitted` holds the
/// fitted value at every index.
pub fn theil_sen_trend(series: &[f64]) -> RobustTrend {
    let n = series.len();
    if n < 2 {
        return RobustTrend {
            slope: 0.0,
            intercept: series.first().copied().unwrap_or(0.0),
            fitted: series.to_vec(),
        };
    }
    let mut slopes: Vec<f64> = iter_maybe_parallel!(0..n - 1)
        .flat_map(|i| {
            ((i + 1)..n)
                .map(|j| (series[j] - series[i]) / (j - i) as f64)
                .collect::<Vec<_>>()
        })
        .collect();
    let slope = median_in_place(&mut slopes);

    let mut offsets: Vec<f64> = series
        .iter()
        .enumerate()
        .map(|(i, &y)| y - slope * i as f64)
        .collect();
    let intercept = median_in_place(&mut offsets);

    let fitted = (0..n).map(|i| intercept + slope * i as f64).collect();
    RobustTrend {
        slope,
        intercept,
        fitted,
    }
}

fn median_in_place(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let m = values.len();
    if m == 0 {
        return 0.0;
    }
    if m % 2 == 0 {
        (values[m / 2 - 1] + values[m / 2]) / 2.0
    } else {
        values[m / 2]
    }
}

/// Mann-Kendall test of monotonic trend against the index.
///
/// Uses tau-a with the tie-corrected variance and a continuity-corrected
/// normal approximation for the p-value.
pub fn mann_kendall_trend(series: &[f64]) -> NonparametricTrend {
    let n = series.len();
    if n < 2 {
        return NonparametricTrend {
            tau: 0.0,
            p_value: 1.0,
            direction: "no trend".to_string(),
        };
    }
    let mut s = 0i64;
    for i in 0..n - 1 {
        for j in (i + 1)..n {
            let diff = series[j] - series[i];
            if diff > 0.0 {
                s += 1;
            } else if diff < 0.0 {
                s -= 1;
            }
        }
    }

    let pairs = (n * (n - 1) / 2) as f64;
    let tau = s as f64 / pairs;

    // Tie-corrected variance of S
    let nf = n as f64;
    let mut var = nf * (nf - 1.0) * (2.0 * nf + 5.0) / 18.0;
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && sorted[j] == sorted[i] {
            j += 1;
        }
        let t = (j - i) as f64;
        if t > 1.0 {
            var -= t * (t - 1.0) * (2.0 * t + 5.0) / 18.0;
        }
        i = j;
    }

    let p_value = if var <= 0.0 || s == 0 {
        1.0
    } else {
        let z = if s > 0 {
            (s as f64 - 1.0) / var.sqrt()
        } else {
            (s as f64 + 1.0) / var.sqrt()
        };
        let normal = Normal::new(0.0, 1.0).expect("unit normal is valid");
        2.0 * (1.0 - normal.cdf(z.abs()))
    };

    let direction = if tau > 0.0 {
        "increasing"
    } else if tau < 0.0 {
        "decreasing"
    } else {
        "no trend"
    };

    NonparametricTrend {
        tau,
        p_value,
        direction: direction.to_string(),
    }
}
