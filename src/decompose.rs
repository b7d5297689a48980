//! Trend / seasonal / residual decomposition.
//!
//! Splits a spatially averaged series into a slow-varying trend (linear
//! fit over the full series), a repeating seasonal cycle (per-position
//! group averages tiled to the series length) and a residual. Additive
//! mode subtracts components, multiplicative mode divides by them. The
//! cycle period defaults to 12 steps and can be estimated from the
//! dominant FFT peak when not supplied.

use std::str::FromStr;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::Serialize;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::model::ClimateModel;
use crate::trend::linear_trend;

/// Fallback cycle length (monthly steps).
const DEFAULT_PERIOD: usize = 12;

/// Denominators below this magnitude yield a zero ratio instead of
/// blowing up the multiplicative residual.
const RATIO_EPS: f64 = 1e-12;

/// One component of a decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Trend,
    Seasonal,
    Residual,
}

/// How components combine to reconstruct the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecompositionMode {
    #[default]
    Additive,
    Multiplicative,
}

impl DecompositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecompositionMode::Additive => "additive",
            DecompositionMode::Multiplicative => "multiplicative",
        }
    }
}

impl FromStr for DecompositionMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "additive" => Ok(DecompositionMode::Additive),
            "multiplicative" => Ok(DecompositionMode::Multiplicative),
            other => Err(AnalysisError::UnknownMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DecompositionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decomposition result carrying only the requested components.
///
/// Omitted components are absent from the serialized result, not null.
#[derive(Debug, Clone, Serialize)]
pub struct Decomposition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasonal: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual: Option<Vec<f64>>,
    /// Cycle length used for the seasonal component.
    pub period: usize,
    /// `"additive"` or `"multiplicative"`.
    pub mode: String,
}

/// Splits model variables into trend, seasonal cycle and residual.
pub struct DecompositionEngine<'m, M> {
    model: &'m M,
}

impl<'m, M: ClimateModel> DecompositionEngine<'m, M> {
    pub fn new(model: &'m M) -> Self {
        Self { model }
    }

    /// Decompose the spatial mean of `variable`.
    ///
    /// `period` is the seasonal cycle length in timesteps; when `None`
    /// the dominant FFT period is used, falling back to 12.
    pub fn decompose(
        &self,
        variable: &str,
        components: &[Component],
        mode: DecompositionMode,
        period: Option<usize>,
    ) -> Result<Decomposition> {
        let grid = self.model.get_variable_data(variable, None)?;
        let series = grid.spatial_mean_series();
        debug!(variable, mode = %mode, points = series.len(), "decomposing");
        decompose_series(&series, components, mode, period)
    }
}

/// Decompose an already-extracted series.
pub fn decompose_series(
    series: &[f64],
    components: &[Component],
    mode: DecompositionMode,
    period: Option<usize>,
) -> Result<Decomposition> {
    let n = series.len();
    if n < 2 {
        return Err(AnalysisError::InsufficientData {
            required: 2,
            actual: n,
        });
    }
    let period = match period {
        Some(0) => {
            return Err(AnalysisError::invalid_parameter(
                "seasonal period must be at least 1",
            ))
        }
        Some(p) => p,
        None => estimate_period(series).unwrap_or(DEFAULT_PERIOD),
    };

    let want_seasonal = components.contains(&Component::Seasonal);
    let want_residual = components.contains(&Component::Residual);
    if (want_seasonal || want_residual) && n < 2 * period {
        return Err(AnalysisError::InsufficientData {
            required: 2 * period,
            actual: n,
        });
    }

    // Trend and seasonal are needed internally whenever the residual is
    // requested, regardless of which components the caller asked for.
    let fit = linear_trend(series);
    let trend: Vec<f64> = (0..n).map(|i| fit.intercept + fit.slope * i as f64).collect();
    let seasonal = seasonal_cycle(series, &trend, period, mode);

    let residual = if want_residual {
        Some(match mode {
            DecompositionMode::Additive => (0..n)
                .map(|i| series[i] - trend[i] - seasonal[i])
                .collect(),
            DecompositionMode::Multiplicative => (0..n)
                .map(|i| {
                    let denom = trend[i] * seasonal[i];
                    if denom.abs() < RATIO_EPS {
                        0.0
                    } else {
                        series[i] / denom
                    }
                })
                .collect(),
        })
    } else {
        None
    };

    Ok(Decomposition {
        trend: components.contains(&Component::Trend).then_some(trend),
        seasonal: want_seasonal.then_some(seasonal),
        residual,
        period,
        mode: mode.as_str().to_string(),
    })
}

/// Per-position group averages of detrended values, tiled to length.
fn seasonal_cycle(
    series: &[f64],
    trend: &[f64],
    period: usize,
    mode: DecompositionMode,
) -> Vec<f64> {
    let n = series.len();
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for i in 0..n {
        let pos = i % period;
        let detrended = match mode {
            DecompositionMode::Additive => series[i] - trend[i],
            DecompositionMode::Multiplicative => {
                if trend[i].abs() < RATIO_EPS {
                    continue;
                }
                series[i] / trend[i]
            }
        };
        sums[pos] += detrended;
        counts[pos] += 1;
    }
    let neutral = match mode {
        DecompositionMode::Additive => 0.0,
        DecompositionMode::Multiplicative => 1.0,
    };
    let cycle: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { neutral })
        .collect();
    (0..n).map(|i| cycle[i % period]).collect()
}

/// Dominant cycle length from the FFT power spectrum.
///
/// Returns `None` for series too short to resolve a cycle (< 8 points)
/// or with no interior spectral peak.
pub fn estimate_period(series: &[f64]) -> Option<usize> {
    let n = series.len();
    if n < 8 {
        return None;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let mut buffer: Vec<Complex<f64>> = series
        .iter()
        .map(|&x| Complex::new(x - mean, 0.0))
        .collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let (best_bin, best_power) = (1..n / 2)
        .map(|k| (k, buffer[k].norm_sqr()))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    if best_power <= 0.0 {
        return None;
    }
    let period = (n as f64 / best_bin as f64).round() as usize;
    Some(period.max(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SyntheticModel;
    use std::f64::consts::PI;

    fn trend_plus_cycle(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                10.0 + 0.05 * t + 3.0 * (2.0 * PI * t / period as f64).sin()
            })
            .collect()
    }

    #[test]
    fn test_additive_reconstruction() {
        let series = trend_plus_cycle(120, 12);
        let result = decompose_series(
            &series,
            &[Component::Trend, Component::Seasonal, Component::Residual],
            DecompositionMode::Additive,
            Some(12),
        )
        .unwrap();
        let trend = result.trend.as_ref().unwrap();
        let seasonal = result.seasonal.as_ref().unwrap();
        let residual = result.residual.as_ref().unwrap();
        for i in 0..series.len() {
            let reconstructed = trend[i] + seasonal[i] + residual[i];
            assert!(
                (reconstructed - series[i]).abs() < 1e-9,
                "reconstruction at {}: {} vs {}",
                i,
                reconstructed,
                series[i]
            );
        }
    }

    #[test]
    fn test_seasonal_cycle_recovered() {
        let series = trend_plus_cycle(240, 12);
        let result = decompose_series(
            &series,
            &[Component::Seasonal],
            DecompositionMode::Additive,
            Some(12),
        )
        .unwrap();
        let seasonal = result.seasonal.as_ref().unwrap();
        // Cycle repeats with the requested period and tracks the sine
        for i in 0..series.len() - 12 {
            assert!(
                (seasonal[i] - seasonal[i + 12]).abs() < 1e-12,
                "cycle should tile at {}",
                i
            );
        }
        let expected = 3.0 * (2.0 * PI * 3.0 / 12.0).sin();
        assert!(
            (seasonal[3] - expected).abs() < 0.2,
            "seasonal[3]: {} vs {}",
            seasonal[3],
            expected
        );
    }

    #[test]
    fn test_omitted_components_absent() {
        let series = trend_plus_cycle(48, 12);
        let result = decompose_series(
            &series,
            &[Component::Seasonal],
            DecompositionMode::Additive,
            Some(12),
        )
        .unwrap();
        assert!(result.trend.is_none());
        assert!(result.residual.is_none());
        assert!(result.seasonal.is_some());

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("trend").is_none());
        assert!(json.get("residual").is_none());
        assert!(json.get("seasonal").is_some());
    }

    #[test]
    fn test_multiplicative_reconstruction() {
        // Positive trend scaled by a seasonal factor
        let n = 120;
        let series: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64;
                (20.0 + 0.1 * t) * (1.0 + 0.2 * (2.0 * PI * t / 12.0).sin())
            })
            .collect();
        let result = decompose_series(
            &series,
            &[Component::Trend, Component::Seasonal, Component::Residual],
            DecompositionMode::Multiplicative,
            Some(12),
        )
        .unwrap();
        let trend = result.trend.as_ref().unwrap();
        let seasonal = result.seasonal.as_ref().unwrap();
        let residual = result.residual.as_ref().unwrap();
        for i in 0..n {
            let reconstructed = trend[i] * seasonal[i] * residual[i];
            assert!(
                (reconstructed - series[i]).abs() < 1e-6,
                "reconstruction at {}: {} vs {}",
                i,
                reconstructed,
                series[i]
            );
        }
        // Seasonal factors hover around 1
        let mean_seasonal: f64 = seasonal.iter().sum::<f64>() / n as f64;
        assert!(
            (mean_seasonal - 1.0).abs() < 0.1,
            "mean seasonal factor: {}",
            mean_seasonal
        );
    }

    #[test]
    fn test_estimate_period_finds_sine_cycle() {
        let series: Vec<f64> = (0..144)
            .map(|i| (2.0 * PI * i as f64 / 12.0).sin())
            .collect();
        let period = estimate_period(&series).unwrap();
        assert_eq!(period, 12);
    }

    #[test]
    fn test_estimate_period_too_short() {
        assert_eq!(estimate_period(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_insufficient_data() {
        assert!(matches!(
            decompose_series(&[1.0], &[Component::Trend], DecompositionMode::Additive, None),
            Err(AnalysisError::InsufficientData { .. })
        ));
        // Seasonal needs two full cycles
        let short = trend_plus_cycle(18, 12);
        assert!(matches!(
            decompose_series(
                &short,
                &[Component::Seasonal],
                DecompositionMode::Additive,
                Some(12)
            ),
            Err(AnalysisError::InsufficientData {
                required: 24,
                actual: 18
            })
        ));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "additive".parse::<DecompositionMode>().unwrap(),
            DecompositionMode::Additive
        );
        assert_eq!(
            "multiplicative".parse::<DecompositionMode>().unwrap(),
            DecompositionMode::Multiplicative
        );
        assert!(matches!(
            "stl".parse::<DecompositionMode>(),
            Err(AnalysisError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(matches!(
            decompose_series(
                &[1.0, 2.0, 3.0],
                &[Component::Trend],
                DecompositionMode::Additive,
                Some(0)
            ),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_engine_over_synthetic_model() {
        let model = SyntheticModel::new(9)
            .with_parameter("noise_level", 0.1)
            .with_parameter("seasonal_amplitude", 4.0);
        let engine = DecompositionEngine::new(&model);
        let result = engine
            .decompose(
                "temperature",
                &[Component::Trend, Component::Seasonal, Component::Residual],
                DecompositionMode::Additive,
                Some(12),
            )
            .unwrap();
        let trend = result.trend.as_ref().unwrap();
        // Warming model: trend end above trend start
        assert!(
            trend[trend.len() - 1] > trend[0],
            "trend should rise: {} -> {}",
            trend[0],
            trend[trend.len() - 1]
        );
        // Residual is small relative to the seasonal signal
        let residual = result.residual.as_ref().unwrap();
        let max_resid = residual.iter().fold(0.0f64, |a, &r| a.max(r.abs()));
        assert!(max_resid < 2.0, "max residual: {}", max_resid);
    }
}
