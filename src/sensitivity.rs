//! One-at-a-time parameter sensitivity sweeps.
//!
//! Sweeps a single scenario parameter across an evenly spaced range,
//! evaluating the model at each point and recording the spatial mean of
//! the resulting variable. A discrete gradient (central differences in
//! the interior, one-sided at the two ends) quantifies how strongly the
//! output responds to the parameter.

use serde::Serialize;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::model::ClimateModel;
use crate::scenario::ScenarioStore;

/// Paired sweep values, model responses and discrete gradient.
///
/// All three vectors have the same length as the requested point count.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityResult {
    /// Evaluated parameter values, evenly spaced, inclusive of both ends.
    pub values: Vec<f64>,
    /// Spatial mean of the model output at each value.
    pub responses: Vec<f64>,
    /// d(response)/d(value) by finite differences.
    pub gradient: Vec<f64>,
}

/// Sweeps one parameter of a base scenario through the model.
pub struct SensitivityAnalyzer<'m, M> {
    model: &'m M,
}

impl<'m, M: ClimateModel> SensitivityAnalyzer<'m, M> {
    pub fn new(model: &'m M) -> Self {
        Self { model }
    }

    /// Sweep `parameter` of scenario `base` over `[min, max]`.
    ///
    /// Each of the `points >= 2` evaluations clones the base parameters,
    /// overwrites the target parameter and records the grid mean of
    /// `variable` under [`ClimateModel::simulate`].
    pub fn sweep(
        &self,
        store: &ScenarioStore,
        base: &str,
        variable: &str,
        parameter: &str,
        range: (f64, f64),
        points: usize,
    ) -> Result<SensitivityResult> {
        let (min, max) = range;
        if points < 2 {
            return Err(AnalysisError::invalid_parameter(
                "at least 2 evaluation points are required",
            ));
        }
        if min >= max {
            return Err(AnalysisError::invalid_parameter(format!(
                "degenerate sweep range: {} >= {}",
                min, max
            )));
        }
        let scenario = store.get(base)?;
        if !scenario.parameters.contains_key(parameter) {
            return Err(AnalysisError::not_found(format!(
                "parameter '{}' in scenario '{}'",
                parameter, base
            )));
        }

        let values: Vec<f64> = (0..points)
            .map(|i| min + (max - min) * i as f64 / (points - 1) as f64)
            .collect();

        let mut responses = Vec::with_capacity(points);
        for &value in &values {
            let mut parameters = scenario.parameters.clone();
            parameters.insert(parameter.to_string(), value);
            let grid = self.model.simulate(variable, &parameters)?;
            responses.push(grid.mean());
        }
        debug!(base, variable, parameter, points, "sensitivity sweep evaluated");

        let gradient = finite_differences(&values, &responses);
        Ok(SensitivityResult {
            values,
            responses,
            gradient,
        })
    }
}

/// Central differences in the interior, one-sided at the ends.
fn finite_differences(values: &[f64], responses: &[f64]) -> Vec<f64> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let (lo, hi) = if i == 0 {
                (0, 1)
            } else if i == n - 1 {
                (n - 2, n - 1)
            } else {
                (i - 1, i + 1)
            };
            (responses[hi] - responses[lo]) / (values[hi] - values[lo])
        })
        .collect()
}
