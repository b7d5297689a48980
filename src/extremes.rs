//! Extreme-event detection over exceedance masks.
//!
//! [`ExtremeEventDetector`] resolves a threshold (literal or percentile of
//! the variable's full series), builds a per-cell, per-timestep
//! [`ExceedanceMask`], filters events by run length along the time axis
//! and aggregates frequency, duration and spatial statistics.
//!
//! An event is a maximal consecutive exceedance run of length at least
//! `min_duration` in a single cell. Hotspots are cells whose exceedance
//! frequency lies above the 90th percentile of the spatial-frequency
//! distribution.

#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use serde::Serialize;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::grid::{ExceedanceMask, GridField};
use crate::iter_maybe_parallel;
use crate::model::ClimateModel;
use crate::threshold::{percentile, ThresholdSpec};

/// Spatial-frequency cutoff quantile for hotspot cells.
const HOTSPOT_PERCENTILE: f64 = 90.0;

/// Aggregated extreme-event statistics for one variable.
#[derive(Debug, Clone, Serialize)]
pub struct ExtremeEventReport {
    /// Resolved threshold value.
    pub threshold: f64,
    /// Fraction of all (time, cell) entries exceeding the threshold,
    /// unfiltered by duration.
    pub frequency: f64,
    /// Number of qualifying runs across all cells.
    pub events_count: usize,
    /// Longest qualifying run anywhere in the grid (0 if none qualify).
    pub max_duration: usize,
    /// Per-timestep fraction of cells exceeding the threshold.
    pub temporal_distribution: Vec<f64>,
    /// Spatial breakdown, present when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialExtremes>,
}

/// Per-cell exceedance statistics and hotspot summary.
#[derive(Debug, Clone, Serialize)]
pub struct SpatialExtremes {
    /// Per-cell fraction of timesteps exceeding the threshold.
    pub spatial_frequency: GridField,
    /// Spatial-frequency value above which a cell is a hotspot.
    pub hotspot_cutoff: f64,
    /// `(lat index, lon index)` of each hotspot cell.
    pub hotspots: Vec<(usize, usize)>,
    /// Number of hotspot cells.
    pub hotspot_count: usize,
    /// Mean of the spatial-frequency distribution.
    pub mean_frequency: f64,
    /// Population variance of the spatial-frequency distribution.
    pub frequency_variance: f64,
}

/// Detects threshold exceedance events in model variables.
pub struct ExtremeEventDetector<'m, M> {
    model: &'m M,
}

impl<'m, M: ClimateModel> ExtremeEventDetector<'m, M> {
    pub fn new(model: &'m M) -> Self {
        Self { model }
    }

    /// Detect extreme events for `variable`.
    ///
    /// Percentile thresholds are resolved over the variable's full,
    /// unrestricted series. `min_duration` is the shortest run that
    /// counts as an event; `spatial` adds the per-cell breakdown.
    pub fn detect(
        &self,
        variable: &str,
        spec: &ThresholdSpec,
        min_duration: usize,
        spatial: bool,
    ) -> Result<ExtremeEventReport> {
        if min_duration == 0 {
            return Err(AnalysisError::invalid_parameter(
                "minimum duration must be at least 1",
            ));
        }

        let grid = self.model.get_variable_data(variable, None)?;
        if grid.is_empty() {
            return Err(AnalysisError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let threshold = spec.resolve(grid.as_slice())?;
        let mask = ExceedanceMask::from_grid(&grid, threshold);
        debug!(
            variable,
            threshold,
            min_duration,
            exceeding = mask.count_exceeding(),
            "detecting extremes"
        );

        let frequency = mask.count_exceeding() as f64 / mask.len() as f64;
        let (ntime, _, _) = mask.shape();
        let cells = mask.ncells();
        let temporal_distribution: Vec<f64> = (0..ntime)
            .map(|t| mask.count_exceeding_at(t) as f64 / cells as f64)
            .collect();

        // Per-cell run-length scan along the time axis
        let per_cell: Vec<(usize, usize)> = iter_maybe_parallel!(0..cells)
            .map(|cell| scan_cell_runs(&mask, cell, min_duration))
            .collect();
        let events_count: usize = per_cell.iter().map(|&(count, _)| count).sum();
        let max_duration = per_cell.iter().map(|&(_, max)| max).max().unwrap_or(0);

        let spatial = if spatial {
            Some(spatial_breakdown(&grid.slice_at(0), &mask))
        } else {
            None
        };

        Ok(ExtremeEventReport {
            threshold,
            frequency,
            events_count,
            max_duration,
            temporal_distribution,
            spatial,
        })
    }
}

/// Count qualifying runs and the longest qualifying run for one cell.
fn scan_cell_runs(mask: &ExceedanceMask, cell: usize, min_duration: usize) -> (usize, usize) {
    let (ntime, _, _) = mask.shape();
    let mut count = 0;
    let mut max = 0;
    let mut run = 0usize;
    for t in 0..ntime {
        if mask.at_cell(t, cell) {
            run += 1;
        } else {
            if run >= min_duration {
                count += 1;
                max = max.max(run);
            }
            run = 0;
        }
    }
    if run >= min_duration {
        count += 1;
        max = max.max(run);
    }
    (count, max)
}

fn spatial_breakdown(template: &GridField, mask: &ExceedanceMask) -> SpatialExtremes {
    let (ntime, nlat, nlon) = mask.shape();
    let cells = mask.ncells();

    let freqs: Vec<f64> = iter_maybe_parallel!(0..cells)
        .map(|cell| {
            let exceeding = (0..ntime).filter(|&t| mask.at_cell(t, cell)).count();
            exceeding as f64 / ntime as f64
        })
        .collect();

    let mean_frequency = freqs.iter().sum::<f64>() / cells as f64;
    let frequency_variance = freqs
        .iter()
        .map(|&f| (f - mean_frequency).powi(2))
        .sum::<f64>()
        / cells as f64;

    let hotspot_cutoff = percentile(&freqs, HOTSPOT_PERCENTILE).unwrap_or(0.0);
    let hotspots: Vec<(usize, usize)> = (0..cells)
        .filter(|&cell| freqs[cell] > hotspot_cutoff)
        .map(|cell| (cell / nlon, cell % nlon))
        .collect();
    let hotspot_count = hotspots.len();

    debug_assert_eq!((nlat, nlon), template.shape());
    let spatial_frequency =
        GridField::from_values(freqs, template.lats().to_vec(), template.lons().to_vec())
            .expect("frequency map follows mask dimensions");

    SpatialExtremes {
        spatial_frequency,
        hotspot_cutoff,
        hotspots,
        hotspot_count,
        mean_frequency,
        frequency_variance,
    }
}
