//! # climas-core
//!
//! Statistical analysis and scenario exploration for gridded climate
//! simulation output.
//!
//! This crate consumes time x latitude x longitude arrays produced by an
//! external simulation model (through the [`model::ClimateModel`]
//! capability) and provides:
//! - Trend fitting (linear least squares, degree-2 polynomial, Theil-Sen,
//!   Mann-Kendall) over spatially averaged series
//! - Extreme-event detection (percentile or literal thresholds,
//!   run-length duration filtering, hotspot maps)
//! - Trend / seasonal / residual decomposition (additive and
//!   multiplicative, with FFT period estimation)
//! - Cross-variable correlation matrices (Pearson, Spearman, Kendall),
//!   optionally lagged
//! - Scenario management: a named registry, uniform and Latin-hypercube
//!   ensemble sampling, one-at-a-time sensitivity sweeps and weighted
//!   scenario combination
//!
//! ## Data Layout
//!
//! Gridded data is stored time-major in flat vectors: for a grid with
//! `nlat x nlon` cells, `(t, la, lo)` lives at index
//! `(t * nlat + la) * nlon + lo`, so one timestep is a contiguous slab.
//! Coordinate vectors (fractional-year times, latitudes, longitudes)
//! travel with the values.
//!
//! ## Determinism
//!
//! All sampling takes an explicit `u64` seed; there is no ambient RNG
//! state. Model calls are assumed deterministic for fixed arguments.

#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

pub mod parallel;

pub mod cache;
pub mod correlate;
pub mod decompose;
pub mod ensemble;
pub mod error;
pub mod extremes;
pub mod grid;
pub mod model;
pub mod scenario;
pub mod sensitivity;
pub mod threshold;
pub mod trend;

// Re-export commonly used items
pub use error::{AnalysisError, Result};
pub use grid::{ExceedanceMask, GridField, RegionBounds, TimeSeriesGrid};
pub use model::{ClimateModel, Parameters, Season, SyntheticModel};
pub use threshold::ThresholdSpec;

pub use cache::{AnalysisCache, CacheEntry};
pub use correlate::{CorrelationEngine, CorrelationMatrix, CorrelationMethod};
pub use decompose::{Component, Decomposition, DecompositionEngine, DecompositionMode};
pub use ensemble::{create_ensemble, ParameterRanges, SamplingMode};
pub use extremes::{ExtremeEventDetector, ExtremeEventReport, SpatialExtremes};
pub use scenario::{
    combine_scenarios, Metadata, Scenario, ScenarioDocument, ScenarioStore,
    SCENARIO_FORMAT_VERSION,
};
pub use sensitivity::{SensitivityAnalyzer, SensitivityResult};
pub use trend::{
    LinearTrend, NonparametricTrend, PolynomialTrend, RobustTrend, TrendEngine, TrendFit,
    TrendMethod,
};
