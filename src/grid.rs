//! Gridded climate data types.
//!
//! [`TimeSeriesGrid`] provides safe, dimension-tracked access to the flat
//! time-major data layout used throughout this crate. It eliminates manual
//! `data[(t * nlat + la) * nlon + lo]` index arithmetic and carries the
//! coordinate vectors (time, latitude, longitude) alongside the values.
//!
//! [`GridField`] is the 2-D lat x lon companion for single snapshots
//! (seasonal fields, spatial frequency maps), and [`ExceedanceMask`] is a
//! boolean grid with exactly the dimensions of its source grid.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Time-major 3-D grid of a climate variable.
///
/// Stores values in a flat `Vec<f64>`: element `(t, la, lo)` is at index
/// `(t * nlat + la) * nlon + lo`, so one timestep occupies a contiguous
/// `nlat * nlon` slab.
///
/// # Conventions
///
/// Time coordinates are fractional years (e.g. `2040.5`), latitudes and
/// longitudes are degrees. Grids are read-only once handed to an engine;
/// engines subset or reduce into new values, never mutate the caller's
/// grid.
///
/// # Examples
///
/// ```
/// use climas_core::grid::TimeSeriesGrid;
///
/// // 2 timesteps over a 2 x 2 grid
/// let grid = TimeSeriesGrid::from_values(
///     vec![
///         1.0, 2.0, 3.0, 4.0, // t = 0
///         5.0, 6.0, 7.0, 8.0, // t = 1
///     ],
///     vec![2000.0, 2001.0],
///     vec![-45.0, 45.0],
///     vec![0.0, 180.0],
/// )
/// .unwrap();
///
/// assert_eq!(grid[(0, 0, 1)], 2.0);
/// assert_eq!(grid[(1, 1, 0)], 7.0);
/// assert_eq!(grid.spatial_mean(0), 2.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesGrid {
    data: Vec<f64>,
    times: Vec<f64>,
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl TimeSeriesGrid {
    /// Create from flat time-major data with dimension validation.
    ///
    /// Returns `None` if `data.len() != times.len() * lats.len() * lons.len()`.
    pub fn from_values(
        data: Vec<f64>,
        times: Vec<f64>,
        lats: Vec<f64>,
        lons: Vec<f64>,
    ) -> Option<Self> {
        if data.len() != times.len() * lats.len() * lons.len() {
            return None;
        }
        Some(Self {
            data,
            times,
            lats,
            lons,
        })
    }

    /// Create a zero-filled grid over the given coordinates.
    pub fn zeros(times: Vec<f64>, lats: Vec<f64>, lons: Vec<f64>) -> Self {
        let len = times.len() * lats.len() * lons.len();
        Self {
            data: vec![0.0; len],
            times,
            lats,
            lons,
        }
    }

    /// Number of timesteps.
    #[inline]
    pub fn ntime(&self) -> usize {
        self.times.len()
    }

    /// Number of latitude points.
    #[inline]
    pub fn nlat(&self) -> usize {
        self.lats.len()
    }

    /// Number of longitude points.
    #[inline]
    pub fn nlon(&self) -> usize {
        self.lons.len()
    }

    /// Number of spatial cells per timestep.
    #[inline]
    pub fn ncells(&self) -> usize {
        self.lats.len() * self.lons.len()
    }

    /// Dimensions as `(ntime, nlat, nlon)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.lats.len(), self.lons.len())
    }

    /// Total number of values.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the grid holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time coordinates (fractional years).
    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Latitude coordinates (degrees).
    #[inline]
    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    /// Longitude coordinates (degrees).
    #[inline]
    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// Flat slice of the underlying time-major data (zero-copy).
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Contiguous slab of one timestep's `nlat * nlon` values (zero-copy).
    ///
    /// # Panics
    /// Panics if `t >= ntime`.
    #[inline]
    pub fn time_slab(&self, t: usize) -> &[f64] {
        let cells = self.ncells();
        &self.data[t * cells..(t + 1) * cells]
    }

    /// Value at `(t, cell)` where `cell` is a flat `la * nlon + lo` index.
    #[inline]
    pub fn at_cell(&self, t: usize, cell: usize) -> f64 {
        self.data[t * self.ncells() + cell]
    }

    /// Get value at `(t, la, lo)` with bounds checking.
    #[inline]
    pub fn get(&self, t: usize, la: usize, lo: usize) -> Option<f64> {
        if t < self.ntime() && la < self.nlat() && lo < self.nlon() {
            Some(self.data[(t * self.nlat() + la) * self.nlon() + lo])
        } else {
            None
        }
    }

    /// Extract the full time series of a single cell.
    ///
    /// This is an O(ntime) gather because timesteps, not cells, are
    /// contiguous in the layout.
    pub fn cell_series(&self, la: usize, lo: usize) -> Vec<f64> {
        let cell = la * self.nlon() + lo;
        (0..self.ntime()).map(|t| self.at_cell(t, cell)).collect()
    }

    /// Mean over the spatial dimensions at one timestep.
    ///
    /// Returns `NaN` for a grid with no cells.
    pub fn spatial_mean(&self, t: usize) -> f64 {
        let slab = self.time_slab(t);
        slab.iter().sum::<f64>() / slab.len() as f64
    }

    /// Collapse to a 1-D series by averaging over the spatial dimensions.
    pub fn spatial_mean_series(&self) -> Vec<f64> {
        (0..self.ntime()).map(|t| self.spatial_mean(t)).collect()
    }

    /// Mean over all values.
    ///
    /// Returns `NaN` for an empty grid.
    pub fn mean(&self) -> f64 {
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Restrict to the rectangular region (inclusive bounds).
    ///
    /// Cells whose latitude/longitude coordinates fall within the bounds
    /// are copied into a new grid; the time axis is unchanged. A region
    /// that covers no cells yields an empty spatial extent, not an error.
    pub fn subset_region(&self, region: &RegionBounds) -> TimeSeriesGrid {
        let lat_idx: Vec<usize> = self
            .lats
            .iter()
            .enumerate()
            .filter(|(_, &lat)| lat >= region.lat_min && lat <= region.lat_max)
            .map(|(i, _)| i)
            .collect();
        let lon_idx: Vec<usize> = self
            .lons
            .iter()
            .enumerate()
            .filter(|(_, &lon)| lon >= region.lon_min && lon <= region.lon_max)
            .map(|(i, _)| i)
            .collect();

        let mut data = Vec::with_capacity(self.ntime() * lat_idx.len() * lon_idx.len());
        for t in 0..self.ntime() {
            for &la in &lat_idx {
                for &lo in &lon_idx {
                    data.push(self[(t, la, lo)]);
                }
            }
        }
        TimeSeriesGrid {
            data,
            times: self.times.clone(),
            lats: lat_idx.iter().map(|&i| self.lats[i]).collect(),
            lons: lon_idx.iter().map(|&i| self.lons[i]).collect(),
        }
    }

    /// Restrict to timesteps within `[start_year, end_year]` inclusive.
    ///
    /// A fractional time coordinate `t` belongs to year `floor(t)`.
    pub fn subset_years(&self, start_year: i32, end_year: i32) -> TimeSeriesGrid {
        let keep: Vec<usize> = self
            .times
            .iter()
            .enumerate()
            .filter(|(_, &t)| {
                let year = t.floor() as i32;
                year >= start_year && year <= end_year
            })
            .map(|(i, _)| i)
            .collect();

        let cells = self.ncells();
        let mut data = Vec::with_capacity(keep.len() * cells);
        for &t in &keep {
            data.extend_from_slice(self.time_slab(t));
        }
        TimeSeriesGrid {
            data,
            times: keep.iter().map(|&i| self.times[i]).collect(),
            lats: self.lats.clone(),
            lons: self.lons.clone(),
        }
    }

    /// Copy one timestep into a standalone 2-D field.
    pub fn slice_at(&self, t: usize) -> GridField {
        GridField {
            data: self.time_slab(t).to_vec(),
            lats: self.lats.clone(),
            lons: self.lons.clone(),
        }
    }
}

impl std::ops::Index<(usize, usize, usize)> for TimeSeriesGrid {
    type Output = f64;

    #[inline]
    fn index(&self, (t, la, lo): (usize, usize, usize)) -> &f64 {
        debug_assert!(
            t < self.ntime() && la < self.nlat() && lo < self.nlon(),
            "grid index ({}, {}, {}) out of bounds for {}x{}x{} grid",
            t,
            la,
            lo,
            self.ntime(),
            self.nlat(),
            self.nlon()
        );
        &self.data[(t * self.nlat() + la) * self.nlon() + lo]
    }
}

impl std::ops::IndexMut<(usize, usize, usize)> for TimeSeriesGrid {
    #[inline]
    fn index_mut(&mut self, (t, la, lo): (usize, usize, usize)) -> &mut f64 {
        debug_assert!(
            t < self.ntime() && la < self.nlat() && lo < self.nlon(),
            "grid index ({}, {}, {}) out of bounds for {}x{}x{} grid",
            t,
            la,
            lo,
            self.ntime(),
            self.nlat(),
            self.nlon()
        );
        let (nlat, nlon) = (self.nlat(), self.nlon());
        &mut self.data[(t * nlat + la) * nlon + lo]
    }
}

impl std::fmt::Display for TimeSeriesGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TimeSeriesGrid({}x{}x{})",
            self.ntime(),
            self.nlat(),
            self.nlon()
        )
    }
}

/// A single 2-D lat x lon field.
///
/// Row-major: element `(la, lo)` is at index `la * nlon + lo`. Used for
/// seasonal snapshots and per-cell statistics maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridField {
    data: Vec<f64>,
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl GridField {
    /// Create from flat row-major data with dimension validation.
    ///
    /// Returns `None` if `data.len() != lats.len() * lons.len()`.
    pub fn from_values(data: Vec<f64>, lats: Vec<f64>, lons: Vec<f64>) -> Option<Self> {
        if data.len() != lats.len() * lons.len() {
            return None;
        }
        Some(Self { data, lats, lons })
    }

    /// Create a zero-filled field over the given coordinates.
    pub fn zeros(lats: Vec<f64>, lons: Vec<f64>) -> Self {
        let len = lats.len() * lons.len();
        Self {
            data: vec![0.0; len],
            lats,
            lons,
        }
    }

    /// Number of latitude points.
    #[inline]
    pub fn nlat(&self) -> usize {
        self.lats.len()
    }

    /// Number of longitude points.
    #[inline]
    pub fn nlon(&self) -> usize {
        self.lons.len()
    }

    /// Dimensions as `(nlat, nlon)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.lats.len(), self.lons.len())
    }

    /// Latitude coordinates (degrees).
    #[inline]
    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    /// Longitude coordinates (degrees).
    #[inline]
    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// Flat slice of the underlying row-major data (zero-copy).
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Get value at `(la, lo)` with bounds checking.
    #[inline]
    pub fn get(&self, la: usize, lo: usize) -> Option<f64> {
        if la < self.nlat() && lo < self.nlon() {
            Some(self.data[la * self.nlon() + lo])
        } else {
            None
        }
    }

    /// Mean over all cells.
    ///
    /// Returns `NaN` for an empty field.
    pub fn mean(&self) -> f64 {
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }
}

impl std::ops::Index<(usize, usize)> for GridField {
    type Output = f64;

    #[inline]
    fn index(&self, (la, lo): (usize, usize)) -> &f64 {
        debug_assert!(
            la < self.nlat() && lo < self.nlon(),
            "field index ({}, {}) out of bounds for {}x{} field",
            la,
            lo,
            self.nlat(),
            self.nlon()
        );
        &self.data[la * self.nlon() + lo]
    }
}

impl std::ops::IndexMut<(usize, usize)> for GridField {
    #[inline]
    fn index_mut(&mut self, (la, lo): (usize, usize)) -> &mut f64 {
        debug_assert!(
            la < self.nlat() && lo < self.nlon(),
            "field index ({}, {}) out of bounds for {}x{} field",
            la,
            lo,
            self.nlat(),
            self.nlon()
        );
        let nlon = self.nlon();
        &mut self.data[la * nlon + lo]
    }
}

impl std::fmt::Display for GridField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GridField({}x{})", self.nlat(), self.nlon())
    }
}

/// Boolean grid marking values strictly above a resolved threshold.
///
/// Always has exactly the dimensions of the grid it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceedanceMask {
    data: Vec<bool>,
    ntime: usize,
    nlat: usize,
    nlon: usize,
}

impl ExceedanceMask {
    /// Mark every value of `grid` strictly greater than `threshold`.
    pub fn from_grid(grid: &TimeSeriesGrid, threshold: f64) -> Self {
        let (ntime, nlat, nlon) = grid.shape();
        Self {
            data: grid.as_slice().iter().map(|&v| v > threshold).collect(),
            ntime,
            nlat,
            nlon,
        }
    }

    /// Dimensions as `(ntime, nlat, nlon)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.ntime, self.nlat, self.nlon)
    }

    /// Number of spatial cells per timestep.
    #[inline]
    pub fn ncells(&self) -> usize {
        self.nlat * self.nlon
    }

    /// Total number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the mask holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Mask value at `(t, cell)` where `cell` is a flat `la * nlon + lo` index.
    #[inline]
    pub fn at_cell(&self, t: usize, cell: usize) -> bool {
        self.data[t * self.ncells() + cell]
    }

    /// Count of exceeding entries across the whole mask.
    pub fn count_exceeding(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }

    /// Count of exceeding cells at one timestep.
    pub fn count_exceeding_at(&self, t: usize) -> usize {
        let cells = self.ncells();
        self.data[t * cells..(t + 1) * cells]
            .iter()
            .filter(|&&b| b)
            .count()
    }
}

impl std::ops::Index<(usize, usize, usize)> for ExceedanceMask {
    type Output = bool;

    #[inline]
    fn index(&self, (t, la, lo): (usize, usize, usize)) -> &bool {
        debug_assert!(
            t < self.ntime && la < self.nlat && lo < self.nlon,
            "mask index ({}, {}, {}) out of bounds for {}x{}x{} mask",
            t,
            la,
            lo,
            self.ntime,
            self.nlat,
            self.nlon
        );
        &self.data[(t * self.nlat + la) * self.nlon + lo]
    }
}

/// Rectangular lat/lon region used to restrict a grid before spatial
/// averaging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl RegionBounds {
    /// Create bounds, rejecting `lat_min > lat_max` or `lon_min > lon_max`.
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self> {
        if lat_min > lat_max {
            return Err(AnalysisError::invalid_parameter(format!(
                "inverted latitude bounds: {} > {}",
                lat_min, lat_max
            )));
        }
        if lon_min > lon_max {
            return Err(AnalysisError::invalid_parameter(format!(
                "inverted longitude bounds: {} > {}",
                lon_min, lon_max
            )));
        }
        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }
}
