//! Rescaling of proximity and exposure surfaces

use serde::{Deserialize, Serialize};

use crate::imagery::cellwise;
use heatisle_core::raster::Raster;
use heatisle_core::{Error, Result};

/// Post-processing applied to a proximity or exposure layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Keep native units (metres for distances)
    #[default]
    None,
    /// Rescale into [0, 1]
    MinMax,
    /// Zero mean, unit variance
    Standardize,
}

impl Normalization {
    pub fn apply(self, grid: &Raster<f64>) -> Result<Raster<f64>> {
        match self {
            Normalization::None => Ok(grid.clone()),
            Normalization::MinMax => min_max_normalize(grid),
            Normalization::Standardize => standardize(grid),
        }
    }
}

/// `(x − mean) / stddev` over valid cells, population standard deviation
pub fn standardize(grid: &Raster<f64>) -> Result<Raster<f64>> {
    let (mean, std) = grid
        .valid_mean_std()
        .ok_or_else(|| Error::Algorithm("cannot standardize a grid without valid cells".into()))?;
    if std < 1e-12 {
        return Err(Error::Algorithm(format!(
            "cannot standardize a constant grid (all valid cells = {})",
            mean
        )));
    }
    cellwise(&[grid], move |v| Some((v[0] - mean) / std))
}

/// `(x − min) / (max − min)` over valid cells; a constant grid maps to 0
pub fn min_max_normalize(grid: &Raster<f64>) -> Result<Raster<f64>> {
    let (min, max) = grid
        .valid_extrema()
        .ok_or_else(|| Error::Algorithm("cannot normalize a grid without valid cells".into()))?;
    let range = max - min;
    cellwise(&[grid], move |v| {
        if range < 1e-12 {
            Some(0.0)
        } else {
            Some((v[0] - min) / range)
        }
    })
}
