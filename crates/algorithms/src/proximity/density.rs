//! Gaussian kernel density of a presence grid

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use heatisle_core::raster::{Raster, RasterElement, NODATA};
use heatisle_core::{Error, Result};

/// Parameters for kernel density
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelDensityParams {
    /// Kernel half-width in cells
    pub radius: usize,
    /// Gaussian sigma in cells (default `radius / 2`)
    #[serde(default)]
    pub sigma: Option<f64>,
}

impl KernelDensityParams {
    pub fn new(radius: usize) -> Self {
        Self { radius, sigma: None }
    }

    fn effective_sigma(&self) -> f64 {
        self.sigma.unwrap_or(self.radius as f64 / 2.0)
    }
}

impl Default for KernelDensityParams {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Normalised 1-D Gaussian weights for offsets `-radius..=radius`
fn gaussian_weights(radius: usize, sigma: f64) -> Vec<f64> {
    let r = radius as isize;
    let weights: Vec<f64> = (-r..=r)
        .map(|k| (-((k * k) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Smooth a presence grid into a continuous exposure surface.
///
/// Presence is 1 for valid non-zero cells and 0 otherwise (no-data counts
/// as absence). The normalised 2-D Gaussian is applied separably, a
/// horizontal pass then a vertical one; neighbours beyond the grid edge
/// contribute zero. Every output cell is valid.
pub fn kernel_density<T: RasterElement>(
    binary: &Raster<T>,
    params: KernelDensityParams,
) -> Result<Raster<f64>> {
    if params.radius == 0 {
        return Err(Error::InvalidParameter {
            name: "radius",
            value: "0".into(),
            reason: "kernel radius must be at least one cell".into(),
        });
    }
    let sigma = params.effective_sigma();
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(Error::InvalidParameter {
            name: "sigma",
            value: sigma.to_string(),
            reason: "must be positive".into(),
        });
    }

    let (rows, cols) = binary.shape();
    let nodata = binary.nodata();
    let presence: Array2<f64> = binary
        .data()
        .mapv(|v| if v.is_valid(nodata) && v.as_f64() != 0.0 { 1.0 } else { 0.0 });

    let weights = gaussian_weights(params.radius, sigma);
    let r = params.radius as isize;
    debug!("kernel density: radius {} cells, sigma {:.2}", params.radius, sigma);

    let horizontal: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0.0; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (i, w) in weights.iter().enumerate() {
                    let c = col as isize + i as isize - r;
                    if c >= 0 && (c as usize) < cols {
                        sum += w * presence[(row, c as usize)];
                    }
                }
                *out = sum;
            }
            row_data
        })
        .collect();
    let horizontal = Array2::from_shape_vec((rows, cols), horizontal)
        .map_err(|e| Error::Other(e.to_string()))?;

    let density: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0.0; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (i, w) in weights.iter().enumerate() {
                    let rr = row as isize + i as isize - r;
                    if rr >= 0 && (rr as usize) < rows {
                        sum += w * horizontal[(rr as usize, col)];
                    }
                }
                *out = sum;
            }
            row_data
        })
        .collect();
    let density =
        Array2::from_shape_vec((rows, cols), density).map_err(|e| Error::Other(e.to_string()))?;

    binary.with_data(density, Some(NODATA))
}
