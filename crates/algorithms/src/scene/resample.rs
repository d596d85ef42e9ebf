//! Reproject and resample auxiliary grids onto the band grid

use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use heatisle_core::crs::CoordinateTransform;
use heatisle_core::raster::{Raster, NODATA};
use heatisle_core::{Error, Result};

/// Bilinearly resample `source` onto the exact cell layout of `template`.
///
/// Each template cell centre is transformed into the source CRS and sampled
/// from the four surrounding source cell centres. A cell is no-data when it
/// falls outside the source grid or any of the four neighbours is invalid.
/// When either grid has no CRS the coordinates are taken as-is.
pub fn resample_bilinear<T>(source: &Raster<f64>, template: &Raster<T>) -> Result<Raster<f64>>
where
    T: heatisle_core::RasterElement,
{
    let transform = match (template.crs(), source.crs()) {
        (Some(to), Some(from)) => to.transform_to(from)?,
        _ => CoordinateTransform::Identity,
    };
    let (src_rows, src_cols) = source.shape();
    if src_rows == 0 || src_cols == 0 {
        return Err(Error::InvalidDimensions {
            width: src_cols,
            height: src_rows,
        });
    }
    debug!("resampling {:?} grid onto {:?} ({:?})", source.shape(), template.shape(), transform);

    let (rows, cols) = template.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![NODATA; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let (x, y) = template.pixel_to_geo(col, row);
                let (sx, sy) = transform.apply(x, y);
                let (fc, fr) = source.geo_to_pixel(sx, sy);
                if let Some(v) = sample(source, fc - 0.5, fr - 0.5) {
                    *out = v;
                }
            }
            row_data
        })
        .collect();

    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let mut out: Raster<f64> = template.with_same_meta();
    *out.data_mut() = array;
    out.set_nodata(Some(NODATA));
    Ok(out)
}

/// Lower neighbour index and weight along one axis, in cell-centre space
fn axis(p: f64, n: usize) -> Option<(usize, usize, f64)> {
    if !p.is_finite() || p < -1e-9 || p > (n - 1) as f64 + 1e-9 {
        return None;
    }
    if n == 1 {
        return Some((0, 0, 0.0));
    }
    let i0 = (p.max(0.0).floor() as usize).min(n - 2);
    let t = (p - i0 as f64).clamp(0.0, 1.0);
    Some((i0, i0 + 1, t))
}

fn sample(source: &Raster<f64>, c: f64, r: f64) -> Option<f64> {
    let (c0, c1, tx) = axis(c, source.cols())?;
    let (r0, r1, ty) = axis(r, source.rows())?;

    let v00 = source.cell(r0, c0)?;
    let v01 = source.cell(r0, c1)?;
    let v10 = source.cell(r1, c0)?;
    let v11 = source.cell(r1, c1)?;

    let top = v00 * (1.0 - tx) + v01 * tx;
    let bottom = v10 * (1.0 - tx) + v11 * tx;
    Some(top * (1.0 - ty) + bottom * ty)
}
