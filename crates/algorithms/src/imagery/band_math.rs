//! Band math operations
//!
//! Raster algebra applied cell by cell. Every input cell is checked against
//! its raster's no-data sentinel before the formula sees it; a formula that
//! rejects a cell (returns `None`) or produces a non-finite value writes
//! [`NODATA`] instead, so NaN and infinity never leave this module.

use ndarray::Array2;
use rayon::prelude::*;
use heatisle_core::raster::{Raster, NODATA};
use heatisle_core::{Error, Result};

/// Apply `f` to every cell where all `inputs` hold valid data.
///
/// All inputs must be aligned with the first one (same shape, transform and
/// CRS). `f` receives the input values in order. The output carries the
/// georeferencing of `inputs[0]` and the [`NODATA`] sentinel.
pub fn cellwise<F>(inputs: &[&Raster<f64>], f: F) -> Result<Raster<f64>>
where
    F: Fn(&[f64]) -> Option<f64> + Sync + Send,
{
    let template = *inputs.first().ok_or_else(|| Error::InvalidParameter {
        name: "inputs",
        value: "[]".into(),
        reason: "at least one raster is required".into(),
    })?;
    for other in &inputs[1..] {
        template.ensure_aligned(*other)?;
    }

    let (rows, cols) = template.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![NODATA; cols];
            let mut values = vec![0.0; inputs.len()];
            'cells: for col in 0..cols {
                for (slot, raster) in values.iter_mut().zip(inputs) {
                    match raster.cell(row, col) {
                        Some(v) => *slot = v,
                        None => continue 'cells,
                    }
                }
                if let Some(out) = f(&values) {
                    if out.is_finite() {
                        row_data[col] = out;
                    }
                }
            }
            row_data
        })
        .collect();

    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    template.with_data(array, Some(NODATA))
}

/// Apply a unary function to every valid cell in a raster.
///
/// # Example
/// ```ignore
/// let scaled = band_math(&dn, |v| v * 3.342e-4 + 0.1)?;
/// ```
pub fn band_math<F>(raster: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    cellwise(&[raster], |v| Some(f(v[0])))
}

/// Divide `numerator` by `denominator`, guarding against zero denominators.
///
/// Returns `None` when `|denominator| < 1e-12`; callers turn that into no-data.
pub fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator.abs() < 1e-12 {
        None
    } else {
        Some(numerator / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatisle_core::{GeoTransform, CRS};

    fn make_band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(5, 5, value);
        r.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        r.set_nodata(Some(NODATA));
        r
    }

    #[test]
    fn test_band_math_unary() {
        let input = make_band(100.0);
        let result = band_math(&input, |v| v.sqrt()).unwrap();
        assert!((result.get(2, 2).unwrap() - 10.0).abs() < 1e-10);
        assert_eq!(result.nodata(), Some(NODATA));
    }

    #[test]
    fn test_band_math_skips_nodata_and_nan() {
        let mut input = make_band(100.0);
        input.set(2, 2, NODATA).unwrap();
        input.set(1, 1, f64::NAN).unwrap();

        let result = band_math(&input, |v| v * 2.0).unwrap();
        assert_eq!(result.cell(2, 2), None);
        assert_eq!(result.get(1, 1).unwrap(), NODATA, "NaN must not leak through");
        assert_eq!(result.cell(0, 0), Some(200.0));
    }

    #[test]
    fn test_non_finite_result_is_nodata() {
        let input = make_band(0.0);
        let result = band_math(&input, |v| v.ln()).unwrap();
        assert_eq!(result.cell(0, 0), None);
        assert_eq!(result.get(0, 0).unwrap(), NODATA);
    }

    #[test]
    fn test_cellwise_requires_alignment() {
        let a = make_band(1.0);
        let b = Raster::filled(5, 6, 1.0);
        assert!(matches!(
            cellwise(&[&a, &b], |v| Some(v[0] + v[1])),
            Err(Error::SizeMismatch { .. })
        ));

        let mut c = make_band(1.0);
        c.set_crs(Some(CRS::from_epsg(32628)));
        let mut d = make_band(1.0);
        d.set_crs(Some(CRS::from_epsg(4326)));
        assert!(matches!(
            cellwise(&[&c, &d], |v| Some(v[0])),
            Err(Error::CrsMismatch(..))
        ));
    }

    #[test]
    fn test_cellwise_empty_inputs() {
        assert!(cellwise(&[], |_| Some(0.0)).is_err());
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(1.0, 4.0), Some(0.25));
        assert_eq!(safe_div(1.0, 0.0), None);
    }
}
