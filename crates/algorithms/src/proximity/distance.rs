//! Exact Euclidean distance transform
//!
//! Separable squared-distance transform (Felzenszwalb & Huttenlocher, 2012):
//! a 1-D lower envelope of parabolas along every row, then along every
//! column of the row result. Runs in O(rows × cols) and honours
//! non-square cells.

use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use heatisle_core::raster::{Raster, RasterElement, NODATA};
use heatisle_core::{Error, Result};

/// Distance, in projected units, from every cell to the nearest foreground cell.
///
/// Foreground is any valid non-zero cell. No-data input cells count as
/// background. Fails when the grid has no foreground at all.
pub fn distance_transform<T: RasterElement>(binary: &Raster<T>) -> Result<Raster<f64>> {
    let (rows, cols) = binary.shape();
    let gt = binary.transform();
    let dx = gt.pixel_width.abs();
    let dy = gt.pixel_height.abs();
    if dx <= 0.0 || dy <= 0.0 {
        return Err(Error::Algorithm("distance transform needs a non-degenerate cell size".into()));
    }

    let nodata = binary.nodata();
    let mut seeds = 0usize;
    let init: Array2<f64> = binary.data().mapv(|v| {
        if v.is_valid(nodata) && v.as_f64() != 0.0 {
            seeds += 1;
            0.0
        } else {
            f64::INFINITY
        }
    });
    if seeds == 0 {
        return Err(Error::Algorithm("distance transform: no foreground cells".into()));
    }
    debug!("distance transform: {} foreground cells of {}", seeds, rows * cols);

    // Pass 1: along rows
    let by_row: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| squared_edt_1d(init.row(row).iter().copied(), cols, dx))
        .collect();
    let by_row =
        Array2::from_shape_vec((rows, cols), by_row).map_err(|e| Error::Other(e.to_string()))?;

    // Pass 2: along columns, results come back column-major
    let by_col: Vec<Vec<f64>> = (0..cols)
        .into_par_iter()
        .map(|col| squared_edt_1d(by_row.column(col).iter().copied(), rows, dy))
        .collect();

    let mut out = Array2::from_elem((rows, cols), NODATA);
    for (col, column) in by_col.iter().enumerate() {
        for (row, d2) in column.iter().enumerate() {
            out[(row, col)] = d2.sqrt();
        }
    }

    binary.with_data(out, Some(NODATA))
}

/// Squared distance along one line of `n` samples spaced `spacing` apart.
///
/// `f` holds the squared distance already accumulated at each sample
/// (0 for seeds, +inf for "nothing yet").
fn squared_edt_1d(f: impl Iterator<Item = f64>, n: usize, spacing: f64) -> Vec<f64> {
    let f: Vec<f64> = f.collect();
    let s2 = spacing * spacing;
    let mut out = vec![f64::INFINITY; n];

    // Lower envelope: parabola vertices and the boundaries between them
    let mut v: Vec<usize> = Vec::with_capacity(n);
    let mut z: Vec<f64> = Vec::with_capacity(n + 1);

    let intersect = |q: usize, p: usize| -> f64 {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + s2 * qf * qf) - (f[p] + s2 * pf * pf)) / (2.0 * s2 * (qf - pf))
    };

    for q in 0..n {
        if !f[q].is_finite() {
            continue;
        }
        if v.is_empty() {
            v.push(q);
            z.push(f64::NEG_INFINITY);
            continue;
        }
        let mut s = intersect(q, v[v.len() - 1]);
        while s <= z[z.len() - 1] {
            v.pop();
            z.pop();
            if v.is_empty() {
                break;
            }
            s = intersect(q, v[v.len() - 1]);
        }
        if v.is_empty() {
            v.push(q);
            z.push(f64::NEG_INFINITY);
        } else {
            v.push(q);
            z.push(s);
        }
    }

    if v.is_empty() {
        return out;
    }
    z.push(f64::INFINITY);

    let mut k = 0;
    for (q, slot) in out.iter_mut().enumerate() {
        let qf = q as f64;
        while z[k + 1] < qf {
            k += 1;
        }
        let d = qf - v[k] as f64;
        *slot = s2 * d * d + f[v[k]];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use heatisle_core::GeoTransform;

    fn binary(rows: usize, cols: usize, seeds: &[(usize, usize)], dx: f64, dy: f64) -> Raster<u8> {
        let mut r: Raster<u8> = Raster::new(rows, cols);
        r.set_transform(GeoTransform::new(0.0, 0.0, dx, -dy));
        for &(row, col) in seeds {
            r.set(row, col, 1).unwrap();
        }
        r
    }

    fn brute_force(rows: usize, cols: usize, seeds: &[(usize, usize)], dx: f64, dy: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let d = seeds
                    .iter()
                    .map(|&(sr, sc)| {
                        let ddx = (col as f64 - sc as f64) * dx;
                        let ddy = (row as f64 - sr as f64) * dy;
                        (ddx * ddx + ddy * ddy).sqrt()
                    })
                    .fold(f64::INFINITY, f64::min);
                out.push(d);
            }
        }
        out
    }

    #[test]
    fn test_single_seed() {
        let grid = binary(5, 5, &[(2, 2)], 30.0, 30.0);
        let out = distance_transform(&grid).unwrap();
        assert_eq!(out.get(2, 2).unwrap(), 0.0);
        assert_relative_eq!(out.get(2, 4).unwrap(), 60.0, epsilon = 1e-9);
        assert_relative_eq!(out.get(0, 0).unwrap(), (60.0f64 * 60.0 + 60.0 * 60.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_matches_brute_force() {
        let seeds = [(0, 7), (3, 1), (9, 9), (6, 4), (6, 5)];
        for (dx, dy) in [(1.0, 1.0), (30.0, 30.0), (10.0, 25.0)] {
            let grid = binary(12, 10, &seeds, dx, dy);
            let out = distance_transform(&grid).unwrap();
            let expected = brute_force(12, 10, &seeds, dx, dy);
            for (got, want) in out.data().iter().zip(expected.iter()) {
                assert_relative_eq!(*got, *want, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_nodata_is_background() {
        let mut grid = binary(1, 4, &[(0, 0)], 1.0, 1.0);
        grid.set_nodata(Some(1));
        // the only non-zero cell is the sentinel, so nothing is foreground
        assert!(distance_transform(&grid).is_err());
    }

    #[test]
    fn test_no_foreground() {
        let grid = binary(4, 4, &[], 1.0, 1.0);
        assert!(matches!(distance_transform(&grid), Err(Error::Algorithm(_))));
    }
}
