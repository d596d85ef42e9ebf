//! Georeferenced grid container shared by every processing stage

use crate::bbox::BoundingBox;
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{s, Array2};

/// Row-major grid of `T` cells tied to a map by an affine transform.
///
/// Besides the cells it carries an optional CRS and an optional no-data
/// sentinel.
///
/// Cells are read through [`Raster::cell`], which returns `None` for
/// no-data (the sentinel, or a non-finite float), so every algorithm has to
/// decide explicitly what an invalid cell means for its output.
///
/// # Example
///
/// ```ignore
/// use heatisle_core::Raster;
///
/// let mut raster: Raster<f64> = Raster::new(100, 100);
/// raster.set_nodata(Some(heatisle_core::NODATA));
/// raster.set(10, 20, 31.5)?;
/// assert_eq!(raster.cell(10, 20), Some(31.5));
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled grid with an identity transform
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Grid where every cell holds `value`
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Build from a row-major buffer of exactly `rows * cols` values
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        Array2::from_shape_vec((rows, cols), data)
            .map(Self::from_array)
            .map_err(|e| Error::Other(e.to_string()))
    }

    /// Wrap an existing array without georeferencing
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a raster with the same georeferencing but a different cell type.
    ///
    /// The new raster is zero-filled and carries the default sentinel of `U`.
    pub fn with_same_meta<U: RasterElement>(&self) -> Raster<U> {
        Raster {
            data: Array2::zeros(self.data.dim()),
            transform: self.transform,
            crs: self.crs,
            nodata: Some(U::default_nodata()),
        }
    }

    /// Copy of the georeferencing and sentinel with every cell set to `fill_value`
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs,
            nodata: self.nodata,
        }
    }

    /// Replace the cell values, keeping the georeferencing of `self`
    pub fn with_data<U: RasterElement>(&self, data: Array2<U>, nodata: Option<U>) -> Result<Raster<U>> {
        if data.dim() != self.data.dim() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar,
                ac,
            });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs,
            nodata,
        })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Stored value, sentinel included; errors outside the grid
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Valid value at (row, col); `None` for no-data or out of range
    pub fn cell(&self, row: usize, col: usize) -> Option<T> {
        self.data
            .get((row, col))
            .copied()
            .filter(|v| v.is_valid(self.nodata))
    }

    /// Overwrite one cell; errors outside the grid
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Sentinel marking cells without a measurement
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Pixel width in CRS units
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// `(min_x, min_y, max_x, max_y)` of the outer cell edges
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Geographic bounds as a [`BoundingBox`]
    pub fn extent(&self) -> BoundingBox {
        BoundingBox::from_tuple(self.bounds())
    }

    /// Map coordinates of a cell centre
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional `(col, row)` of a map coordinate
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// Whether `value` counts as data under this grid's sentinel
    pub fn is_valid(&self, value: T) -> bool {
        value.is_valid(self.nodata)
    }

    /// Number of valid cells
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_valid(self.nodata)).count()
    }

    // Alignment

    /// Check that `other` shares this raster's dimensions, transform and CRS.
    ///
    /// This is the precondition of every elementwise operation. A CRS is only
    /// compared when both rasters carry one.
    pub fn ensure_aligned<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar: other.rows(),
                ac: other.cols(),
            });
        }
        if !self.transform.approx_eq(other.transform()) {
            return Err(Error::TransformMismatch {
                expected: self.transform.to_gdal(),
                actual: other.transform().to_gdal(),
            });
        }
        if let (Some(a), Some(b)) = (self.crs(), other.crs()) {
            if !a.is_equivalent(b) {
                return Err(Error::CrsMismatch(a.to_string(), b.to_string()));
            }
        }
        Ok(())
    }

    /// Crop to the cells intersecting `bbox` (intersection of index ranges).
    ///
    /// Fails with [`Error::OutOfBounds`] when the box lies entirely outside
    /// the raster extent.
    pub fn crop(&self, bbox: &BoundingBox) -> Result<Raster<T>> {
        let window = self
            .transform
            .window(bbox, self.cols(), self.rows())
            .ok_or(Error::OutOfBounds {
                bbox: *bbox,
                extent: self.extent(),
            })?;

        let data = self
            .data
            .slice(s![
                window.row_off..window.row_off + window.rows,
                window.col_off..window.col_off + window.cols
            ])
            .to_owned();

        Ok(Raster {
            data,
            transform: self.transform.offset(window.col_off, window.row_off),
            crs: self.crs,
            nodata: self.nodata,
        })
    }

    /// Minimum and maximum over valid cells, `None` when there are none
    pub fn valid_extrema(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter(|v| v.is_valid(self.nodata))
            .map(|v| v.as_f64())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Mean and population standard deviation over valid cells
    pub fn valid_mean_std(&self) -> Option<(f64, f64)> {
        let values: Vec<f64> = self
            .data
            .iter()
            .filter(|v| v.is_valid(self.nodata))
            .map(|v| v.as_f64())
            .collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some((mean, var.sqrt()))
    }

    /// Summary over valid cells, used for stage logging
    pub fn statistics(&self) -> RasterStatistics {
        let extrema = self.valid_extrema();
        let mean_std = self.valid_mean_std();
        let valid_count = self.valid_count();

        RasterStatistics {
            min: extrema.map(|e| e.0),
            max: extrema.map(|e| e.1),
            mean: mean_std.map(|m| m.0),
            std_dev: mean_std.map(|m| m.1),
            valid_count,
            nodata_count: self.len() - valid_count,
        }
    }
}

/// Valid-cell summary; the value fields are `None` for an all-no-data grid
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
