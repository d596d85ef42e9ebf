//! Pixel to map coordinate mapping

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Tolerance used when deciding whether two grids share one cell layout
const ALIGN_TOLERANCE: f64 = 1e-9;

/// Six-coefficient affine map between `(col, row)` and projected `(x, y)`:
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Landsat Collection 2 products are north-up, so the rotation terms are 0
/// and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up grids
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

/// Index ranges selected from a grid by a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl GeoTransform {
    /// Unrotated transform from the upper-left corner and the two pixel steps
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Coefficients in the conventional six-term order, used in error messages
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Projected coordinates of the centre of cell (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Projected coordinates of the top-left corner of cell (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Inverse of the affine map, giving fractional `(col, row)`.
    ///
    /// Cell (c, r) covers `[c, c+1) x [r, r+1)`; its centre maps to `(c + 0.5, r + 0.5)`.
    /// Returns NaN for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let (dx, dy) = (x - self.origin_x, y - self.origin_y);
        (
            (self.pixel_height * dx - self.row_rotation * dy) / det,
            (self.pixel_width * dy - self.col_rotation * dx) / det,
        )
    }

    /// Absolute pixel width
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Whether two transforms describe the same cell layout
    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= ALIGN_TOLERANCE * a.abs().max(b.abs()).max(1.0))
    }

    /// Transform of a sub-window starting at (col_off, row_off)
    pub fn offset(&self, col_off: usize, row_off: usize) -> GeoTransform {
        let (x, y) = self.pixel_to_geo_corner(col_off, row_off);
        GeoTransform {
            origin_x: x,
            origin_y: y,
            ..*self
        }
    }

    /// Envelope of the four outer corners of a `width x height` grid
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        [(0, 0), (width, 0), (0, height), (width, height)]
            .iter()
            .map(|&(c, r)| self.pixel_to_geo_corner(c, r))
            .fold(
                (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
                |(x0, y0, x1, y1), (x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            )
    }

    /// Index ranges of all cells that intersect `bbox`.
    ///
    /// Returns `None` when the box does not overlap the `width x height` grid.
    pub fn window(&self, bbox: &BoundingBox, width: usize, height: usize) -> Option<PixelWindow> {
        let extent = BoundingBox::from_tuple(self.bounds(width, height));
        let clipped = extent.intersection(bbox)?;

        let corners = [
            self.geo_to_pixel(clipped.min_x, clipped.min_y),
            self.geo_to_pixel(clipped.min_x, clipped.max_y),
            self.geo_to_pixel(clipped.max_x, clipped.min_y),
            self.geo_to_pixel(clipped.max_x, clipped.max_y),
        ];
        let col_lo = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let col_hi = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let row_lo = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let row_hi = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

        // Snap to whole cells, absorbing float noise on exact cell edges
        let c0 = (col_lo + 1e-9).floor().max(0.0) as usize;
        let r0 = (row_lo + 1e-9).floor().max(0.0) as usize;
        let c1 = ((col_hi - 1e-9).ceil() as usize).min(width);
        let r1 = ((row_hi - 1e-9).ceil() as usize).min(height);

        if c1 <= c0 || r1 <= r0 {
            return None;
        }

        Some(PixelWindow {
            col_off: c0,
            row_off: r0,
            cols: c1 - c0,
            rows: r1 - r0,
        })
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cell_centre_maps_to_half_index() {
        let gt = GeoTransform::new(399_960.0, 4_200_000.0, 30.0, -30.0);
        let (x, y) = gt.pixel_to_geo(3, 7);
        assert_relative_eq!(x, 399_960.0 + 105.0);
        assert_relative_eq!(y, 4_200_000.0 - 225.0);

        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 3.5, epsilon = 1e-9);
        assert_relative_eq!(row, 7.5, epsilon = 1e-9);
    }

    #[test]
    fn test_bounds_of_north_up_grid() {
        let gt = GeoTransform::new(-20.0, 50.0, 2.0, -5.0);
        assert_eq!(gt.bounds(20, 4), (-20.0, 30.0, 20.0, 50.0));
    }

    #[test]
    fn test_window_inside() {
        // 10x10 grid of 30 m cells with upper-left corner at (500000, 4000300)
        let gt = GeoTransform::new(500_000.0, 4_000_300.0, 30.0, -30.0);
        let bbox = BoundingBox::new(500_060.0, 4_000_150.0, 500_150.0, 4_000_240.0);
        let w = gt.window(&bbox, 10, 10).unwrap();
        assert_eq!(w, PixelWindow { col_off: 2, row_off: 2, cols: 3, rows: 3 });
    }

    #[test]
    fn test_window_clipped_and_outside() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let w = gt.window(&BoundingBox::new(-5.0, -5.0, 2.5, 3.0), 10, 10).unwrap();
        assert_eq!((w.col_off, w.cols), (0, 3));
        assert_eq!((w.row_off, w.rows), (7, 3));

        assert!(gt.window(&BoundingBox::new(20.0, 20.0, 30.0, 30.0), 10, 10).is_none());
    }

    #[test]
    fn test_offset_and_approx_eq() {
        let gt = GeoTransform::new(0.0, 10.0, 2.0, -2.0);
        let sub = gt.offset(1, 2);
        assert_relative_eq!(sub.origin_x, 2.0);
        assert_relative_eq!(sub.origin_y, 6.0);
        assert!(gt.approx_eq(&GeoTransform::new(0.0, 10.0 + 1e-12, 2.0, -2.0)));
        assert!(!gt.approx_eq(&sub));
    }
}
