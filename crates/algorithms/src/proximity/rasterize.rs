//! Burn vector geometries onto a grid

use geo::{Coord, Geometry, LineString, Polygon};
use ndarray::Array2;
use tracing::debug;

use heatisle_core::crs::CoordinateTransform;
use heatisle_core::raster::{Raster, RasterElement};
use heatisle_core::{Result, VectorLayer};

/// Burn `layer` onto the cell layout of `template`.
///
/// - Points burn the cell that contains them.
/// - Lines burn every cell they pass through (grid traversal, Amanatides & Woo).
/// - Polygons burn every cell whose centre is inside (even-odd rule, so
///   holes stay `bg`).
///
/// A layer in another supported CRS (WGS84 or a UTM zone) is projected
/// into the template CRS first. The output carries no no-data value.
pub fn rasterize<T, U>(layer: &VectorLayer, template: &Raster<U>, fg: T, bg: T) -> Result<Raster<T>>
where
    T: RasterElement,
    U: RasterElement,
{
    layer.ensure_non_empty()?;
    let transform = match (layer.crs(), template.crs()) {
        (Some(from), Some(to)) => from.transform_to(to)?,
        _ => CoordinateTransform::Identity,
    };

    let mut burner = Burner {
        template_transform: *template.transform(),
        transform,
        grid: Array2::from_elem(template.shape(), bg),
        fg,
        burned: 0,
    };
    for geometry in layer.geometries() {
        burner.geometry(geometry);
    }
    debug!(
        "rasterized '{}' ({} features): {} cells burned",
        layer.tag(),
        layer.len(),
        burner.burned
    );

    template.with_data(burner.grid, None)
}

struct Burner<T> {
    template_transform: heatisle_core::GeoTransform,
    transform: CoordinateTransform,
    grid: Array2<T>,
    fg: T,
    burned: usize,
}

impl<T: RasterElement> Burner<T> {
    /// World coordinate → fractional (col, row) on the template grid
    fn to_pixel(&self, c: Coord<f64>) -> (f64, f64) {
        let (x, y) = self.transform.apply(c.x, c.y);
        self.template_transform.geo_to_pixel(x, y)
    }

    fn burn(&mut self, col: f64, row: f64) {
        if col.is_finite() && row.is_finite() {
            self.burn_cell(row.floor() as i64, col.floor() as i64);
        }
    }

    fn burn_cell(&mut self, row: i64, col: i64) {
        let (rows, cols) = self.grid.dim();
        if (0..rows as i64).contains(&row) && (0..cols as i64).contains(&col) {
            self.grid[(row as usize, col as usize)] = self.fg;
            self.burned += 1;
        }
    }

    fn geometry(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(p) => {
                let (c, r) = self.to_pixel(p.0);
                self.burn(c, r);
            }
            Geometry::MultiPoint(mp) => {
                for p in mp {
                    let (c, r) = self.to_pixel(p.0);
                    self.burn(c, r);
                }
            }
            Geometry::Line(line) => self.segment(line.start, line.end),
            Geometry::LineString(ls) => self.line_string(ls),
            Geometry::MultiLineString(mls) => {
                for ls in mls {
                    self.line_string(ls);
                }
            }
            Geometry::Polygon(poly) => self.polygon(poly),
            Geometry::MultiPolygon(mp) => {
                for poly in mp {
                    self.polygon(poly);
                }
            }
            Geometry::Rect(rect) => self.polygon(&rect.to_polygon()),
            Geometry::Triangle(tri) => self.polygon(&tri.to_polygon()),
            Geometry::GeometryCollection(gc) => {
                for g in gc {
                    self.geometry(g);
                }
            }
        }
    }

    fn line_string(&mut self, ls: &LineString<f64>) {
        if ls.0.len() == 1 {
            let (c, r) = self.to_pixel(ls.0[0]);
            self.burn(c, r);
        }
        for line in ls.lines() {
            self.segment(line.start, line.end);
        }
    }

    /// Visit every cell the segment passes through, stepping across one
    /// cell boundary at a time.
    fn segment(&mut self, a: Coord<f64>, b: Coord<f64>) {
        let Some(((c0, r0), (c1, r1))) = self.clip(self.to_pixel(a), self.to_pixel(b)) else {
            return;
        };
        let (mut col, mut row) = (c0.floor() as i64, r0.floor() as i64);
        let (end_col, end_row) = (c1.floor() as i64, r1.floor() as i64);
        let (step_c, mut next_c, delta_c) = boundary_steps(c0, c1 - c0);
        let (step_r, mut next_r, delta_r) = boundary_steps(r0, r1 - r0);

        self.burn_cell(row, col);
        for _ in 0..(end_col - col).abs() + (end_row - row).abs() {
            if col == end_col && row == end_row {
                break;
            }
            if next_c < next_r {
                col += step_c;
                next_c += delta_c;
            } else if next_r < next_c {
                row += step_r;
                next_r += delta_r;
            } else {
                // Exactly through a corner
                col += step_c;
                row += step_r;
                next_c += delta_c;
                next_r += delta_r;
            }
            self.burn_cell(row, col);
        }
    }

    /// Liang-Barsky clip of a pixel-space segment to the grid rectangle
    fn clip(&self, (c0, r0): (f64, f64), (c1, r1): (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        if ![c0, r0, c1, r1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let (rows, cols) = self.grid.dim();
        let (dc, dr) = (c1 - c0, r1 - r0);
        let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
        for (p, q) in [(-dc, c0), (dc, cols as f64 - c0), (-dr, r0), (dr, rows as f64 - r0)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
            } else if p < 0.0 {
                t0 = t0.max(q / p);
            } else {
                t1 = t1.min(q / p);
            }
        }
        if t0 > t1 {
            return None;
        }
        Some(((c0 + t0 * dc, r0 + t0 * dr), (c0 + t1 * dc, r0 + t1 * dr)))
    }

    fn polygon(&mut self, poly: &Polygon<f64>) {
        let rings: Vec<Vec<(f64, f64)>> = std::iter::once(poly.exterior())
            .chain(poly.interiors())
            .map(|ring| ring.0.iter().map(|&c| self.to_pixel(c)).collect())
            .collect();

        let (row_lo, row_hi) = rings
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, r)| {
                (lo.min(r), hi.max(r))
            });
        if !(row_lo.is_finite() && row_hi.is_finite()) {
            return;
        }
        let (rows, cols) = self.grid.dim();
        let first = row_lo.floor().max(0.0) as usize;
        let last = (row_hi.ceil().max(0.0) as usize).min(rows);

        let mut crossings = Vec::new();
        for row in first..last {
            let y = row as f64 + 0.5;
            crossings.clear();
            for ring in &rings {
                for edge in ring.windows(2) {
                    let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
                    if (y0 <= y && y < y1) || (y1 <= y && y < y0) {
                        crossings.push(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
                    }
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for pair in crossings.chunks_exact(2) {
                // Cells whose centre c + 0.5 lies in [x_in, x_out)
                let start = (pair[0] - 0.5).ceil().max(0.0) as usize;
                let end = ((pair[1] - 0.5).ceil().max(0.0) as usize).min(cols);
                for col in start..end {
                    self.grid[(row, col)] = self.fg;
                    self.burned += 1;
                }
            }
        }
    }
}

/// Cell step direction, parameter of the first boundary crossing and
/// parameter spacing between crossings along one axis (t runs 0..1).
fn boundary_steps(start: f64, delta: f64) -> (i64, f64, f64) {
    if delta > 0.0 {
        (1, (start.floor() + 1.0 - start) / delta, 1.0 / delta)
    } else if delta < 0.0 {
        (-1, (start - start.floor()) / -delta, -1.0 / delta)
    } else {
        (0, f64::INFINITY, f64::INFINITY)
    }
}
