//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;

pub use element::{RasterElement, NODATA};
pub use geotransform::{GeoTransform, PixelWindow};
pub use grid::{Raster, RasterStatistics};
