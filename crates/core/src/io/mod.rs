//! I/O for band rasters and vector feature layers

mod geojson;
mod native;

pub use geojson::{parse_geojson, read_geojson};
pub use native::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
