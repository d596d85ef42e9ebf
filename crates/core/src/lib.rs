//! # heatisle core
//!
//! Core types and I/O for the heatisle land-surface-temperature workspace.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid with an explicit no-data sentinel
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference systems, with WGS84 ↔ UTM transforms
//! - `BoundingBox`: scene crop extents
//! - `VectorLayer`: tagged feature collections burned onto grids
//! - GeoTIFF and GeoJSON readers/writers

pub mod bbox;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use bbox::BoundingBox;
pub use crs::CRS;
pub use error::{Error, Result, StageContext};
pub use raster::{GeoTransform, Raster, RasterElement, NODATA};
pub use vector::{Feature, VectorLayer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bbox::BoundingBox;
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result, StageContext};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, NODATA};
    pub use crate::vector::{Feature, VectorLayer};
}
