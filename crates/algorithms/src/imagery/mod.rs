//! Imagery analysis algorithms
//!
//! - Band math: cell-by-cell raster algebra with explicit no-data handling
//! - Spectral indices: NDVI, NDBI, NDWI, broadband albedo

mod band_math;
mod indices;

pub use band_math::{band_math, cellwise, safe_div};
pub use indices::{
    albedo, compute_indices, ndbi, ndvi, ndwi, normalized_difference, AlbedoBands,
    AlbedoCoefficients, IndexSet,
};
