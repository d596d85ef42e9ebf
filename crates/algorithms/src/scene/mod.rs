//! Band loader and aligner
//!
//! Loads Landsat band GeoTIFFs into a co-registered [`BandSet`], crops them
//! to a bounding box, resamples auxiliary grids (elevation) onto the band
//! grid and masks everything to land.

mod bands;
mod loader;
mod mask;
mod resample;

pub use bands::{BandId, BandSet, SceneMeta};
pub use loader::{load, load_band, normalize_nodata, ScenePaths};
pub use mask::{apply_mask, land_mask, mask_band_set};
pub use resample::resample_bilinear;
