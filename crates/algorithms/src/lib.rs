//! # heatisle algorithms
//!
//! Land surface temperature and feature-table algorithms for heatisle.
//!
//! ## Modules
//!
//! - **scene**: band loading, cropping, resampling and land masking
//! - **imagery**: band math and spectral indices (NDVI, NDBI, NDWI, albedo)
//! - **thermal**: DN → radiance → brightness temperature → emissivity → LST
//! - **proximity**: rasterization, distance transform, kernel density
//! - **table**: complete-case feature table assembly and CSV output
//! - **pipeline**: the scene pipeline wiring all of the above

pub mod imagery;
pub mod pipeline;
pub mod proximity;
pub mod scene;
pub mod table;
pub mod thermal;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        albedo, band_math, compute_indices, ndbi, ndvi, ndwi, normalized_difference,
        AlbedoBands, AlbedoCoefficients, IndexSet,
    };
    pub use crate::pipeline::{PipelineOutput, ScenePipeline};
    pub use crate::proximity::{
        distance_transform, exposure_layer, kernel_density, proximity_layer, rasterize,
        standardize, KernelDensityParams, Normalization, ProximityKind, ProximitySpec,
    };
    pub use crate::scene::{
        apply_mask, load, mask_band_set, resample_bilinear, BandId, BandSet, SceneMeta,
        ScenePaths,
    };
    pub use crate::table::{assemble, AssemblyReport, FeatureTable};
    pub use crate::thermal::{
        EmissivityParams, LstChain, LstParams, LstProducts, ThermalCalibration,
    };
    pub use heatisle_core::prelude::*;
}
