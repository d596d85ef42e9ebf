//! Scene pipeline
//!
//! Band loader → {index calculator, LST chain} → proximity engine →
//! feature table assembler. Each stage is a pure function of its inputs;
//! failures are tagged with the stage name.

use tracing::info;

use crate::imagery::{compute_indices, AlbedoCoefficients, IndexSet};
use crate::proximity::ProximitySpec;
use crate::scene::{apply_mask, mask_band_set, resample_bilinear, BandId, BandSet};
use crate::table::{assemble, FeatureTable};
use crate::thermal::{LstChain, LstParams, LstProducts};
use heatisle_core::raster::Raster;
use heatisle_core::{Result, StageContext, VectorLayer};

pub const LST_COLUMN: &str = "LST";
pub const NDVI_COLUMN: &str = "NDVI";
pub const NDBI_COLUMN: &str = "NDBI";
pub const NDWI_COLUMN: &str = "NDWI";
pub const ALBEDO_COLUMN: &str = "Albedo";
pub const ELEVATION_COLUMN: &str = "Elevation";
pub const MONTH_COLUMN: &str = "Month";

/// Everything one pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub indices: IndexSet,
    pub lst: LstProducts,
    /// Proximity and exposure grids, in configured order
    pub layers: Vec<(String, Raster<f64>)>,
    /// Elevation resampled onto the band grid
    pub elevation: Option<Raster<f64>>,
    /// Land mask on the band grid (1 = land)
    pub land_mask: Option<Raster<u8>>,
    pub table: FeatureTable,
}

/// Configured processing of one scene
#[derive(Debug, Clone)]
pub struct ScenePipeline {
    params: LstParams,
    albedo: AlbedoCoefficients,
    land: Option<VectorLayer>,
    layers: Vec<ProximitySpec>,
    elevation: Option<Raster<f64>>,
}

impl ScenePipeline {
    pub fn new(params: LstParams) -> Self {
        Self {
            params,
            albedo: AlbedoCoefficients::default(),
            land: None,
            layers: Vec::new(),
            elevation: None,
        }
    }

    pub fn with_albedo(mut self, coefficients: AlbedoCoefficients) -> Self {
        self.albedo = coefficients;
        self
    }

    /// Restrict every grid to the polygons of `land`
    pub fn with_land_mask(mut self, land: VectorLayer) -> Self {
        self.land = Some(land);
        self
    }

    pub fn with_layer(mut self, layer: ProximitySpec) -> Self {
        self.layers.push(layer);
        self
    }

    /// Elevation grid in any supported CRS, resampled onto the bands
    pub fn with_elevation(mut self, elevation: Raster<f64>) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn run(&self, bands: &BandSet) -> Result<PipelineOutput> {
        info!("processing scene {}", bands.meta().scene_id);
        let chain = LstChain::new(self.params).stage("configuration")?;

        let (bands, land_mask) = match &self.land {
            Some(land) => {
                let (masked, mask) = mask_band_set(bands, land).stage("land mask")?;
                (masked, Some(mask))
            }
            None => (bands.clone(), None),
        };

        let indices = compute_indices(&bands, &self.albedo).stage("spectral indices")?;
        info!("spectral indices: {} valid NDVI cells", indices.ndvi.valid_count());

        let thermal = bands.get(BandId::B10).stage("lst chain")?;
        let lst = chain.run(thermal, &indices.ndvi).stage("lst chain")?;

        let template = bands.template();
        let mut layers = Vec::with_capacity(self.layers.len());
        for spec in &self.layers {
            let grid = spec
                .build(template, land_mask.as_ref())
                .stage("proximity layers")?;
            layers.push((spec.name.clone(), grid));
        }

        let elevation = match &self.elevation {
            Some(dem) => {
                let resampled = resample_bilinear(dem, template).stage("elevation")?;
                let resampled = match &land_mask {
                    Some(mask) => apply_mask(&resampled, mask).stage("elevation")?,
                    None => resampled,
                };
                info!("elevation: {} valid cells", resampled.valid_count());
                Some(resampled)
            }
            None => None,
        };

        let mut columns: Vec<(&str, &Raster<f64>)> = vec![
            (LST_COLUMN, &lst.lst),
            (NDVI_COLUMN, &indices.ndvi),
            (NDBI_COLUMN, &indices.ndbi),
            (NDWI_COLUMN, &indices.ndwi),
            (ALBEDO_COLUMN, &indices.albedo),
        ];
        for (name, grid) in &layers {
            columns.push((name.as_str(), grid));
        }
        if let Some(dem) = &elevation {
            columns.push((ELEVATION_COLUMN, dem));
        }
        let mut table = assemble(&columns).stage("feature table")?;
        if let Some(month) = bands.meta().month_label() {
            table = table.with_label(MONTH_COLUMN, month);
        }

        Ok(PipelineOutput {
            indices,
            lst,
            layers,
            elevation,
            land_mask,
            table,
        })
    }
}
