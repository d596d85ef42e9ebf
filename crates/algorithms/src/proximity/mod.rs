//! Proximity and exposure layers from vector features
//!
//! - Rasterization of points, lines and polygons onto a template grid
//! - Exact Euclidean distance transform (coast distance, road distance)
//! - Gaussian kernel density (tourism and building exposure)
//! - Standardization and min-max rescaling

mod density;
mod distance;
mod normalize;
mod rasterize;

pub use density::{kernel_density, KernelDensityParams};
pub use distance::distance_transform;
pub use normalize::{min_max_normalize, standardize, Normalization};
pub use rasterize::rasterize;

use tracing::info;

use crate::scene::apply_mask;
use heatisle_core::raster::{Raster, RasterElement};
use heatisle_core::{Result, VectorLayer};

/// How a vector layer becomes a table column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProximityKind {
    /// Distance to the nearest feature, in projected units
    Distance,
    /// Gaussian kernel density of feature presence
    Density(KernelDensityParams),
}

/// One auxiliary column: a named vector layer and how to turn it into a grid
#[derive(Debug, Clone)]
pub struct ProximitySpec {
    pub name: String,
    pub layer: VectorLayer,
    pub kind: ProximityKind,
    pub normalization: Normalization,
}

impl ProximitySpec {
    /// Distance layer kept in metres
    pub fn distance(name: impl Into<String>, layer: VectorLayer) -> Self {
        Self {
            name: name.into(),
            layer,
            kind: ProximityKind::Distance,
            normalization: Normalization::None,
        }
    }

    /// Density layer standardized over land cells
    pub fn density(name: impl Into<String>, layer: VectorLayer, params: KernelDensityParams) -> Self {
        Self {
            name: name.into(),
            layer,
            kind: ProximityKind::Density(params),
            normalization: Normalization::Standardize,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Build the grid on `template`, masked to `mask` when given
    pub fn build<T: RasterElement>(
        &self,
        template: &Raster<T>,
        mask: Option<&Raster<u8>>,
    ) -> Result<Raster<f64>> {
        let raw = match self.kind {
            ProximityKind::Distance => proximity_layer(&self.layer, template, mask)?,
            ProximityKind::Density(params) => density_layer(&self.layer, template, mask, params)?,
        };
        let out = self.normalization.apply(&raw)?;
        info!(
            "layer '{}' ({:?}, {:?}): {} valid cells",
            self.name,
            self.kind,
            self.normalization,
            out.valid_count()
        );
        Ok(out)
    }
}

fn masked(grid: Raster<f64>, mask: Option<&Raster<u8>>) -> Result<Raster<f64>> {
    match mask {
        Some(mask) => apply_mask(&grid, mask),
        None => Ok(grid),
    }
}

/// Distance from every cell to the nearest feature of `layer`, masked to land
pub fn proximity_layer<T: RasterElement>(
    layer: &VectorLayer,
    template: &Raster<T>,
    mask: Option<&Raster<u8>>,
) -> Result<Raster<f64>> {
    let binary = rasterize(layer, template, 1u8, 0u8)?;
    masked(distance_transform(&binary)?, mask)
}

fn density_layer<T: RasterElement>(
    layer: &VectorLayer,
    template: &Raster<T>,
    mask: Option<&Raster<u8>>,
    params: KernelDensityParams,
) -> Result<Raster<f64>> {
    let binary = rasterize(layer, template, 1u8, 0u8)?;
    masked(kernel_density(&binary, params)?, mask)
}

/// Kernel density of `layer`, masked to land and standardized
pub fn exposure_layer<T: RasterElement>(
    layer: &VectorLayer,
    template: &Raster<T>,
    mask: Option<&Raster<u8>>,
    params: KernelDensityParams,
) -> Result<Raster<f64>> {
    standardize(&density_layer(layer, template, mask, params)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{line_string, point, polygon, MultiPoint};
    use heatisle_core::GeoTransform;

    fn template() -> Raster<f64> {
        let mut r: Raster<f64> = Raster::new(20, 20);
        r.set_transform(GeoTransform::new(0.0, 600.0, 30.0, -30.0));
        r
    }

    fn land_mask() -> Raster<u8> {
        let land = VectorLayer::from_geometries(
            "land",
            None,
            vec![polygon![(x: 0.0, y: 0.0), (x: 450.0, y: 0.0), (x: 450.0, y: 600.0), (x: 0.0, y: 600.0)]],
        );
        rasterize(&land, &template(), 1u8, 0u8).unwrap()
    }

    #[test]
    fn test_proximity_layer_masked() {
        let coast = VectorLayer::from_geometries(
            "coastline",
            None,
            vec![line_string![(x: 450.0, y: 0.0), (x: 450.0, y: 600.0)]],
        );
        let mask = land_mask();
        let out = proximity_layer(&coast, &template(), Some(&mask)).unwrap();

        // 15 land columns, coast burned into column 15 (sea side)
        assert_eq!(out.valid_count(), 20 * 15);
        assert_relative_eq!(out.cell(5, 14).unwrap(), 30.0, epsilon = 1e-9);
        assert_relative_eq!(out.cell(5, 0).unwrap(), 15.0 * 30.0, epsilon = 1e-9);
        assert_eq!(out.cell(5, 16), None);
    }

    #[test]
    fn test_exposure_layer_is_standardized() {
        let points = MultiPoint::new(vec![
            point!(x: 100.0, y: 100.0),
            point!(x: 120.0, y: 130.0),
            point!(x: 300.0, y: 400.0),
            point!(x: 50.0, y: 500.0),
        ]);
        let tourism = VectorLayer::from_geometries("tourism", None, vec![points]);
        let mask = land_mask();
        let out = exposure_layer(&tourism, &template(), Some(&mask), KernelDensityParams::new(3))
            .unwrap();

        let (mean, std) = out.valid_mean_std().unwrap();
        assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
        assert_relative_eq!(std, 1.0, epsilon = 1e-9);
        assert_eq!(out.valid_count(), 20 * 15);
    }

    #[test]
    fn test_spec_build_min_max() {
        let roads = VectorLayer::from_geometries(
            "roads",
            None,
            vec![line_string![(x: 0.0, y: 300.0), (x: 600.0, y: 300.0)]],
        );
        let spec = ProximitySpec::distance("DistRoad", roads).with_normalization(Normalization::MinMax);
        let out = spec.build(&template(), None).unwrap();
        let (lo, hi) = out.valid_extrema().unwrap();
        assert_eq!(lo, 0.0);
        assert_relative_eq!(hi, 1.0);
    }
}
