//! Land/sea masking of band and derived grids

use ndarray::Zip;
use tracing::debug;

use super::bands::BandSet;
use crate::proximity::rasterize;
use heatisle_core::raster::{Raster, RasterElement, NODATA};
use heatisle_core::{Result, VectorLayer};

/// Burn the land polygons onto `template`: 1 on land, 0 elsewhere
pub fn land_mask<T: RasterElement>(land: &VectorLayer, template: &Raster<T>) -> Result<Raster<u8>> {
    let mask = rasterize(land, template, 1u8, 0u8)?;
    debug!(
        "land mask '{}': {} of {} cells on land",
        land.tag(),
        mask.data().iter().filter(|&&v| v != 0).count(),
        mask.len()
    );
    Ok(mask)
}

/// Copy of `grid` with every cell outside the mask's foreground set to no-data
pub fn apply_mask(grid: &Raster<f64>, mask: &Raster<u8>) -> Result<Raster<f64>> {
    grid.ensure_aligned(mask)?;
    let mut data = grid.data().clone();
    let nodata = grid.nodata();
    Zip::from(&mut data).and(mask.data()).for_each(|v, &m| {
        if m == 0 || !v.is_valid(nodata) {
            *v = NODATA;
        }
    });
    grid.with_data(data, Some(NODATA))
}

/// Mask every band of a scene to the land polygons
pub fn mask_band_set(bands: &BandSet, land: &VectorLayer) -> Result<(BandSet, Raster<u8>)> {
    let mask = land_mask(land, bands.template())?;
    let masked = bands.map_bands(|band| apply_mask(band, &mask))?;
    Ok((masked, mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BandId, SceneMeta};
    use geo::{polygon, Polygon};
    use heatisle_core::GeoTransform;

    fn grid(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(4, 4, value);
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        r.set_nodata(Some(NODATA));
        r
    }

    fn left_half() -> VectorLayer {
        let poly: Polygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 4.0),
            (x: 0.0, y: 4.0),
        ];
        VectorLayer::from_geometries("land", None, vec![poly])
    }

    #[test]
    fn test_apply_mask() {
        let g = grid(5.0);
        let mask = land_mask(&left_half(), &g).unwrap();
        let out = apply_mask(&g, &mask).unwrap();
        for row in 0..4 {
            assert_eq!(out.cell(row, 0), Some(5.0));
            assert_eq!(out.cell(row, 1), Some(5.0));
            assert_eq!(out.cell(row, 2), None);
            assert_eq!(out.cell(row, 3), None);
        }
    }

    #[test]
    fn test_mask_band_set() {
        let set = BandSet::from_bands(
            SceneMeta::new("s"),
            vec![(BandId::B4, grid(1.0)), (BandId::B5, grid(2.0))],
        )
        .unwrap();
        let (masked, mask) = mask_band_set(&set, &left_half()).unwrap();
        assert_eq!(mask.get(0, 0).unwrap(), 1);
        assert_eq!(masked.get(BandId::B5).unwrap().valid_count(), 8);
        assert_eq!(masked.meta().scene_id, "s");
        // source bands are untouched
        assert_eq!(set.get(BandId::B5).unwrap().valid_count(), 16);
    }
}
