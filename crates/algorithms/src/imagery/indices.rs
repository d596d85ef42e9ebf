//! Spectral indices for Landsat 8 OLI reflectance bands
//!
//! All indices operate on single-band rasters (one band per raster) and
//! propagate no-data: if any operand is invalid at a cell, so is the output.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::band_math::{cellwise, safe_div};
use crate::scene::{BandId, BandSet};
use heatisle_core::raster::Raster;
use heatisle_core::Result;

/// `(a - b) / (a + b)` per cell.
///
/// Bounded to [-1, 1] for non-negative reflectance. A zero denominator or an
/// invalid operand gives no-data.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    cellwise(&[band_a, band_b], |v| safe_div(v[0] - v[1], v[0] + v[1]))
}

/// Vegetation index `(B5 - B4) / (B5 + B4)`
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// Built-up index `(B6 - B5) / (B6 + B5)` (Zha et al., 2003).
///
/// Impervious and bare surfaces come out positive.
pub fn ndbi(swir1: &Raster<f64>, nir: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(swir1, nir)
}

/// Water index in its green / SWIR2 form, `(B3 - B7) / (B3 + B7)`
pub fn ndwi(green: &Raster<f64>, swir2: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(green, swir2)
}

// ---------------------------------------------------------------------------
// Albedo
// ---------------------------------------------------------------------------

/// Narrow-to-broadband albedo coefficients for OLI bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlbedoCoefficients {
    pub blue: f64,
    pub red: f64,
    pub nir: f64,
    pub swir1: f64,
    pub swir2: f64,
    pub offset: f64,
    pub scale: f64,
}

impl Default for AlbedoCoefficients {
    fn default() -> Self {
        Self {
            blue: 0.356,
            red: 0.0130,
            nir: 0.373,
            swir1: 0.085,
            swir2: 0.072,
            offset: 0.0018,
            scale: 1.016,
        }
    }
}

/// The five distinct bands the albedo formula reads
#[derive(Debug, Clone, Copy)]
pub struct AlbedoBands<'a> {
    pub blue: &'a Raster<f64>,
    pub red: &'a Raster<f64>,
    pub nir: &'a Raster<f64>,
    pub swir1: &'a Raster<f64>,
    pub swir2: &'a Raster<f64>,
}

/// Broadband surface albedo
///
/// `Albedo = (c_b·B2 + c_r·B4 + c_n·B5 + c_s1·B6 + c_s2·B7 - offset) / scale`
///
/// With the default coefficients:
/// `(0.356·B2 + 0.0130·B4 + 0.373·B5 + 0.085·B6 + 0.072·B7 − 0.0018) / 1.016`
pub fn albedo(bands: AlbedoBands<'_>, coeffs: &AlbedoCoefficients) -> Result<Raster<f64>> {
    let c = *coeffs;
    cellwise(
        &[bands.blue, bands.red, bands.nir, bands.swir1, bands.swir2],
        move |v| {
            let weighted = c.blue * v[0] + c.red * v[1] + c.nir * v[2] + c.swir1 * v[3]
                + c.swir2 * v[4]
                - c.offset;
            safe_div(weighted, c.scale)
        },
    )
}

// ---------------------------------------------------------------------------
// All indices of one scene
// ---------------------------------------------------------------------------

/// NDVI, NDBI, NDWI and albedo of one scene, all on the band grid
#[derive(Debug, Clone)]
pub struct IndexSet {
    pub ndvi: Raster<f64>,
    pub ndbi: Raster<f64>,
    pub ndwi: Raster<f64>,
    pub albedo: Raster<f64>,
}

/// Compute every spectral index the feature table needs from one band set
pub fn compute_indices(bands: &BandSet, coeffs: &AlbedoCoefficients) -> Result<IndexSet> {
    let b2 = bands.get(BandId::B2)?;
    let b3 = bands.get(BandId::B3)?;
    let b4 = bands.get(BandId::B4)?;
    let b5 = bands.get(BandId::B5)?;
    let b6 = bands.get(BandId::B6)?;
    let b7 = bands.get(BandId::B7)?;

    let set = IndexSet {
        ndvi: ndvi(b5, b4)?,
        ndbi: ndbi(b6, b5)?,
        ndwi: ndwi(b3, b7)?,
        albedo: albedo(
            AlbedoBands {
                blue: b2,
                red: b4,
                nir: b5,
                swir1: b6,
                swir2: b7,
            },
            coeffs,
        )?,
    };
    debug!(
        "indices computed: {} valid NDVI cells of {}",
        set.ndvi.valid_count(),
        set.ndvi.len()
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatisle_core::{Error, GeoTransform, RasterElement, NODATA};

    fn grid(rows: usize, cols: usize, values: &[f64]) -> Raster<f64> {
        let mut r = Raster::from_vec(values.to_vec(), rows, cols).unwrap();
        r.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 30.0, -30.0));
        r.set_nodata(Some(NODATA));
        r
    }

    fn constant(value: f64) -> Raster<f64> {
        grid(3, 3, &[value; 9])
    }

    fn five_bands(values: [f64; 5]) -> [Raster<f64>; 5] {
        values.map(constant)
    }

    #[test]
    fn test_normalized_difference_stays_in_unit_range() {
        let a: Vec<f64> = (0..64).map(|i| i as f64 / 64.0).collect();
        let b: Vec<f64> = (0..64).map(|i| 1.0 - i as f64 / 80.0).collect();
        let nd = normalized_difference(&grid(8, 8, &a), &grid(8, 8, &b)).unwrap();
        assert!(nd
            .data()
            .iter()
            .filter(|v| v.is_valid(nd.nodata()))
            .all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_ndvi_two_by_two_scenario() {
        // Last cell has B5 = B4 = 0
        let red = grid(2, 2, &[10.0, 20.0, 10.0, 0.0]);
        let nir = grid(2, 2, &[30.0, 40.0, 30.0, 0.0]);

        let out = ndvi(&nir, &red).unwrap();

        assert!((out.cell(0, 0).unwrap() - 0.5).abs() < 1e-12);
        assert!((out.cell(0, 1).unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!((out.cell(1, 0).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(out.cell(1, 1), None);
        assert_eq!(out.get(1, 1).unwrap(), NODATA);
    }

    #[test]
    fn test_ndvi_equal_bands_is_zero() {
        let out = ndvi(&constant(1.0), &constant(1.0)).unwrap();
        assert_eq!(out.cell(1, 1), Some(0.0));
    }

    #[test]
    fn test_ndvi_sign_separates_water_from_vegetation() {
        let water = ndvi(&constant(0.04), &constant(0.12)).unwrap();
        let canopy = ndvi(&constant(0.45), &constant(0.05)).unwrap();
        assert!(water.cell(0, 0).unwrap() < 0.0);
        assert!(canopy.cell(0, 0).unwrap() > 0.7);
    }

    #[test]
    fn test_ndbi_and_ndwi_band_order() {
        let built = ndbi(&constant(0.3), &constant(0.2)).unwrap();
        assert!((built.cell(2, 2).unwrap() - 0.2).abs() < 1e-12);

        let wet = ndwi(&constant(0.3), &constant(0.1)).unwrap();
        assert!((wet.cell(2, 2).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_albedo_default_coefficients() {
        let [blue, red, nir, swir1, swir2] = five_bands([0.1, 0.2, 0.3, 0.4, 0.5]);
        let bands = AlbedoBands { blue: &blue, red: &red, nir: &nir, swir1: &swir1, swir2: &swir2 };

        let out = albedo(bands, &AlbedoCoefficients::default()).unwrap();

        let expected =
            (0.356 * 0.1 + 0.0130 * 0.2 + 0.373 * 0.3 + 0.085 * 0.4 + 0.072 * 0.5 - 0.0018) / 1.016;
        assert!((out.cell(1, 1).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_albedo_propagates_nodata_from_any_band() {
        let [blue, red, nir, swir1, mut swir2] = five_bands([0.1, 0.2, 0.3, 0.4, 0.5]);
        swir2.set(0, 2, NODATA).unwrap();
        let bands = AlbedoBands { blue: &blue, red: &red, nir: &nir, swir1: &swir1, swir2: &swir2 };

        let out = albedo(bands, &AlbedoCoefficients::default()).unwrap();
        assert_eq!(out.cell(0, 2), None);
        assert!(out.cell(0, 1).is_some());
    }

    #[test]
    fn test_misaligned_bands_rejected() {
        let a = grid(2, 3, &[0.1; 6]);
        let b = grid(3, 2, &[0.1; 6]);
        assert!(matches!(normalized_difference(&a, &b), Err(Error::SizeMismatch { .. })));
    }
}
