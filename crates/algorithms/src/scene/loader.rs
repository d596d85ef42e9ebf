//! Band loading: read, crop and normalise the no-data sentinel

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::bands::{BandId, BandSet, SceneMeta};
use heatisle_core::io::read_geotiff;
use heatisle_core::raster::{Raster, NODATA};
use heatisle_core::{BoundingBox, Error, Result};

/// Landsat Collection 2 marks fill pixels with DN 0 when no GDAL_NODATA tag is set
const LANDSAT_FILL_DN: f64 = 0.0;

/// Where the band files of one scene live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenePaths {
    pub meta: SceneMeta,
    pub bands: BTreeMap<BandId, PathBuf>,
    /// Landsat `*_MTL.txt` metadata file, if found
    pub mtl: Option<PathBuf>,
}

impl ScenePaths {
    pub fn new(meta: SceneMeta) -> Self {
        Self {
            meta,
            ..Default::default()
        }
    }

    pub fn with_band(mut self, id: BandId, path: impl Into<PathBuf>) -> Self {
        self.bands.insert(id, path.into());
        self
    }

    /// Collect band files from a Landsat product directory.
    ///
    /// Matches `<product id>_B<n>.TIF` names (case-insensitive extension) and
    /// `<product id>_MTL.txt`. The acquisition date is taken from the fourth
    /// field of the product id, e.g. `LC08_L1TP_217076_20230814_..`.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = ScenePaths::default();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with("_MTL.txt") {
                paths.mtl = Some(path.clone());
                continue;
            }
            if let Some((product, band)) = parse_band_file_name(name) {
                if paths.meta.scene_id.is_empty() {
                    paths.meta.scene_id = product.to_string();
                    paths.meta.acquired = acquisition_date(product);
                }
                paths.bands.insert(band, path.clone());
            }
        }

        if paths.bands.is_empty() {
            return Err(Error::InvalidParameter {
                name: "scene_dir",
                value: dir.display().to_string(),
                reason: "no *_B<n>.TIF band files found".into(),
            });
        }
        debug!(
            "discovered scene {} with bands {:?}",
            paths.meta.scene_id,
            paths.bands.keys().collect::<Vec<_>>()
        );
        Ok(paths)
    }
}

fn parse_band_file_name(name: &str) -> Option<(&str, BandId)> {
    let (stem, ext) = name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case("tif") && !ext.eq_ignore_ascii_case("tiff") {
        return None;
    }
    let (product, band) = stem.rsplit_once('_')?;
    if !band.starts_with('B') {
        return None;
    }
    let id = band.parse::<BandId>().ok()?;
    Some((product, id))
}

fn acquisition_date(product_id: &str) -> Option<String> {
    let field = product_id.split('_').nth(3)?;
    if field.len() != 8 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}-{}", &field[0..4], &field[4..6], &field[6..8]))
}

/// Read one band, crop it to `bbox` and rewrite invalid cells as [`NODATA`].
pub fn load_band<P: AsRef<Path>>(path: P, bbox: Option<&BoundingBox>) -> Result<Raster<f64>> {
    let mut raster: Raster<f64> = read_geotiff(path.as_ref())?;
    if raster.nodata().is_none() {
        raster.set_nodata(Some(LANDSAT_FILL_DN));
    }
    let raster = match bbox {
        Some(bbox) => raster.crop(bbox)?,
        None => raster,
    };
    Ok(normalize_nodata(&raster))
}

/// Copy of `raster` where every invalid cell holds [`NODATA`]
pub fn normalize_nodata(raster: &Raster<f64>) -> Raster<f64> {
    let mut out = raster.clone();
    let nodata = raster.nodata();
    out.data_mut().mapv_inplace(|v| {
        if v.is_finite() && nodata.is_none_or(|nd| v != nd) {
            v
        } else {
            NODATA
        }
    });
    out.set_nodata(Some(NODATA));
    out
}

/// Load every band of a scene, cropped to `bbox`.
///
/// All bands must share one grid after cropping; a box entirely outside a
/// band's extent fails with [`Error::OutOfBounds`].
pub fn load(paths: &ScenePaths, bbox: Option<&BoundingBox>) -> Result<BandSet> {
    let mut bands = Vec::with_capacity(paths.bands.len());
    for (id, path) in &paths.bands {
        let raster = load_band(path, bbox)?;
        debug!(
            "{} {}: {} x {}, {} valid cells",
            id,
            path.display(),
            raster.cols(),
            raster.rows(),
            raster.valid_count()
        );
        bands.push((*id, raster));
    }

    let set = BandSet::from_bands(paths.meta.clone(), bands)?;
    let (rows, cols) = set.template().shape();
    info!(
        "loaded scene {} ({} bands, {} x {})",
        paths.meta.scene_id,
        paths.bands.len(),
        cols,
        rows
    );
    Ok(set)
}
