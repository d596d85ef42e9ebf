//! YAML run configuration for `heatisle run`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use heatisle_algorithms::imagery::AlbedoCoefficients;
use heatisle_algorithms::proximity::{KernelDensityParams, Normalization};
use heatisle_algorithms::scene::{BandId, SceneMeta, ScenePaths};
use heatisle_algorithms::thermal::{
    EmissivityParams, LstParams, ThermalCalibration, DEFAULT_WAVELENGTH,
};
use heatisle_core::{BoundingBox, Error, Result, CRS};

/// Full run configuration loaded from YAML
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub scene: SceneSection,

    /// Thermal calibration; taken from the scene's MTL file when omitted
    #[serde(default)]
    pub calibration: Option<CalibrationSection>,

    #[serde(default)]
    pub emissivity: EmissivityParams,

    /// Effective thermal wavelength in metres
    #[serde(default = "default_wavelength")]
    pub wavelength: f64,

    #[serde(default)]
    pub albedo: AlbedoCoefficients,

    /// CRS of GeoJSON files without a `crs` member (default EPSG:4326)
    #[serde(default)]
    pub vector_crs: Option<String>,

    /// GeoJSON polygons of the land area
    #[serde(default)]
    pub land_mask: Option<PathBuf>,

    /// Elevation GeoTIFF
    #[serde(default)]
    pub elevation: Option<PathBuf>,

    #[serde(default)]
    pub layers: Vec<LayerSection>,

    pub output: OutputSection,

    #[serde(default)]
    pub filter: Option<FilterSection>,
}

fn default_wavelength() -> f64 {
    DEFAULT_WAVELENGTH
}

/// Scene band files, either a Landsat product directory or explicit paths
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSection {
    pub dir: Option<PathBuf>,
    pub bands: BTreeMap<BandId, PathBuf>,
    pub scene_id: Option<String>,
    /// Acquisition date, `YYYY-MM-DD`
    pub acquired: Option<String>,
    /// Label for the `Month` column
    pub month: Option<String>,
    /// `[min_x, min_y, max_x, max_y]` in the scene CRS
    pub bbox: Option<[f64; 4]>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalibrationSection {
    Mtl { mtl: PathBuf },
    Inline(ThermalCalibration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Distance,
    Density,
}

/// One proximity or exposure column
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerSection {
    /// Column name in the output table
    pub name: String,
    /// GeoJSON file with the features
    pub path: PathBuf,
    pub kind: LayerKind,
    /// Kernel radius in cells (density only)
    #[serde(default = "default_radius")]
    pub radius: usize,
    #[serde(default)]
    pub sigma: Option<f64>,
    /// Defaults to none for distances and standardize for densities
    #[serde(default)]
    pub normalization: Option<Normalization>,
}

fn default_radius() -> usize {
    KernelDensityParams::default().radius
}

impl LayerSection {
    pub fn density_params(&self) -> KernelDensityParams {
        KernelDensityParams {
            radius: self.radius,
            sigma: self.sigma,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputSection {
    /// Feature table CSV
    pub table: PathBuf,
    /// Directory for intermediate GeoTIFF grids
    #[serde(default)]
    pub grids: Option<PathBuf>,
}

/// Optional derived subset, e.g. rows with building exposure above a threshold
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterSection {
    pub column: String,
    pub above: f64,
    pub table: PathBuf,
}

impl RunConfig {
    /// Load from a YAML file; relative paths resolve against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    fn resolve_paths(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(dir) = self.scene.dir.as_mut() {
            fix(dir);
        }
        self.scene.bands.values_mut().for_each(fix);
        if let Some(CalibrationSection::Mtl { mtl }) = self.calibration.as_mut() {
            fix(mtl);
        }
        for path in [&mut self.land_mask, &mut self.elevation, &mut self.output.grids]
            .into_iter()
            .flatten()
        {
            fix(path);
        }
        self.layers.iter_mut().for_each(|l| fix(&mut l.path));
        fix(&mut self.output.table);
        if let Some(filter) = self.filter.as_mut() {
            fix(&mut filter.table);
        }
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.scene
            .bbox
            .map(|[x0, y0, x1, y1]| BoundingBox::new(x0, y0, x1, y1))
    }

    /// CRS assumed for GeoJSON files that do not declare one
    pub fn vector_crs(&self) -> Result<CRS> {
        match &self.vector_crs {
            Some(id) => CRS::from_identifier(id),
            None => Ok(CRS::wgs84()),
        }
    }

    /// Band paths from `scene.dir` and/or `scene.bands`; explicit entries win
    pub fn scene_paths(&self) -> Result<ScenePaths> {
        let mut paths = match &self.scene.dir {
            Some(dir) => ScenePaths::discover(dir)?,
            None => ScenePaths::new(SceneMeta::default()),
        };
        for (id, path) in &self.scene.bands {
            paths.bands.insert(*id, path.clone());
        }
        if let Some(id) = &self.scene.scene_id {
            paths.meta.scene_id = id.clone();
        }
        if self.scene.acquired.is_some() {
            paths.meta.acquired = self.scene.acquired.clone();
        }
        if self.scene.month.is_some() {
            paths.meta.month = self.scene.month.clone();
        }
        if paths.bands.is_empty() {
            return Err(Error::Config("scene: set `dir` or `bands`".into()));
        }
        Ok(paths)
    }

    /// LST parameters, reading the MTL file when calibration is not inline
    pub fn lst_params(&self, scene: &ScenePaths) -> Result<LstParams> {
        let calibration = match &self.calibration {
            Some(CalibrationSection::Inline(cal)) => *cal,
            Some(CalibrationSection::Mtl { mtl }) => ThermalCalibration::from_mtl(mtl)?,
            None => match &scene.mtl {
                Some(mtl) => ThermalCalibration::from_mtl(mtl)?,
                None => {
                    return Err(Error::MissingCalibration(
                        "calibration (no inline values and no *_MTL.txt found)".into(),
                    ))
                }
            },
        };
        let params = LstParams {
            calibration,
            emissivity: self.emissivity,
            wavelength: self.wavelength,
        };
        params.validate()?;
        Ok(params)
    }
}
