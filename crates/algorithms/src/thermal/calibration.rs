//! Per-scene calibration constants and LST parameters

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use heatisle_core::{Error, Result};

/// Effective wavelength of TIRS band 10, in metres
pub const DEFAULT_WAVELENGTH: f64 = 10.895e-6;

const KEY_MULT: &str = "RADIANCE_MULT_BAND_10";
const KEY_ADD: &str = "RADIANCE_ADD_BAND_10";
const KEY_K1: &str = "K1_CONSTANT_BAND_10";
const KEY_K2: &str = "K2_CONSTANT_BAND_10";

/// Scene-specific thermal band constants.
///
/// These vary per acquisition and have no defaults: they come from the
/// scene's MTL metadata or from the run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalCalibration {
    /// Radiance multiplicative rescaling factor (M_L)
    pub radiance_mult: f64,
    /// Radiance additive rescaling factor (A_L)
    pub radiance_add: f64,
    /// Thermal conversion constant K1
    pub k1: f64,
    /// Thermal conversion constant K2
    pub k2: f64,
}

impl ThermalCalibration {
    pub fn new(radiance_mult: f64, radiance_add: f64, k1: f64, k2: f64) -> Result<Self> {
        let cal = Self {
            radiance_mult,
            radiance_add,
            k1,
            k2,
        };
        cal.validate()?;
        Ok(cal)
    }

    /// Reject non-finite constants and non-positive K1/K2.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("radiance_mult", self.radiance_mult),
            ("radiance_add", self.radiance_add),
            ("k1", self.k1),
            ("k2", self.k2),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be finite".into(),
                });
            }
        }
        for (name, value) in [("k1", self.k1), ("k2", self.k2)] {
            if value <= 0.0 {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "thermal constants must be positive".into(),
                });
            }
        }
        Ok(())
    }

    /// Parse the band 10 constants out of a Landsat `*_MTL.txt` file.
    pub fn from_mtl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_mtl_str(&text)
    }

    /// Parse the band 10 constants out of MTL text (`KEY = value` lines).
    pub fn from_mtl_str(text: &str) -> Result<Self> {
        let lookup = |key: &str| -> Result<f64> {
            let raw = text
                .lines()
                .filter_map(|line| line.split_once('='))
                .find(|(k, _)| k.trim() == key)
                .map(|(_, v)| v.trim().trim_matches('"'))
                .ok_or_else(|| Error::MissingCalibration(key.to_string()))?;
            raw.parse::<f64>().map_err(|_| Error::InvalidParameter {
                name: "mtl",
                value: format!("{} = {}", key, raw),
                reason: "not a number".into(),
            })
        };

        let cal = Self {
            radiance_mult: lookup(KEY_MULT)?,
            radiance_add: lookup(KEY_ADD)?,
            k1: lookup(KEY_K1)?,
            k2: lookup(KEY_K2)?,
        };
        cal.validate()?;
        debug!(
            "MTL calibration: M_L={:e} A_L={} K1={} K2={}",
            cal.radiance_mult, cal.radiance_add, cal.k1, cal.k2
        );
        Ok(cal)
    }
}

/// Emissivity model constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissivityParams {
    /// Emissivity of full vegetation cover (ε_v)
    pub vegetation: f64,
    /// Emissivity of bare soil (ε_s)
    pub soil: f64,
    /// Surface roughness term (C)
    pub roughness: f64,
}

impl Default for EmissivityParams {
    fn default() -> Self {
        Self {
            vegetation: 0.984,
            soil: 0.964,
            roughness: 0.005,
        }
    }
}

fn default_wavelength() -> f64 {
    DEFAULT_WAVELENGTH
}

/// Everything the LST chain needs for one scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LstParams {
    pub calibration: ThermalCalibration,
    #[serde(default)]
    pub emissivity: EmissivityParams,
    /// Effective thermal wavelength λ in metres
    #[serde(default = "default_wavelength")]
    pub wavelength: f64,
}

impl LstParams {
    pub fn new(calibration: ThermalCalibration) -> Self {
        Self {
            calibration,
            emissivity: EmissivityParams::default(),
            wavelength: DEFAULT_WAVELENGTH,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.calibration.validate()?;
        if !(self.wavelength.is_finite() && self.wavelength > 0.0) {
            return Err(Error::InvalidParameter {
                name: "wavelength",
                value: self.wavelength.to_string(),
                reason: "must be a positive length in metres".into(),
            });
        }
        Ok(())
    }
}
