//! LST derivation stages

use tracing::{debug, info};

use super::calibration::{EmissivityParams, LstParams, ThermalCalibration};
use crate::imagery::{cellwise, safe_div};
use heatisle_core::raster::Raster;
use heatisle_core::{Error, Result, StageContext};

/// Planck constant (J·s)
pub const PLANCK: f64 = 6.626_070_15e-34;
/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 2.997_924_58e8;
/// Boltzmann constant (J/K)
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// Second radiation constant ρ = h·c/σ (m·K), ≈ 1.438777e-2
pub const RHO: f64 = PLANCK * SPEED_OF_LIGHT / BOLTZMANN;

pub const KELVIN_OFFSET: f64 = 273.15;

#[inline]
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

#[inline]
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

/// Stage 1: top-of-atmosphere spectral radiance, `L = M_L·DN + A_L`
pub fn radiance(dn: &Raster<f64>, cal: &ThermalCalibration) -> Result<Raster<f64>> {
    let (mult, add) = (cal.radiance_mult, cal.radiance_add);
    cellwise(&[dn], move |v| Some(mult * v[0] + add))
}

/// Stage 2: at-sensor brightness temperature in Kelvin,
/// `BT = K2 / ln(K1/L + 1)`
///
/// Cells with `L ≤ 0` or a non-positive log argument are no-data.
pub fn brightness_temperature(
    radiance: &Raster<f64>,
    cal: &ThermalCalibration,
) -> Result<Raster<f64>> {
    let (k1, k2) = (cal.k1, cal.k2);
    cellwise(&[radiance], move |v| {
        let l = v[0];
        if l <= 0.0 {
            return None;
        }
        let arg = k1 / l + 1.0;
        if arg <= 0.0 {
            return None;
        }
        safe_div(k2, arg.ln())
    })
}

/// Stage 3: fractional vegetation cover,
/// `Pv = ((NDVI − NDVI_min) / (NDVI_max − NDVI_min))²`
///
/// Two passes: the scene-wide NDVI extrema are reduced first, then applied
/// per cell. A flat NDVI scene (`max == min`) yields `Pv = 0` everywhere.
///
/// # Returns
/// The Pv grid and the `(min, max)` NDVI pair used.
pub fn fractional_vegetation(ndvi: &Raster<f64>) -> Result<(Raster<f64>, (f64, f64))> {
    let (min, max) = ndvi
        .valid_extrema()
        .ok_or_else(|| Error::Algorithm("NDVI has no valid cells".into()))?;
    let range = max - min;
    debug!("NDVI extrema for Pv: min={:.4} max={:.4}", min, max);

    let pv = cellwise(&[ndvi], move |v| {
        if range.abs() < 1e-12 {
            return Some(0.0);
        }
        let scaled = (v[0] - min) / range;
        Some(scaled * scaled)
    })?;
    Ok((pv, (min, max)))
}

/// Stage 4: land surface emissivity, `ε = ε_v·Pv + ε_s·(1 − Pv) + C`
pub fn emissivity(pv: &Raster<f64>, params: &EmissivityParams) -> Result<Raster<f64>> {
    let p = *params;
    cellwise(&[pv], move |v| {
        Some(p.vegetation * v[0] + p.soil * (1.0 - v[0]) + p.roughness)
    })
}

/// Stage 5: emissivity-corrected land surface temperature in °C,
/// `Ts = BT / (1 + (λ·BT/ρ)·ln ε) − 273.15`
///
/// Cells with ε outside (0, 1) or a non-positive denominator are no-data.
pub fn land_surface_temperature(
    bt: &Raster<f64>,
    emissivity: &Raster<f64>,
    wavelength: f64,
) -> Result<Raster<f64>> {
    let scale = wavelength / RHO;
    cellwise(&[bt, emissivity], move |v| {
        let (bt, eps) = (v[0], v[1]);
        if eps <= 0.0 || eps >= 1.0 {
            return None;
        }
        let denom = 1.0 + scale * bt * eps.ln();
        if denom <= 0.0 {
            return None;
        }
        Some(kelvin_to_celsius(bt / denom))
    })
}

/// Every product of one LST chain run
#[derive(Debug, Clone)]
pub struct LstProducts {
    pub radiance: Raster<f64>,
    /// Kelvin
    pub brightness_temperature: Raster<f64>,
    pub fractional_vegetation: Raster<f64>,
    pub emissivity: Raster<f64>,
    /// Celsius
    pub lst: Raster<f64>,
    /// NDVI `(min, max)` used by the Pv stage
    pub ndvi_range: (f64, f64),
}

/// The five-stage LST derivation for one scene
#[derive(Debug, Clone)]
pub struct LstChain {
    params: LstParams,
}

impl LstChain {
    pub fn new(params: LstParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Run all stages on the thermal DN grid and the scene NDVI.
    pub fn run(&self, dn: &Raster<f64>, ndvi: &Raster<f64>) -> Result<LstProducts> {
        dn.ensure_aligned(ndvi).stage("lst input alignment")?;

        let cal = &self.params.calibration;
        let radiance = radiance(dn, cal).stage("radiance")?;
        let bt = brightness_temperature(&radiance, cal).stage("brightness temperature")?;
        let (pv, ndvi_range) = fractional_vegetation(ndvi).stage("fractional vegetation")?;
        let eps = emissivity(&pv, &self.params.emissivity).stage("emissivity")?;
        let lst = land_surface_temperature(&bt, &eps, self.params.wavelength)
            .stage("land surface temperature")?;

        let stats = lst.statistics();
        info!(
            "LST: {} valid cells, {:.2?}..{:.2?} °C (mean {:.2?})",
            stats.valid_count, stats.min, stats.max, stats.mean
        );

        Ok(LstProducts {
            radiance,
            brightness_temperature: bt,
            fractional_vegetation: pv,
            emissivity: eps,
            lst,
            ndvi_range,
        })
    }
}
