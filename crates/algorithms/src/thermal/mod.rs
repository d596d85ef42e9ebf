//! Thermal band processing: land surface temperature
//!
//! The chain runs in a fixed order, each stage a pure grid → grid map:
//!
//! 1. DN → top-of-atmosphere radiance
//! 2. radiance → brightness temperature (K)
//! 3. NDVI → fractional vegetation (needs scene-wide NDVI extrema first)
//! 4. fractional vegetation → emissivity
//! 5. brightness temperature + emissivity → land surface temperature (°C)

mod calibration;
mod chain;

pub use calibration::{EmissivityParams, LstParams, ThermalCalibration, DEFAULT_WAVELENGTH};
pub use chain::{
    brightness_temperature, celsius_to_kelvin, emissivity, fractional_vegetation,
    kelvin_to_celsius, land_surface_temperature, radiance, LstChain, LstProducts,
    BOLTZMANN, KELVIN_OFFSET, PLANCK, RHO, SPEED_OF_LIGHT,
};
