//! Cell value trait for raster grids

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Sentinel written to every derived grid cell that holds no data.
///
/// Chosen outside the range of every physical quantity the pipeline produces
/// (reflectance, indices, Kelvin, Celsius, metres) so it can never collide
/// with a real value.
pub const NODATA: f64 = -9999.0;

/// Trait for types that can be stored in a raster cell.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// No-data sentinel used when a grid of this type is created by the pipeline
    fn default_nodata() -> Self;

    /// Whether this value is a real measurement given the grid's sentinel.
    ///
    /// Floating point values that are NaN or infinite are never valid.
    fn is_valid(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64 (NaN if the value has no f64 representation)
    fn as_f64(self) -> f64 {
        <f64 as NumCast>::from(self).unwrap_or(f64::NAN)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $nodata:expr) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                $nodata
            }

            fn is_valid(&self, nodata: Option<Self>) -> bool {
                nodata.map_or(true, |nd| *self != nd)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                NODATA as $t
            }

            fn is_valid(&self, nodata: Option<Self>) -> bool {
                if !self.is_finite() {
                    return false;
                }
                match nodata {
                    Some(nd) if nd.is_finite() => (self - nd).abs() > <$t>::EPSILON * 100.0,
                    _ => true,
                }
            }
        }
    };
}

impl_raster_element_int!(u8, u8::MAX);
impl_raster_element_int!(u16, 0);
impl_raster_element_int!(i16, i16::MIN);
impl_raster_element_int!(i32, i32::MIN);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);
