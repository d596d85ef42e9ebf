//! Coordinate reference systems, identified by EPSG code

mod utm;

pub use utm::UtmZone;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// An EPSG-coded reference system.
///
/// Landsat Collection 2 grids are always UTM and vector extracts are either
/// WGS84 or already in the scene zone, so an EPSG code is all the pipeline
/// needs to pick a coordinate transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// Parse an identifier such as `EPSG:32628`, `epsg:4326` or a bare code
    pub fn from_identifier(id: &str) -> Result<Self> {
        let trimmed = id.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        code.parse::<u32>()
            .map(Self::from_epsg)
            .map_err(|_| Error::InvalidParameter {
                name: "crs",
                value: id.to_string(),
                reason: "expected EPSG:<code>".into(),
            })
    }

    /// Geographic lon/lat on WGS84, EPSG:4326
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// UTM zone for EPSG 326xx / 327xx codes
    pub fn utm_zone(&self) -> Option<UtmZone> {
        UtmZone::from_epsg(self.epsg)
    }

    /// Whether this is WGS84 geographic (lon/lat degrees)
    pub fn is_wgs84(&self) -> bool {
        self.epsg == 4326
    }

    /// Same EPSG code
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self.epsg == other.epsg
    }

    /// Build the point transform that maps coordinates in `self` to `target`.
    ///
    /// Supported: identical CRS, WGS84 ↔ UTM, and UTM → UTM through WGS84.
    pub fn transform_to(&self, target: &CRS) -> Result<CoordinateTransform> {
        if self.is_equivalent(target) {
            return Ok(CoordinateTransform::Identity);
        }

        let unsupported = || Error::CrsMismatch(self.to_string(), target.to_string());

        match (self.is_wgs84(), target.is_wgs84()) {
            (true, false) => target
                .utm_zone()
                .map(CoordinateTransform::ToUtm)
                .ok_or_else(unsupported),
            (false, true) => self
                .utm_zone()
                .map(CoordinateTransform::FromUtm)
                .ok_or_else(unsupported),
            _ => match (self.utm_zone(), target.utm_zone()) {
                (Some(from), Some(to)) => Ok(CoordinateTransform::UtmToUtm { from, to }),
                _ => Err(unsupported()),
            },
        }
    }

    /// `EPSG:<code>`, the form accepted by [`CRS::from_identifier`]
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Point transform between two supported CRS
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateTransform {
    Identity,
    /// WGS84 lon/lat → UTM easting/northing
    ToUtm(UtmZone),
    /// UTM easting/northing → WGS84 lon/lat
    FromUtm(UtmZone),
    UtmToUtm { from: UtmZone, to: UtmZone },
}

impl CoordinateTransform {
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            CoordinateTransform::Identity => (x, y),
            CoordinateTransform::ToUtm(zone) => zone.forward(x, y),
            CoordinateTransform::FromUtm(zone) => zone.inverse(x, y),
            CoordinateTransform::UtmToUtm { from, to } => {
                let (lon, lat) = from.inverse(x, y);
                to.forward(lon, lat)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_identifier() {
        let crs = CRS::from_identifier("EPSG:32628").unwrap();
        assert_eq!(crs.epsg(), 32628);
        assert_eq!(crs.identifier(), "EPSG:32628");
        assert_eq!(CRS::from_identifier("4326").unwrap(), CRS::wgs84());
        assert!(CRS::from_identifier("UTM28").is_err());
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_epsg(32628).is_equivalent(&CRS::from_epsg(32728)));
        assert_eq!(CRS::from_epsg(32628).to_string(), "EPSG:32628");
    }

    #[test]
    fn test_transform_selection() {
        let utm = CRS::from_epsg(32628);
        assert_eq!(utm.transform_to(&utm).unwrap(), CoordinateTransform::Identity);
        assert!(matches!(
            CRS::wgs84().transform_to(&utm).unwrap(),
            CoordinateTransform::ToUtm(UtmZone { zone: 28, north: true })
        ));
        assert!(matches!(
            utm.transform_to(&CRS::wgs84()).unwrap(),
            CoordinateTransform::FromUtm(_)
        ));
        assert!(matches!(
            CRS::from_epsg(3857).transform_to(&utm),
            Err(Error::CrsMismatch(..))
        ));
    }

    #[test]
    fn test_utm_to_utm_matches_two_steps() {
        let a = CRS::from_epsg(32628);
        let b = CRS::from_epsg(32627);
        let t = a.transform_to(&b).unwrap();
        let (x, y) = t.apply(377_617.37, 3_148_796.89);
        let (lon, lat) = UtmZone::from_epsg(32628).unwrap().inverse(377_617.37, 3_148_796.89);
        let (ex, ey) = UtmZone::from_epsg(32627).unwrap().forward(lon, lat);
        assert!((x - ex).abs() < 1e-6 && (y - ey).abs() < 1e-6);
    }
}
