//! WGS84 ↔ UTM projection (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64).
//!
//! Landsat Collection 2 scenes are delivered in UTM (EPSG 326xx / 327xx)
//! while global elevation models usually come in EPSG:4326, so these two
//! families are all the loader needs to bring an auxiliary grid onto the
//! band grid.

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone and hemisphere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub zone: u32,
    pub north: bool,
}

impl UtmZone {
    /// Parse an EPSG code: 326xx → zone xx North, 327xx → zone xx South
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        if (32601..=32660).contains(&epsg) {
            Some(Self { zone: epsg - 32600, north: true })
        } else if (32701..=32760).contains(&epsg) {
            Some(Self { zone: epsg - 32700, north: false })
        } else {
            None
        }
    }

    fn central_meridian(&self) -> f64 {
        ((self.zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
    }

    /// WGS84 (longitude, latitude) in degrees → (easting, northing) in metres
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let lon = lon_deg.to_radians();

        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let tan_lat = lat.tan();

        let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = E_PRIME2 * cos_lat * cos_lat;
        let a_coeff = cos_lat * (lon - self.central_meridian());
        let m = meridional_arc(lat);

        let a2 = a_coeff * a_coeff;
        let a4 = a2 * a2;
        let a6 = a4 * a2;

        // Snyder eq. 8-9
        let easting = K0
            * n
            * (a_coeff
                + (1.0 - t + c) * a2 * a_coeff / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
            + FALSE_EASTING;

        // Snyder eq. 8-10
        let northing = K0
            * (m + n
                * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

        if self.north {
            (easting, northing)
        } else {
            (easting, northing + FALSE_NORTHING_SOUTH)
        }
    }

    /// (easting, northing) in metres → WGS84 (longitude, latitude) in degrees
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let x = easting - FALSE_EASTING;
        let y = if self.north {
            northing
        } else {
            northing - FALSE_NORTHING_SOUTH
        };

        let e4 = E2 * E2;
        let e6 = e4 * E2;
        let m = y / K0;
        let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        // Footpoint latitude, Snyder eq. 3-26 / 3-24
        let sqrt_1me2 = (1.0 - E2).sqrt();
        let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin_phi = phi1.sin();
        let cos_phi = phi1.cos();
        let tan_phi = phi1.tan();
        let c1 = E_PRIME2 * cos_phi * cos_phi;
        let t1 = tan_phi * tan_phi;
        let denom = 1.0 - E2 * sin_phi * sin_phi;
        let n1 = A / denom.sqrt();
        let r1 = A * (1.0 - E2) / denom.powf(1.5);
        let d = x / (n1 * K0);

        // Snyder eq. 8-17 / 8-18
        let lat = phi1
            - (n1 * tan_phi / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d.powi(4)
                        / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * E_PRIME2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);

        let lon = self.central_meridian()
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos_phi;

        (lon.to_degrees(), lat.to_degrees())
    }
}

/// Meridional arc from equator to latitude `lat` (radians), Snyder eq. 3-21
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn parse_zones() {
        assert_eq!(UtmZone::from_epsg(32630), Some(UtmZone { zone: 30, north: true }));
        assert_eq!(UtmZone::from_epsg(32721), Some(UtmZone { zone: 21, north: false }));
        assert_eq!(UtmZone::from_epsg(4326), None);
        assert_eq!(UtmZone::from_epsg(32600), None);
        assert_eq!(UtmZone::from_epsg(32761), None);
    }

    // Reference from PROJ: (-3.7037, 40.4168) in EPSG:32630 → (440298.94, 4474257.31)
    #[test]
    fn madrid_forward() {
        let zone = UtmZone::from_epsg(32630).unwrap();
        let (e, n) = zone.forward(-3.7037, 40.4168);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    #[test]
    fn equator_central_meridian() {
        let zone = UtmZone { zone: 30, north: true };
        let (e, n) = zone.forward(-3.0, 0.0);
        assert_close(e, 500_000.0, 0.01, "easting at CM");
        assert_close(n, 0.0, 0.01, "northing at equator");
        let (lon, lat) = zone.inverse(500_000.0, 0.0);
        assert_close(lon, -3.0, 1e-9, "lon at CM");
        assert_close(lat, 0.0, 1e-9, "lat at equator");
    }

    #[test]
    fn inverse_roundtrip_north_and_south() {
        // Canary Islands (zone 28N) and Buenos Aires (zone 21S)
        for (epsg, lon, lat) in [(32628, -16.25, 28.46), (32721, -58.3816, -34.6037)] {
            let zone = UtmZone::from_epsg(epsg).unwrap();
            let (e, n) = zone.forward(lon, lat);
            let (lon2, lat2) = zone.inverse(e, n);
            assert_close(lon2, lon, 1e-7, "longitude");
            assert_close(lat2, lat, 1e-7, "latitude");
        }
    }
}
