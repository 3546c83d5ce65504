//! Inverse UTM projection (WGS84).
//!
//! Only used to place cell centers, and optionally images, into latitude
//! buckets.

use crate::error::{GeocellsError, Result};

/// A UTM zone: number 1..=60 plus hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub number: u8,
    pub northern: bool,
}

impl UtmZone {
    pub const fn new(number: u8, northern: bool) -> Self {
        Self { number, northern }
    }

    /// Longitude of the zone's central meridian, in degrees.
    pub fn central_meridian(&self) -> f64 {
        (self.number as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    /// A latitude band letter on the right side of the equator. Only the
    /// hemisphere matters for the inverse projection.
    fn band_letter(&self) -> char {
        if self.northern { 'N' } else { 'M' }
    }
}

/// Convert UTM easting/northing to geographic `(latitude, longitude)` in degrees.
///
/// # Examples
///
/// ```
/// use geocells::compute::projection::{UtmZone, utm_to_lat_lon};
///
/// let (lat, lon) = utm_to_lat_lon(549_333.0, 4_178_819.0, UtmZone::new(10, true))?;
/// assert!(lat > 37.7 && lat < 37.8);
/// assert!(lon > -122.5 && lon < -122.4);
/// # Ok::<(), geocells::GeocellsError>(())
/// ```
pub fn utm_to_lat_lon(easting: f64, northing: f64, zone: UtmZone) -> Result<(f64, f64)> {
    utm::wsg84_utm_to_lat_lon(easting, northing, zone.number, zone.band_letter()).map_err(|e| {
        GeocellsError::InvalidInput(format!(
            "cannot project ({:.2}, {:.2}) in UTM zone {}{}: {:?}",
            easting,
            northing,
            zone.number,
            zone.band_letter(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_meridian() {
        assert_eq!(UtmZone::new(10, true).central_meridian(), -123.0);
        assert_eq!(UtmZone::new(31, true).central_meridian(), 3.0);
        assert_eq!(UtmZone::new(1, true).central_meridian(), -177.0);
    }

    #[test]
    fn test_san_francisco() {
        // Mid-SF, roughly 37.755 N, 122.44 W
        let (lat, lon) = utm_to_lat_lon(549_333.0, 4_178_819.0, UtmZone::new(10, true)).unwrap();
        assert!(lat > 37.70 && lat < 37.80, "lat = {}", lat);
        assert!(lon > -122.50 && lon < -122.40, "lon = {}", lon);
    }

    #[test]
    fn test_northing_increases_latitude() {
        let zone = UtmZone::new(10, true);
        let (south, _) = utm_to_lat_lon(549_000.0, 4_172_649.0, zone).unwrap();
        let (north, _) = utm_to_lat_lon(549_000.0, 4_184_989.0, zone).unwrap();
        assert!(north > south);
        // ~12.3 km of northing is ~0.11 degrees of latitude
        assert!((north - south - 0.111).abs() < 0.005);
    }

    #[test]
    fn test_central_meridian_longitude() {
        let (_, lon) = utm_to_lat_lon(500_000.0, 4_178_819.0, UtmZone::new(10, true)).unwrap();
        assert!((lon - UtmZone::new(10, true).central_meridian()).abs() < 1e-6);
    }

    #[test]
    fn test_southern_hemisphere() {
        let (lat, _) = utm_to_lat_lon(500_000.0, 9_000_000.0, UtmZone::new(31, false)).unwrap();
        assert!(lat < -8.9 && lat > -9.1, "lat = {}", lat);
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        let zone = UtmZone::new(10, true);
        assert!(matches!(
            utm_to_lat_lon(50_000.0, 4_178_819.0, zone),
            Err(GeocellsError::InvalidInput(_))
        ));
        assert!(utm_to_lat_lon(549_333.0, -1.0, zone).is_err());
        assert!(utm_to_lat_lon(549_333.0, 4_178_819.0, UtmZone::new(61, true)).is_err());
    }
}
