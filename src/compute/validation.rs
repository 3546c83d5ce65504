//! Validation for coordinates and image keys read from pipeline inputs.

use crate::config::Coordinate;
use crate::error::{GeocellsError, Result};

/// Validates a projected coordinate has finite, non-negative axes.
///
/// UTM eastings and northings are always non-negative once the false
/// easting/northing is applied.
///
/// # Examples
///
/// ```
/// use geocells::compute::validation::validate_coordinate;
/// use geocells::config::Coordinate;
///
/// assert!(validate_coordinate(&Coordinate::new(549_333.0, 4_178_819.0)).is_ok());
/// assert!(validate_coordinate(&Coordinate::new(f64::NAN, 4_178_819.0)).is_err());
/// assert!(validate_coordinate(&Coordinate::new(-1.0, 0.0)).is_err());
/// ```
pub fn validate_coordinate(coord: &Coordinate) -> Result<()> {
    if !coord.easting.is_finite() {
        return Err(GeocellsError::InvalidInput(format!(
            "Easting must be finite, got: {}",
            coord.easting
        )));
    }

    if !coord.northing.is_finite() {
        return Err(GeocellsError::InvalidInput(format!(
            "Northing must be finite, got: {}",
            coord.northing
        )));
    }

    if coord.easting < 0.0 || coord.northing < 0.0 {
        return Err(GeocellsError::InvalidInput(format!(
            "Projected coordinate must be non-negative, got: {}",
            coord
        )));
    }

    Ok(())
}

/// Validates a latitude in degrees.
///
/// ```
/// use geocells::compute::validation::validate_latitude;
///
/// assert!(validate_latitude(37.75).is_ok());
/// assert!(validate_latitude(91.0).is_err());
/// ```
pub fn validate_latitude(latitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(GeocellsError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            latitude
        )));
    }
    Ok(())
}

/// Validates an image key can travel through the space-separated stage files.
pub fn validate_image_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(GeocellsError::InvalidInput("Image key is empty".to_string()));
    }
    if key.contains(char::is_whitespace) {
        return Err(GeocellsError::InvalidInput(format!(
            "Image key may not contain whitespace: {:?}",
            key
        )));
    }
    Ok(())
}
