use serde::{Deserialize, Serialize};

/// A planar coordinate in a projected grid (UTM meters).
///
/// Immutable once built. `geo` conversions are provided so the affine
/// helpers of the `geo` crate can be applied directly.
///
/// # Examples
///
/// ```
/// use geocells_types::coord::Coordinate;
///
/// let a = Coordinate::new(52.0, 50.0);
/// let b = Coordinate::new(50.0, 50.0);
/// assert_eq!(a.distance_squared(&b), 4.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub easting: f64,
    pub northing: f64,
}

impl Coordinate {
    #[inline]
    pub const fn new(easting: f64, northing: f64) -> Self {
        Self { easting, northing }
    }

    /// Snap both axes to two decimals.
    ///
    /// Two decimals is the precision floor used for lattice deduplication.
    pub fn rounded(&self) -> Self {
        Self::new(round_2dp(self.easting), round_2dp(self.northing))
    }

    /// Integer key of the rounded coordinate, in hundredths of a unit.
    ///
    /// Two coordinates share a key exactly when they are equal after
    /// [`Coordinate::rounded`].
    pub fn grid_key(&self) -> (i64, i64) {
        (
            (self.easting * 100.0).round() as i64,
            (self.northing * 100.0).round() as i64,
        )
    }

    /// Absolute per-axis offsets `(dx, dy)` to another coordinate.
    #[inline]
    pub fn abs_delta(&self, other: &Coordinate) -> (f64, f64) {
        (
            (self.easting - other.easting).abs(),
            (self.northing - other.northing).abs(),
        )
    }

    #[inline]
    pub fn distance_squared(&self, other: &Coordinate) -> f64 {
        let (dx, dy) = self.abs_delta(other);
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.easting.is_finite() && self.northing.is_finite()
    }
}

#[inline]
fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Point::new(c.easting, c.northing)
    }
}

impl From<geo::Point<f64>> for Coordinate {
    fn from(p: geo::Point<f64>) -> Self {
        Coordinate::new(p.x(), p.y())
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::coord! { x: c.easting, y: c.northing }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.easting, self.northing)
    }
}
