//! Tiling configurations, the cell centers they generate, and class ids.

use crate::coord::Coordinate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One (scale, orientation, phase) combination defining a full hexagonal
/// lattice over the region, plus the containment thresholds used when images
/// are matched against its cells.
///
/// `radius_squared` is configured independently of `radius`; the two are not
/// required to agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TilingConfiguration {
    pub config_id: u16,
    /// Tiling size multiplier applied to the base cell radius
    pub scale: f64,
    /// Rotation of the lattice about its seed, in degrees
    pub orientation: f64,
    /// Half-width of the bounding-box pre-filter
    pub radius: f64,
    /// Threshold for the circular containment test
    pub radius_squared: f64,
    /// Translation applied after rotation
    pub phase: Coordinate,
}

impl TilingConfiguration {
    /// Configuration whose circular threshold is exactly `radius²`.
    pub fn new(
        config_id: u16,
        scale: f64,
        orientation: f64,
        phase: Coordinate,
        radius: f64,
    ) -> Self {
        Self {
            config_id,
            scale,
            orientation,
            radius,
            radius_squared: radius * radius,
            phase,
        }
    }

    pub fn with_radius_squared(mut self, radius_squared: f64) -> Self {
        self.radius_squared = radius_squared;
        self
    }

    /// Whether `radius_squared` equals `radius²`.
    pub fn is_consistent(&self) -> bool {
        let expected = self.radius * self.radius;
        (expected - self.radius_squared).abs() <= f64::EPSILON * expected.max(1.0)
    }

    /// The sixteen tilings used for the SF-XL partition.
    ///
    /// Ordered scale, then orientation, then phase; the phase grid is
    /// `{0, 2} × {0, 2}` base radii, stretched by the scale.
    ///
    /// ```
    /// use geocells_types::tiling::TilingConfiguration;
    ///
    /// let set = TilingConfiguration::standard_set(5.0);
    /// assert_eq!(set.len(), 16);
    /// assert_eq!(set[0].radius_squared, 25.0);
    /// assert_eq!(set[15].radius, 10.0);
    /// ```
    pub fn standard_set(base_radius: f64) -> Vec<Self> {
        const SCALES: [f64; 2] = [1.0, 2.0];
        const ORIENTATIONS: [f64; 2] = [0.0, 15.0];
        const PHASE_STEPS: [f64; 2] = [0.0, 2.0];

        let mut configs = Vec::with_capacity(16);
        for scale in SCALES {
            for orientation in ORIENTATIONS {
                for px in PHASE_STEPS {
                    for py in PHASE_STEPS {
                        let phase = Coordinate::new(
                            px * base_radius * scale,
                            py * base_radius * scale,
                        );
                        configs.push(Self::new(
                            configs.len() as u16,
                            scale,
                            orientation,
                            phase,
                            base_radius * scale,
                        ));
                    }
                }
            }
        }
        configs
    }
}

/// A generated lattice point belonging to exactly one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellCenter {
    pub config_id: u16,
    /// Position in the configuration's center list, assigned at generation
    pub local_index: u32,
    pub coord: Coordinate,
    pub radius: f64,
    pub radius_squared: f64,
}

impl CellCenter {
    pub fn new(config: &TilingConfiguration, local_index: u32, coord: Coordinate) -> Self {
        Self {
            config_id: config.config_id,
            local_index,
            coord,
            radius: config.radius,
            radius_squared: config.radius_squared,
        }
    }

    pub fn class_id(&self) -> ClassId {
        ClassId::new(self.config_id, self.local_index)
    }

    /// Whether an image at `coord` falls inside this cell.
    ///
    /// All three predicates apply: both bounding-box axes against `radius`
    /// and the squared distance against `radius_squared`.
    #[inline]
    pub fn contains(&self, coord: &Coordinate) -> bool {
        let (dx, dy) = self.coord.abs_delta(coord);
        dy <= self.radius && dx <= self.radius && dx * dx + dy * dy <= self.radius_squared
    }
}

/// Canonical class label: one cell of one configuration.
///
/// Rendered as `"<config_id>_<local_index>"`, which is also its serialized form.
///
/// ```
/// use geocells_types::tiling::ClassId;
///
/// let id: ClassId = "3_17".parse().unwrap();
/// assert_eq!(id, ClassId::new(3, 17));
/// assert_eq!(id.to_string(), "3_17");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId {
    pub config_id: u16,
    pub local_index: u32,
}

impl ClassId {
    pub const fn new(config_id: u16, local_index: u32) -> Self {
        Self {
            config_id,
            local_index,
        }
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.config_id, self.local_index)
    }
}

/// Error returned when a class id string is not `<u16>_<u32>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseClassIdError(pub String);

impl fmt::Display for ParseClassIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid class id: {:?}", self.0)
    }
}

impl std::error::Error for ParseClassIdError {}

impl FromStr for ClassId {
    type Err = ParseClassIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (config, index) = s
            .split_once('_')
            .ok_or_else(|| ParseClassIdError(s.to_string()))?;
        let config_id = config
            .parse()
            .map_err(|_| ParseClassIdError(s.to_string()))?;
        let local_index = index
            .parse()
            .map_err(|_| ParseClassIdError(s.to_string()))?;
        Ok(Self::new(config_id, local_index))
    }
}

impl Serialize for ClassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClassId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
