//! Pipeline configuration
//!
//! This module provides the configuration types for a partitioning run and
//! re-exports the data types from the `geocells-types` crate for convenience.
use crate::error::{GeocellsError, Result};

pub use geocells_types::bbox::BoundingBox2D;
pub use geocells_types::coord::Coordinate;
pub use geocells_types::stats::PipelineStats;
pub use geocells_types::tiling::{CellCenter, ClassId, TilingConfiguration};

/// Approximate north-south extent of one region bucket (0.01° of latitude).
pub const BUCKET_BAND_METERS: f64 = 1_111.0;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Classes with fewer image entries than this are dropped from the cache
    #[serde(default = "Config::default_min_images_per_class")]
    pub min_images_per_class: usize,

    /// Size of the per-bucket worker pool; 0 uses one thread per core
    #[serde(default)]
    pub workers: usize,

    #[serde(default)]
    pub region: RegionConfig,

    #[serde(default)]
    pub lattice: LatticeConfig,

    #[serde(default)]
    pub manifest: ManifestLayout,

    #[serde(default)]
    pub labels: LabelConfig,
}

/// Where image latitudes come from when bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketSource {
    /// Numeric suffix of the manifest's latitude token
    #[default]
    LatitudePrefix,
    /// Inverse projection of the image's easting/northing
    Projection,
}

/// Geographic extent of the dataset and its projection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    #[serde(default = "RegionConfig::default_utm_zone")]
    pub utm_zone: u8,

    #[serde(default = "RegionConfig::default_northern")]
    pub northern: bool,

    /// Latitude of bucket 0, in hundredths of a degree
    #[serde(default = "RegionConfig::default_latitude_origin")]
    pub latitude_origin: i32,

    #[serde(default)]
    pub image_bucket_source: BucketSource,

    #[serde(default = "RegionConfig::default_bounds")]
    pub bounds: BoundingBox2D,
}

impl RegionConfig {
    fn default_bounds() -> BoundingBox2D {
        // SF-XL coverage, UTM zone 10N
        BoundingBox2D::new(542_823.0, 4_172_649.0, 555_844.0, 4_184_989.0)
    }

    const fn default_utm_zone() -> u8 {
        10
    }

    const fn default_northern() -> bool {
        true
    }

    const fn default_latitude_origin() -> i32 {
        3770
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            utm_zone: Self::default_utm_zone(),
            northern: Self::default_northern(),
            latitude_origin: Self::default_latitude_origin(),
            image_bucket_source: BucketSource::default(),
            bounds: Self::default_bounds(),
        }
    }
}

/// Lattice geometry shared by all tilings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatticeConfig {
    /// Cell radius of a scale-1 tiling, in meters
    #[serde(default = "LatticeConfig::default_base_radius")]
    pub base_radius: f64,

    /// Extra margin around the region explored by the flood fill
    #[serde(default = "LatticeConfig::default_tolerance")]
    pub tolerance: f64,

    #[serde(default = "LatticeConfig::default_tilings")]
    pub tilings: Vec<TilingConfiguration>,
}

impl LatticeConfig {
    const fn default_base_radius() -> f64 {
        5.0
    }

    const fn default_tolerance() -> f64 {
        5.0
    }

    fn default_tilings() -> Vec<TilingConfiguration> {
        TilingConfiguration::standard_set(Self::default_base_radius())
    }

    /// Radius of the hexagonal cells drawn by a tiling, before any
    /// containment thresholds are applied.
    pub fn cell_radius(&self, tiling: &TilingConfiguration) -> f64 {
        tiling.scale * self.base_radius
    }
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            base_radius: Self::default_base_radius(),
            tolerance: Self::default_tolerance(),
            tilings: Self::default_tilings(),
        }
    }
}

/// Positions of the `@`-separated fields read from each manifest line.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestLayout {
    #[serde(default)]
    pub latitude_field: usize,

    #[serde(default = "ManifestLayout::default_easting_field")]
    pub easting_field: usize,

    #[serde(default = "ManifestLayout::default_northing_field")]
    pub northing_field: usize,

    /// Keep every n-th manifest line (12 keeps one view per panorama)
    #[serde(default = "ManifestLayout::default_sample_stride")]
    pub sample_stride: usize,
}

impl ManifestLayout {
    const fn default_easting_field() -> usize {
        1
    }

    const fn default_northing_field() -> usize {
        2
    }

    const fn default_sample_stride() -> usize {
        1
    }
}

impl Default for ManifestLayout {
    fn default() -> Self {
        Self {
            latitude_field: 0,
            easting_field: Self::default_easting_field(),
            northing_field: Self::default_northing_field(),
            sample_stride: Self::default_sample_stride(),
        }
    }
}

/// Heading-variant expansion applied by the label merger.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelConfig {
    /// `@`-field of the image key holding the heading
    #[serde(default = "LabelConfig::default_heading_field")]
    pub heading_field: usize,

    /// Values written into the heading field, one output line each
    #[serde(default = "LabelConfig::default_heading_variants")]
    pub heading_variants: Vec<String>,
}

impl LabelConfig {
    const fn default_heading_field() -> usize {
        9
    }

    fn default_heading_variants() -> Vec<String> {
        vec!["0".to_string(), "180".to_string()]
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            heading_field: Self::default_heading_field(),
            heading_variants: Self::default_heading_variants(),
        }
    }
}

impl Config {
    const fn default_min_images_per_class() -> usize {
        20
    }

    pub fn with_min_images_per_class(mut self, min_images: usize) -> Self {
        assert!(min_images > 0, "Minimum images per class must be greater than zero");
        self.min_images_per_class = min_images;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundingBox2D) -> Self {
        self.region.bounds = bounds;
        self
    }

    pub fn with_tilings(mut self, tilings: Vec<TilingConfiguration>) -> Self {
        self.lattice.tilings = tilings;
        self
    }

    pub fn with_heading_variants(mut self, variants: Vec<String>) -> Self {
        self.labels.heading_variants = variants;
        self
    }

    /// Number of tiling configurations (K).
    pub fn config_count(&self) -> usize {
        self.lattice.tilings.len()
    }

    pub fn validate(&self) -> Result<()> {
        let bounds = &self.region.bounds;
        if !(bounds.width() > 0.0 && bounds.height() > 0.0) {
            return Err(invalid("Region bounds must have positive width and height"));
        }
        if !(1..=60).contains(&self.region.utm_zone) {
            return Err(invalid(format!(
                "UTM zone must be in 1..=60, got {}",
                self.region.utm_zone
            )));
        }
        if !(self.lattice.base_radius.is_finite() && self.lattice.base_radius > 0.0) {
            return Err(invalid("Base radius must be positive"));
        }
        if !(self.lattice.tolerance.is_finite() && self.lattice.tolerance >= 0.0) {
            return Err(invalid("Flood-fill tolerance must be non-negative"));
        }
        if self.lattice.tilings.is_empty() {
            return Err(invalid("At least one tiling configuration is required"));
        }
        if self.lattice.tilings.len() > u16::MAX as usize {
            return Err(invalid("Too many tiling configurations"));
        }

        for (position, tiling) in self.lattice.tilings.iter().enumerate() {
            if tiling.config_id as usize != position {
                return Err(invalid(format!(
                    "Tiling at position {} has config_id {}; ids must be 0..K in order",
                    position, tiling.config_id
                )));
            }
            if !(tiling.scale.is_finite() && tiling.scale > 0.0) {
                return Err(invalid(format!(
                    "Tiling {} scale must be positive",
                    tiling.config_id
                )));
            }
            if !(tiling.radius.is_finite() && tiling.radius > 0.0) {
                return Err(invalid(format!(
                    "Tiling {} radius must be positive",
                    tiling.config_id
                )));
            }
            if !(tiling.radius_squared.is_finite() && tiling.radius_squared >= 0.0) {
                return Err(invalid(format!(
                    "Tiling {} radius_squared must be non-negative",
                    tiling.config_id
                )));
            }
            if !(tiling.orientation.is_finite() && tiling.phase.is_finite()) {
                return Err(invalid(format!(
                    "Tiling {} orientation and phase must be finite",
                    tiling.config_id
                )));
            }
        }

        let layout = &self.manifest;
        if layout.easting_field == layout.northing_field {
            return Err(invalid("Easting and northing must be read from different fields"));
        }
        if layout.sample_stride == 0 {
            return Err(invalid("Manifest sample stride must be at least 1"));
        }

        if self.labels.heading_variants.is_empty() {
            return Err(invalid("At least one heading variant is required"));
        }
        if let Some(bad) = self
            .labels
            .heading_variants
            .iter()
            .find(|v| v.contains('@') || v.contains(char::is_whitespace))
        {
            return Err(invalid(format!(
                "Heading variant {:?} may not contain '@' or whitespace",
                bad
            )));
        }

        if self.min_images_per_class == 0 {
            return Err(invalid("Minimum images per class must be greater than zero"));
        }

        self.warn_on_degenerate_tilings();
        Ok(())
    }

    /// Reports tilings that are legal but likely to misbehave.
    fn warn_on_degenerate_tilings(&self) {
        for tiling in &self.lattice.tilings {
            if !tiling.is_consistent() {
                log::warn!(
                    "Tiling {} uses radius_squared {} with radius {}; the circular and \
                     bounding-box tests will disagree",
                    tiling.config_id,
                    tiling.radius_squared,
                    tiling.radius
                );
            }
            if tiling.radius >= BUCKET_BAND_METERS {
                log::warn!(
                    "Tiling {} radius {} m spans a whole latitude bucket; matches across \
                     bucket boundaries will be missed",
                    tiling.config_id,
                    tiling.radius
                );
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(toml_str).map_err(|e| GeocellsError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GeocellsError::Serialization(e.to_string()))
    }

    /// Load a configuration file, picking the format from its extension.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            #[cfg(feature = "toml")]
            Some("toml") => Self::from_toml(&text),
            Some("json") => Self::from_json(&text),
            other => Err(invalid(format!(
                "Unsupported configuration format: {:?}",
                other.unwrap_or("")
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_images_per_class: Self::default_min_images_per_class(),
            workers: 0,
            region: RegionConfig::default(),
            lattice: LatticeConfig::default(),
            manifest: ManifestLayout::default(),
            labels: LabelConfig::default(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> GeocellsError {
    GeocellsError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.min_images_per_class, 20);
        assert_eq!(config.config_count(), 16);
        assert_eq!(config.region.utm_zone, 10);
        assert_eq!(config.labels.heading_field, 9);
        assert_eq!(config.labels.heading_variants, vec!["0", "180"]);
        assert_eq!(config.manifest.easting_field, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default()
            .with_min_images_per_class(5)
            .with_workers(3)
            .with_heading_variants(vec!["90".into()]);

        let json = config.to_json().unwrap();
        let deserialized = Config::from_json(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(r#"{ "min_images_per_class": 2 }"#).unwrap();
        assert_eq!(config.min_images_per_class, 2);
        assert_eq!(config.lattice.base_radius, 5.0);
        assert_eq!(config.config_count(), 16);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Config::from_json(r#"{ "min_images": 2 }"#).is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default().with_min_images_per_class(7);
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_config_validation_rejects_bad_ids() {
        let mut tilings = TilingConfiguration::standard_set(5.0);
        tilings.swap(0, 1);
        let config = Config::default().with_tilings(tilings);
        assert!(matches!(
            config.validate(),
            Err(GeocellsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_validation_rejects_zero_stride() {
        let mut config = Config::default();
        assert_eq!(config.manifest.sample_stride, 1);
        config.manifest.sample_stride = 0;
        assert!(matches!(
            config.validate(),
            Err(GeocellsError::InvalidConfig(_))
        ));

        let parsed = Config::from_json(r#"{ "manifest": { "sample_stride": 12 } }"#).unwrap();
        assert_eq!(parsed.manifest.sample_stride, 12);
    }

    #[test]
    fn test_config_validation_rejects_empty_variants() {
        let config = Config::default().with_heading_variants(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inconsistent_radius_squared_is_allowed() {
        let tilings = vec![
            TilingConfiguration::new(0, 1.0, 0.0, Coordinate::new(0.0, 0.0), 5.0)
                .with_radius_squared(10.0),
        ];
        let config = Config::default().with_tilings(tilings);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cell_radius_follows_scale() {
        let lattice = LatticeConfig::default();
        assert_eq!(lattice.cell_radius(&lattice.tilings[0]), 5.0);
        assert_eq!(lattice.cell_radius(&lattice.tilings[8]), 10.0);
    }
}
