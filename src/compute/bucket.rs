//! Region bucketing by latitude band.
//!
//! Centers and images are compared only when they land in the same bucket,
//! which keeps every per-bucket stage independent and memory-bounded. A bucket
//! is one hundredth of a degree of latitude, counted from a configured origin.

use crate::compute::projection::{UtmZone, utm_to_lat_lon};
use crate::config::{BucketSource, CellCenter, Coordinate, RegionConfig};
use crate::error::{GeocellsError, Result};
use crate::manifest::ImageRecord;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key of one latitude band. Negative keys are legal for bands south of the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionBucket(pub i32);

impl fmt::Display for RegionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegionBucket {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(RegionBucket)
    }
}

/// Maps coordinates and latitudes to [`RegionBucket`]s.
#[derive(Debug, Clone)]
pub struct RegionBucketer {
    zone: UtmZone,
    origin: i32,
    image_source: BucketSource,
}

impl RegionBucketer {
    pub fn new(region: &RegionConfig) -> Self {
        Self {
            zone: UtmZone::new(region.utm_zone, region.northern),
            origin: region.latitude_origin,
            image_source: region.image_bucket_source,
        }
    }

    /// Bucket of a latitude in degrees.
    ///
    /// ```
    /// use geocells::compute::bucket::{RegionBucket, RegionBucketer};
    /// use geocells::config::RegionConfig;
    ///
    /// let bucketer = RegionBucketer::new(&RegionConfig::default());
    /// assert_eq!(bucketer.for_latitude(37.7512), RegionBucket(5));
    /// assert_eq!(bucketer.for_latitude(37.70), RegionBucket(0));
    /// ```
    pub fn for_latitude(&self, latitude: f64) -> RegionBucket {
        RegionBucket(hundredths(latitude) - self.origin)
    }

    /// Bucket of a projected coordinate, through the inverse projection.
    pub fn for_coordinate(&self, coord: &Coordinate) -> Result<RegionBucket> {
        let (latitude, _) = utm_to_lat_lon(coord.easting, coord.northing, self.zone)?;
        Ok(self.for_latitude(latitude))
    }

    pub fn for_image(&self, image: &ImageRecord) -> Result<RegionBucket> {
        match self.image_source {
            BucketSource::Projection => self.for_coordinate(&image.coord),
            BucketSource::LatitudePrefix => image
                .latitude
                .map(|lat| self.for_latitude(lat))
                .ok_or_else(|| {
                    GeocellsError::InvalidInput(format!(
                        "image has no latitude prefix: {}",
                        image.key
                    ))
                }),
        }
    }

    pub fn bucket_centers<I>(&self, centers: I) -> Result<BTreeMap<RegionBucket, Vec<CellCenter>>>
    where
        I: IntoIterator<Item = CellCenter>,
    {
        let mut buckets: BTreeMap<RegionBucket, Vec<CellCenter>> = BTreeMap::new();
        for center in centers {
            let bucket = self.for_coordinate(&center.coord)?;
            buckets.entry(bucket).or_default().push(center);
        }
        Ok(buckets)
    }

    /// Group images by bucket, keeping manifest order inside each bucket.
    pub fn bucket_images<I>(&self, images: I) -> Result<BTreeMap<RegionBucket, Vec<ImageRecord>>>
    where
        I: IntoIterator<Item = ImageRecord>,
    {
        let mut buckets: BTreeMap<RegionBucket, Vec<ImageRecord>> = BTreeMap::new();
        for image in images {
            let bucket = self.for_image(&image)?;
            buckets.entry(bucket).or_default().push(image);
        }
        Ok(buckets)
    }

    pub fn image_source(&self) -> BucketSource {
        self.image_source
    }
}

/// Latitude truncated to hundredths of a degree.
///
/// The nudge keeps decimal inputs such as `37.71` from landing one band low
/// through binary representation error.
fn hundredths(latitude: f64) -> i32 {
    (latitude * 100.0 + 1e-7).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TilingConfiguration;

    fn bucketer(source: BucketSource) -> RegionBucketer {
        let region = RegionConfig {
            image_bucket_source: source,
            ..RegionConfig::default()
        };
        RegionBucketer::new(&region)
    }

    #[test]
    fn test_hundredths_truncates() {
        assert_eq!(hundredths(37.71), 3771);
        assert_eq!(hundredths(37.7199), 3771);
        assert_eq!(hundredths(37.29), 3729);
        assert_eq!(hundredths(-0.005), -1);
    }

    #[test]
    fn test_bucket_keys_are_relative_to_origin() {
        let b = bucketer(BucketSource::LatitudePrefix);
        assert_eq!(b.for_latitude(37.81), RegionBucket(11));
        assert_eq!(b.for_latitude(37.69), RegionBucket(-1));
    }

    #[test]
    fn test_prefix_and_projection_agree_inside_band() {
        let coord = Coordinate::new(549_333.0, 4_178_819.0);
        let by_projection = bucketer(BucketSource::Projection);
        let (lat, _) = utm_to_lat_lon(coord.easting, coord.northing, UtmZone::new(10, true)).unwrap();

        let image = ImageRecord::new("k", coord).with_latitude(lat);
        assert_eq!(
            by_projection.for_image(&image).unwrap(),
            bucketer(BucketSource::LatitudePrefix).for_image(&image).unwrap()
        );
    }

    #[test]
    fn test_prefix_source_requires_latitude() {
        let image = ImageRecord::new("k", Coordinate::new(549_333.0, 4_178_819.0));
        assert!(bucketer(BucketSource::LatitudePrefix).for_image(&image).is_err());
        assert!(bucketer(BucketSource::Projection).for_image(&image).is_ok());
    }

    #[test]
    fn test_bucket_centers_spans_region() {
        let b = bucketer(BucketSource::LatitudePrefix);
        let tiling = TilingConfiguration::new(0, 1.0, 0.0, Coordinate::new(0.0, 0.0), 5.0);
        let south = CellCenter::new(&tiling, 0, Coordinate::new(549_000.0, 4_173_500.0));
        let north = CellCenter::new(&tiling, 1, Coordinate::new(549_000.0, 4_184_900.0));

        let buckets = b.bucket_centers(vec![south, north]).unwrap();
        let keys: Vec<RegionBucket> = buckets.keys().copied().collect();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].0 >= -1 && keys[1].0 <= 13, "keys = {:?}", keys);
        assert!(keys[1].0 - keys[0].0 >= 10);
    }

    #[test]
    fn test_bucket_images_preserves_order() {
        let b = bucketer(BucketSource::LatitudePrefix);
        let images = vec![
            ImageRecord::new("a", Coordinate::new(1.0, 1.0)).with_latitude(37.755),
            ImageRecord::new("b", Coordinate::new(1.0, 1.0)).with_latitude(37.701),
            ImageRecord::new("c", Coordinate::new(1.0, 1.0)).with_latitude(37.759),
        ];
        let buckets = b.bucket_images(images).unwrap();
        let five: Vec<&str> = buckets[&RegionBucket(5)].iter().map(|i| i.key.as_str()).collect();
        assert_eq!(five, vec!["a", "c"]);
        assert_eq!(buckets[&RegionBucket(0)].len(), 1);
    }
}
