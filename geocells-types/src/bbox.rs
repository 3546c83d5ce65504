use crate::coord::Coordinate;
use geo::Rect;
use serde::{Deserialize, Serialize};

/// A 2D axis-aligned bounding box in projected coordinates.
///
/// This is a wrapper around `geo::Rect` with additional functionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
    /// The underlying geometric rectangle
    pub rect: Rect,
}

impl BoundingBox2D {
    /// Create a new bounding box from minimum and maximum coordinates.
    ///
    /// # Arguments
    ///
    /// * `min_x` - Minimum easting
    /// * `min_y` - Minimum northing
    /// * `max_x` - Maximum easting
    /// * `max_y` - Maximum northing
    ///
    /// # Examples
    ///
    /// ```
    /// use geocells_types::bbox::BoundingBox2D;
    ///
    /// let bbox = BoundingBox2D::new(542_823.0, 4_172_649.0, 555_844.0, 4_184_989.0);
    /// assert_eq!(bbox.width(), 13_021.0);
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            rect: Rect::new(
                geo::coord! { x: min_x, y: min_y },
                geo::coord! { x: max_x, y: max_y },
            ),
        }
    }

    /// Get the minimum x coordinate.
    pub fn min_x(&self) -> f64 {
        self.rect.min().x
    }

    /// Get the minimum y coordinate.
    pub fn min_y(&self) -> f64 {
        self.rect.min().y
    }

    /// Get the maximum x coordinate.
    pub fn max_x(&self) -> f64 {
        self.rect.max().x
    }

    /// Get the maximum y coordinate.
    pub fn max_y(&self) -> f64 {
        self.rect.max().y
    }

    /// Get the geometric center of the bounding box.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_x() + self.max_x()) / 2.0,
            (self.min_y() + self.max_y()) / 2.0,
        )
    }

    /// Get the width of the bounding box.
    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    /// Get the height of the bounding box.
    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    /// Check if a coordinate lies within this bounding box (edges included).
    pub fn contains(&self, coord: &Coordinate) -> bool {
        coord.easting >= self.min_x()
            && coord.easting <= self.max_x()
            && coord.northing >= self.min_y()
            && coord.northing <= self.max_y()
    }

    /// Expand the bounding box by a given amount in all directions.
    pub fn expand(&self, amount: f64) -> Self {
        Self::new(
            self.min_x() - amount,
            self.min_y() - amount,
            self.max_x() + amount,
            self.max_y() + amount,
        )
    }
}
