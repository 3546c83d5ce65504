//! Spatial assignment of images to cell centers within one region bucket.
//!
//! Centers are indexed in an R*-tree by their radius-sized bounding boxes, so
//! each image only visits the centers whose box could contain it. Every
//! candidate is then checked with the exact three-part predicate of
//! [`CellCenter::contains`], and all matches are kept, not only the first.

use crate::config::{CellCenter, ClassId, Coordinate};
use crate::manifest::ImageRecord;
use rstar::{AABB, RTree};
use smallvec::SmallVec;

/// Padding added to every envelope so the tree never rejects a boundary
/// match that the exact predicate would accept.
const ENVELOPE_SLACK: f64 = 1e-3;

/// Cell center stored in the R*-tree.
#[derive(Debug, Clone, PartialEq)]
struct IndexedCenter {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    center: CellCenter,
}

impl IndexedCenter {
    fn new(center: CellCenter) -> Self {
        let reach = center.radius + ENVELOPE_SLACK;
        Self {
            min_x: center.coord.easting - reach,
            min_y: center.coord.northing - reach,
            max_x: center.coord.easting + reach,
            max_y: center.coord.northing + reach,
            center,
        }
    }
}

impl rstar::RTreeObject for IndexedCenter {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// One image belonging to one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub class_id: ClassId,
    pub image_key: &'a str,
}

/// Assignments of a bucket plus per-configuration match counts.
#[derive(Debug, Clone, Default)]
pub struct AssignmentBatch<'a> {
    pub assignments: Vec<Assignment<'a>>,
    pub per_config: Vec<usize>,
}

/// Matches images against all centers of one bucket, across configurations.
pub struct SpatialAssigner {
    tree: RTree<IndexedCenter>,
    config_count: usize,
}

impl SpatialAssigner {
    pub fn new(centers: Vec<CellCenter>, config_count: usize) -> Self {
        let indexed = centers.into_iter().map(IndexedCenter::new).collect();
        Self {
            tree: RTree::bulk_load(indexed),
            config_count,
        }
    }

    pub fn center_count(&self) -> usize {
        self.tree.size()
    }

    /// Every class whose cell contains `coord`, ordered by config id then
    /// local index.
    pub fn matches(&self, coord: &Coordinate) -> SmallVec<[ClassId; 16]> {
        let probe = AABB::from_point([coord.easting, coord.northing]);
        let mut found: SmallVec<[ClassId; 16]> = self
            .tree
            .locate_in_envelope_intersecting(&probe)
            .filter(|indexed| indexed.center.contains(coord))
            .map(|indexed| indexed.center.class_id())
            .collect();
        found.sort_unstable();
        found
    }

    /// Assign every image, in input order.
    pub fn assign<'a>(&self, images: &'a [ImageRecord]) -> AssignmentBatch<'a> {
        let mut batch = AssignmentBatch {
            assignments: Vec::new(),
            per_config: vec![0; self.config_count],
        };

        for image in images {
            for class_id in self.matches(&image.coord) {
                if let Some(count) = batch.per_config.get_mut(class_id.config_id as usize) {
                    *count += 1;
                }
                batch.assignments.push(Assignment {
                    class_id,
                    image_key: &image.key,
                });
            }
        }

        batch
    }
}
