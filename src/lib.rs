//! Hexagonal geo-cell partitioning of geo-tagged image collections.
//!
//! Several hexagonal tilings of a projected region are generated, every image
//! is assigned to each cell that contains it, and the per-cell image lists
//! become classification labels, one label space per tiling.
//!
//! ```rust,no_run
//! use geocells::{Config, Pipeline};
//! use std::path::Path;
//!
//! let pipeline = Pipeline::new(Config::default(), "work")?;
//! let stats = pipeline.run(Path::new("manifest.txt"), Path::new("cache.bin"))?;
//! println!("{} classes retained", stats.classes_retained);
//! # Ok::<(), geocells::GeocellsError>(())
//! ```

pub mod compute;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod storage;

pub use config::{
    BoundingBox2D, CellCenter, ClassId, Config, Coordinate, PipelineStats, TilingConfiguration,
};
pub use error::{GeocellsError, Result};
pub use manifest::{ImageRecord, ManifestParser};
pub use pipeline::{ClassCacheBuilder, LabelMerger, Pipeline};

pub use compute::assign::SpatialAssigner;
pub use compute::bucket::{RegionBucket, RegionBucketer};
pub use compute::lattice::LatticeGenerator;

#[cfg(feature = "snapshot")]
pub use storage::CacheFile;
pub use storage::ClassCache;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Config, GeocellsError, Pipeline, Result};

    pub use crate::{BoundingBox2D, ClassId, Coordinate, TilingConfiguration};

    pub use crate::{LatticeGenerator, RegionBucketer, SpatialAssigner};

    pub use crate::ClassCache;

    #[cfg(feature = "snapshot")]
    pub use crate::CacheFile;
}
