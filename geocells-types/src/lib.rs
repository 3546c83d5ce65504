//! # geocells-types
//!
//! Core data types for partitioning geo-tagged image collections into
//! hexagonal spatial classes.
//!
//! - **Coordinates**: `Coordinate` (planar easting/northing), `BoundingBox2D`
//! - **Tilings**: `TilingConfiguration`, `CellCenter`
//! - **Labels**: `ClassId`
//! - **Reporting**: `PipelineStats`
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use geocells_types::bbox::BoundingBox2D;
//! use geocells_types::coord::Coordinate;
//!
//! let region = BoundingBox2D::new(0.0, 0.0, 100.0, 100.0);
//! let center = region.center();
//! assert_eq!(center, Coordinate::new(50.0, 50.0));
//! assert!(region.contains(&center));
//! ```

pub mod bbox;
pub mod coord;
pub mod stats;
pub mod tiling;
