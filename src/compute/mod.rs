//! Lattice generation, projection, bucketing, spatial assignment, and validation.

pub mod assign;
pub mod bucket;
pub mod lattice;
pub mod projection;
pub mod validation;
