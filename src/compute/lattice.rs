//! Hexagonal lattice generation for one tiling configuration.
//!
//! The lattice is grown by a breadth-first flood fill from the region's
//! center, six neighbors per node, until the (slightly expanded) region is
//! exhausted. The finished lattice is then rotated about the seed, translated
//! by the tiling's phase, and clipped back to the region.
//!
//! ```rust
//! use geocells::compute::lattice::LatticeGenerator;
//! use geocells::config::{BoundingBox2D, Coordinate, LatticeConfig, TilingConfiguration};
//!
//! let region = BoundingBox2D::new(0.0, 0.0, 100.0, 100.0);
//! let settings = LatticeConfig::default();
//! let tiling = TilingConfiguration::new(0, 1.0, 0.0, Coordinate::new(0.0, 0.0), 5.0);
//!
//! let centers = LatticeGenerator::new(&region, &settings).generate(&tiling);
//! assert_eq!(centers[0].coord, Coordinate::new(50.0, 50.0));
//! ```

use crate::config::{BoundingBox2D, CellCenter, Coordinate, LatticeConfig, TilingConfiguration};
use geo::{AffineOps, AffineTransform, Translate};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::time::Instant;

/// Distance between adjacent lattice points, in cell radii.
pub const SPACING_FACTOR: f64 = 4.0;

/// Builds cell centers for tilings over a fixed region.
pub struct LatticeGenerator<'a> {
    region: &'a BoundingBox2D,
    settings: &'a LatticeConfig,
}

impl<'a> LatticeGenerator<'a> {
    pub fn new(region: &'a BoundingBox2D, settings: &'a LatticeConfig) -> Self {
        Self { region, settings }
    }

    /// Flood-fill start point: the region's center, on the 2-decimal grid.
    pub fn seed(&self) -> Coordinate {
        self.region.center().rounded()
    }

    /// Generate the clipped, deduplicated centers of one tiling, in BFS order.
    pub fn generate(&self, tiling: &TilingConfiguration) -> Vec<CellCenter> {
        let cell_radius = self.settings.cell_radius(tiling);
        let lattice = self.flood_fill(cell_radius);
        self.place(tiling, &lattice)
    }

    /// Generate every tiling in parallel. The result is indexed by config id.
    ///
    /// Tilings sharing a scale share one flood fill.
    pub fn generate_all(&self, tilings: &[TilingConfiguration]) -> Vec<Vec<CellCenter>> {
        let started = Instant::now();

        let mut radii: Vec<f64> = tilings
            .iter()
            .map(|t| self.settings.cell_radius(t))
            .collect();
        radii.sort_by(f64::total_cmp);
        radii.dedup_by(|a, b| a.to_bits() == b.to_bits());

        let fills: FxHashMap<u64, Vec<Coordinate>> = radii
            .par_iter()
            .map(|r| (r.to_bits(), self.flood_fill(*r)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        let centers: Vec<Vec<CellCenter>> = tilings
            .par_iter()
            .map(|tiling| {
                let bits = self.settings.cell_radius(tiling).to_bits();
                self.place(tiling, &fills[&bits])
            })
            .collect();

        for (tiling, group) in tilings.iter().zip(&centers) {
            log::info!(
                "Tiling {} (scale {}, orientation {}°, phase {}): {} centers",
                tiling.config_id,
                tiling.scale,
                tiling.orientation,
                tiling.phase,
                group.len()
            );
        }
        log::info!(
            "Generated {} tilings in {:.2}s",
            tilings.len(),
            started.elapsed().as_secs_f64()
        );
        centers
    }

    /// Untransformed lattice around the seed, in BFS visitation order.
    fn flood_fill(&self, cell_radius: f64) -> Vec<Coordinate> {
        let bounds = self.region.expand(cell_radius + self.settings.tolerance);
        let spacing = SPACING_FACTOR * cell_radius;
        let offsets: [(f64, f64); 6] = std::array::from_fn(|i| {
            let angle = (60.0 * i as f64).to_radians();
            (spacing * angle.cos(), spacing * angle.sin())
        });

        let seed = self.seed();
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();
        let mut order = Vec::new();

        visited.insert(seed.grid_key());
        queue.push_back(seed);
        order.push(seed);

        while let Some(current) = queue.pop_front() {
            for (dx, dy) in offsets {
                let neighbor =
                    Coordinate::new(current.easting + dx, current.northing + dy).rounded();
                if bounds.contains(&neighbor) && visited.insert(neighbor.grid_key()) {
                    queue.push_back(neighbor);
                    order.push(neighbor);
                }
            }
        }

        order
    }

    /// Rotate (clockwise, about the seed), translate, clip, and index.
    fn place(&self, tiling: &TilingConfiguration, lattice: &[Coordinate]) -> Vec<CellCenter> {
        let clip = self.region.expand(self.settings.cell_radius(tiling));
        let seed: geo::Point<f64> = self.seed().into();
        let rotation = AffineTransform::rotate(-tiling.orientation, seed);

        lattice
            .iter()
            .map(|coord| {
                let point = geo::Point::<f64>::from(*coord)
                    .affine_transform(&rotation)
                    .translate(tiling.phase.easting, tiling.phase.northing);
                Coordinate::from(point).rounded()
            })
            .filter(|coord| clip.contains(coord))
            .enumerate()
            .map(|(index, coord)| CellCenter::new(tiling, index as u32, coord))
            .collect()
    }
}
