//! Stage orchestration over a work directory.
//!
//! ```text
//! <work_dir>/centers/centers_<bucket>.txt
//! <work_dir>/images/images_<bucket>.txt
//! <work_dir>/assignments/assignments_<bucket>.txt
//! <work_dir>/labels/labels_<bucket>.txt
//! ```
//!
//! Each stage reads only the previous stage's files, clears its own outputs
//! before writing and runs its buckets on a fixed worker pool.

pub mod cache_builder;
pub mod merge;

use crate::compute::assign::SpatialAssigner;
use crate::compute::bucket::{RegionBucket, RegionBucketer};
use crate::compute::lattice::LatticeGenerator;
use crate::config::{BucketSource, Config, PipelineStats};
use crate::error::Result;
use crate::manifest::ManifestParser;
use crate::storage::records::{
    read_centers, read_images, write_assignments, write_centers, write_images,
};
use crate::storage::{ClassCache, StageDir};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub use cache_builder::ClassCacheBuilder;
pub use merge::LabelMerger;

/// Counts from splitting the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub images: usize,
    pub buckets: usize,
}

/// Runs the partitioning stages for one configuration and work directory.
pub struct Pipeline {
    config: Config,
    work_dir: PathBuf,
    pool: rayon::ThreadPool,
}

impl Pipeline {
    pub fn new<P: AsRef<Path>>(config: Config, work_dir: P) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("geocells-worker-{}", i))
            .build()?;

        Ok(Self {
            config,
            work_dir: work_dir.as_ref().to_path_buf(),
            pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn centers_stage(&self) -> StageDir {
        StageDir::new(self.work_dir.join("centers"), "centers")
    }

    pub fn images_stage(&self) -> StageDir {
        StageDir::new(self.work_dir.join("images"), "images")
    }

    pub fn assignments_stage(&self) -> StageDir {
        StageDir::new(self.work_dir.join("assignments"), "assignments")
    }

    pub fn labels_stage(&self) -> StageDir {
        StageDir::new(self.work_dir.join("labels"), "labels")
    }

    /// Generate every tiling and write its centers into per-bucket files.
    /// Returns the center count of each configuration.
    pub fn generate_centers(&self) -> Result<Vec<usize>> {
        let started = Instant::now();
        let lattice = &self.config.lattice;
        let generator = LatticeGenerator::new(&self.config.region.bounds, lattice);
        let per_config = self.pool.install(|| generator.generate_all(&lattice.tilings));
        let counts: Vec<usize> = per_config.iter().map(Vec::len).collect();

        let buckets = RegionBucketer::new(&self.config.region)
            .bucket_centers(per_config.into_iter().flatten())?;

        let stage = self.centers_stage();
        stage.reset()?;
        self.pool.install(|| {
            buckets
                .par_iter()
                .try_for_each(|(bucket, centers)| write_centers(&stage.path_for(*bucket), centers))
        })?;

        log::info!(
            "Wrote {} centers into {} buckets in {:.2}s",
            counts.iter().sum::<usize>(),
            buckets.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(counts)
    }

    /// Read the manifest and write its images into per-bucket files.
    pub fn split_manifest(&self, manifest: &Path) -> Result<SplitSummary> {
        let started = Instant::now();
        let bucketer = RegionBucketer::new(&self.config.region);
        let parser = ManifestParser::new(self.config.manifest.clone())
            .require_latitude(bucketer.image_source() == BucketSource::LatitudePrefix);

        let images = parser.read(manifest)?;
        let image_count = images.len();
        let buckets = bucketer.bucket_images(images)?;

        let stage = self.images_stage();
        stage.reset()?;
        self.pool.install(|| {
            buckets
                .par_iter()
                .try_for_each(|(bucket, images)| write_images(&stage.path_for(*bucket), images))
        })?;

        log::info!(
            "Split {} images from {} into {} buckets in {:.2}s",
            image_count,
            manifest.display(),
            buckets.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(SplitSummary {
            images: image_count,
            buckets: buckets.len(),
        })
    }

    /// Match each image bucket against the centers of the same bucket.
    /// Returns the assignment count of each configuration.
    pub fn assign(&self) -> Result<Vec<usize>> {
        let started = Instant::now();
        let config_count = self.config.config_count();
        let image_files = self.images_stage().files()?;
        let center_files = self.centers_stage().files()?;
        let stage = self.assignments_stage();
        stage.reset()?;

        let per_bucket: Vec<Vec<usize>> = self.pool.install(|| {
            image_files
                .par_iter()
                .map(|(bucket, images_path)| {
                    let Some(centers_path) = center_files.get(bucket) else {
                        log::warn!(
                            "Image bucket {} has no center file; its images are not assigned",
                            bucket
                        );
                        return Ok(vec![0; config_count]);
                    };
                    self.assign_bucket(*bucket, images_path, centers_path, &stage)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut stats = PipelineStats::new();
        stats.assignments_per_config = vec![0; config_count];
        for counts in &per_bucket {
            stats.record_assignments(counts);
        }
        for config_id in stats.silent_configs() {
            log::warn!("Tiling {} produced no assignments", config_id);
        }

        log::info!(
            "Assigned {} bucket(s), {} assignments in {:.2}s",
            per_bucket.len(),
            stats.total_assignments(),
            started.elapsed().as_secs_f64()
        );
        Ok(stats.assignments_per_config)
    }

    fn assign_bucket(
        &self,
        bucket: RegionBucket,
        images_path: &Path,
        centers_path: &Path,
        stage: &StageDir,
    ) -> Result<Vec<usize>> {
        let images = read_images(images_path)?;
        let assigner = SpatialAssigner::new(read_centers(centers_path)?, self.config.config_count());
        let batch = assigner.assign(&images);

        write_assignments(&stage.path_for(bucket), &batch.assignments)?;
        log::debug!(
            "Bucket {}: {} images, {} centers, {} assignments",
            bucket,
            images.len(),
            assigner.center_count(),
            batch.assignments.len()
        );
        Ok(batch.per_config)
    }

    /// Merge every assignment file into a label file. Returns the number of
    /// label lines written.
    pub fn merge_labels(&self) -> Result<usize> {
        let started = Instant::now();
        let merger = LabelMerger::new(&self.config.labels);
        let inputs = self.assignments_stage().files()?;
        let stage = self.labels_stage();
        stage.reset()?;

        let written: usize = self.pool.install(|| {
            inputs
                .par_iter()
                .map(|(bucket, path)| merger.merge_file(path, &stage.path_for(*bucket)))
                .collect::<Result<Vec<_>>>()
        })?
        .into_iter()
        .sum();

        log::info!(
            "Merged {} bucket(s) into {} label lines ({} heading variants) in {:.2}s",
            inputs.len(),
            written,
            merger.variant_count(),
            started.elapsed().as_secs_f64()
        );
        Ok(written)
    }

    /// Aggregate all label files and write the cache to `output`.
    ///
    /// A `.json` output is written as JSON; anything else uses the binary
    /// format.
    pub fn build_cache(&self, output: &Path) -> Result<ClassCache> {
        let mut stats = PipelineStats::new();
        self.build_cache_with_stats(output, &mut stats)
    }

    fn build_cache_with_stats(&self, output: &Path, stats: &mut PipelineStats) -> Result<ClassCache> {
        let started = Instant::now();
        let mut builder = ClassCacheBuilder::new(
            self.config.min_images_per_class,
            self.config.config_count(),
        );
        for path in self.labels_stage().files()?.values() {
            builder.add_file(path)?;
        }
        stats.classes_seen = builder.classes_seen();

        let cache = builder.finish()?;
        stats.classes_retained = cache.class_count();
        write_cache(&cache, output)?;

        log::info!(
            "Wrote cache with {} classes and {} image entries to {} in {:.2}s",
            cache.class_count(),
            cache.image_entries(),
            output.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(cache)
    }

    /// Run every stage in order, from the manifest to the cache artifact.
    pub fn run(&self, manifest: &Path, output: &Path) -> Result<PipelineStats> {
        let started = Instant::now();
        let mut stats = PipelineStats::new();

        stats.centers_per_config = self.generate_centers()?;

        let split = self.split_manifest(manifest)?;
        stats.images = split.images;
        stats.image_buckets = split.buckets;

        stats.record_assignments(&self.assign()?);
        stats.merged_lines = self.merge_labels()?;
        self.build_cache_with_stats(output, &mut stats)?;

        log::info!(
            "Pipeline finished in {:.2}s: {} images, {} assignments, {} classes retained",
            started.elapsed().as_secs_f64(),
            stats.images,
            stats.total_assignments(),
            stats.classes_retained
        );
        Ok(stats)
    }
}

fn write_cache(cache: &ClassCache, output: &Path) -> Result<()> {
    if output.extension().and_then(|e| e.to_str()) == Some("json") {
        return cache.save_json(output);
    }
    write_binary_cache(cache, output)
}

#[cfg(feature = "snapshot")]
fn write_binary_cache(cache: &ClassCache, output: &Path) -> Result<()> {
    crate::storage::CacheFile::new(output).save(cache)
}

#[cfg(not(feature = "snapshot"))]
fn write_binary_cache(_cache: &ClassCache, output: &Path) -> Result<()> {
    Err(crate::error::GeocellsError::InvalidInput(format!(
        "binary cache output {} needs the `snapshot` feature; use a .json path",
        output.display()
    )))
}
