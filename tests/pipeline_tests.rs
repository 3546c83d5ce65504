use geocells::compute::projection::{UtmZone, utm_to_lat_lon};
use geocells::{BoundingBox2D, ClassId, Config, Coordinate, Pipeline, TilingConfiguration};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Region centered on (549333, 4178783), mid-band around 37.755°N.
fn region() -> BoundingBox2D {
    BoundingBox2D::new(549_283.0, 4_178_733.0, 549_383.0, 4_178_833.0)
}

fn single_tiling_config() -> Config {
    Config::default()
        .with_bounds(region())
        .with_tilings(vec![TilingConfiguration::new(
            0,
            1.0,
            0.0,
            Coordinate::new(0.0, 0.0),
            5.0,
        )])
        .with_min_images_per_class(2)
        .with_workers(2)
}

fn manifest_line(easting: f64, northing: f64) -> String {
    let (lat, _) = utm_to_lat_lon(easting, northing, UtmZone::new(10, true)).unwrap();
    format!(
        "{:.6}@{:.2}@{:.2}@10@S@037.75@-122.44@pano@@0@@@@201311@@.jpg",
        lat, easting, northing
    )
}

fn write_manifest(dir: &Path, points: &[(f64, f64)]) -> std::path::PathBuf {
    let path = dir.join("manifest.txt");
    let mut file = fs::File::create(&path).unwrap();
    for &(e, n) in points {
        writeln!(file, "{}", manifest_line(e, n)).unwrap();
    }
    path
}

/// Three images near the seed center, one between lattice points.
fn seed_points() -> Vec<(f64, f64)> {
    vec![
        (549_334.0, 4_178_783.0),
        (549_333.0, 4_178_785.0),
        (549_330.0, 4_178_780.0),
        (549_343.0, 4_178_783.0),
    ]
}

#[test]
fn test_end_to_end_single_tiling() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(tmp.path(), &seed_points());
    let output = tmp.path().join("cache.bin");

    let pipeline = Pipeline::new(single_tiling_config(), tmp.path().join("work")).unwrap();
    let stats = pipeline.run(&manifest, &output).unwrap();

    assert!(stats.centers_per_config[0] > 1);
    assert_eq!(stats.images, 4);
    assert_eq!(stats.image_buckets, 1);
    assert_eq!(stats.assignments_per_config, vec![3]);
    assert_eq!(stats.merged_lines, 6);
    assert_eq!(stats.classes_seen, 1);
    assert_eq!(stats.classes_retained, 1);

    let cache = geocells::CacheFile::new(&output).load().unwrap();
    let seed_class = ClassId::new(0, 0);
    assert_eq!(cache.classes_per_config, vec![vec![seed_class]]);

    let images = cache.images_of(&seed_class).unwrap();
    assert_eq!(images.len(), 6);
    let headings: Vec<&str> = images
        .iter()
        .map(|key| key.split('@').nth(9).unwrap())
        .collect();
    assert_eq!(headings, vec!["0", "180", "0", "180", "0", "180"]);
    cache.verify().unwrap();
}

#[test]
fn test_stage_by_stage_matches_run() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(tmp.path(), &seed_points());

    let pipeline = Pipeline::new(single_tiling_config(), tmp.path().join("work")).unwrap();
    pipeline.generate_centers().unwrap();
    let split = pipeline.split_manifest(&manifest).unwrap();
    assert_eq!(split.images, 4);
    assert_eq!(pipeline.assign().unwrap(), vec![3]);
    assert_eq!(pipeline.merge_labels().unwrap(), 6);
    let staged = pipeline.build_cache(&tmp.path().join("staged.json")).unwrap();

    let other = Pipeline::new(single_tiling_config(), tmp.path().join("other")).unwrap();
    other.run(&manifest, &tmp.path().join("whole.json")).unwrap();
    let whole = geocells::ClassCache::load_json(&tmp.path().join("whole.json")).unwrap();
    assert_eq!(staged, whole);
}

#[test]
fn test_rerun_overwrites_previous_outputs() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let manifest = write_manifest(tmp.path(), &seed_points());
    let output = tmp.path().join("cache.json");
    let pipeline = Pipeline::new(single_tiling_config(), tmp.path().join("work")).unwrap();

    let first_stats = pipeline.run(&manifest, &output).unwrap();
    let first = fs::read_to_string(&output).unwrap();

    let labels = pipeline.labels_stage();
    fs::write(labels.dir().join("labels_99.txt"), "stale 0 1 2\n").unwrap();

    let second_stats = pipeline.run(&manifest, &output).unwrap();
    let second = fs::read_to_string(&output).unwrap();

    assert_eq!(first_stats, second_stats);
    assert_eq!(first, second);
    assert!(!labels.dir().join("labels_99.txt").exists());
}

#[test]
fn test_every_standard_tiling_gets_classes() {
    init_logging();
    let tmp = TempDir::new().unwrap();

    // A dense 2 m grid covers every cell of every default tiling.
    let bounds = region();
    let mut points = Vec::new();
    let mut e = bounds.min_x();
    while e <= bounds.max_x() {
        let mut n = bounds.min_y();
        while n <= bounds.max_y() {
            points.push((e, n));
            n += 2.0;
        }
        e += 2.0;
    }
    let manifest = write_manifest(tmp.path(), &points);

    let config = Config::default()
        .with_bounds(bounds)
        .with_min_images_per_class(1)
        .with_workers(4);
    let pipeline = Pipeline::new(config, tmp.path().join("work")).unwrap();
    let stats = pipeline
        .run(&manifest, &tmp.path().join("cache.bin"))
        .unwrap();

    assert_eq!(stats.centers_per_config.len(), 16);
    assert!(stats.silent_configs().is_empty());

    let cache = geocells::CacheFile::new(tmp.path().join("cache.bin"))
        .load()
        .unwrap();
    assert_eq!(cache.config_count(), 16);
    for (config_id, classes) in cache.classes_per_config.iter().enumerate() {
        assert!(!classes.is_empty());
        assert!(classes.iter().all(|c| c.config_id as usize == config_id));
    }
    cache.verify().unwrap();
}
