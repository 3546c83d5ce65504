//! Global aggregation of merged label files into the class cache.

use crate::config::ClassId;
use crate::error::{GeocellsError, Result};
use crate::storage::{ClassCache, MergedLine};
use crate::storage::records::for_each_merged;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;

/// Accumulates `class -> image keys` over every label line, then filters by
/// population.
#[derive(Debug)]
pub struct ClassCacheBuilder {
    min_images_per_class: usize,
    config_count: usize,
    images_per_class: FxHashMap<ClassId, Vec<String>>,
    first_seen: Vec<ClassId>,
    lines: usize,
}

impl ClassCacheBuilder {
    pub fn new(min_images_per_class: usize, config_count: usize) -> Self {
        Self {
            min_images_per_class,
            config_count,
            images_per_class: FxHashMap::default(),
            first_seen: Vec::new(),
            lines: 0,
        }
    }

    /// Record one label line. Repeated keys are kept; population counts
    /// entries, not distinct keys.
    pub fn add_line(&mut self, line: MergedLine) -> Result<()> {
        let MergedLine {
            image_key,
            classes,
        } = line;

        for class_id in classes {
            if class_id.config_id as usize >= self.config_count {
                return Err(GeocellsError::InvalidInput(format!(
                    "class {} refers to configuration {}, only {} are configured",
                    class_id, class_id.config_id, self.config_count
                )));
            }
            self.images_per_class
                .entry(class_id)
                .or_insert_with(|| {
                    self.first_seen.push(class_id);
                    Vec::new()
                })
                .push(image_key.clone());
        }
        self.lines += 1;
        Ok(())
    }

    /// Stream one label file into the builder.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        for_each_merged(path, |line| self.add_line(line)).map_err(|e| match e {
            GeocellsError::InvalidInput(reason) => {
                GeocellsError::InvalidInput(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    pub fn lines_read(&self) -> usize {
        self.lines
    }

    pub fn classes_seen(&self) -> usize {
        self.first_seen.len()
    }

    /// Drop classes below the threshold and index the rest per configuration.
    ///
    /// Fails with [`GeocellsError::EmptyConfiguration`] when a configuration
    /// is left without any class.
    pub fn finish(mut self) -> Result<ClassCache> {
        let mut classes_per_config = vec![Vec::new(); self.config_count];
        let mut images_per_class = BTreeMap::new();

        for class_id in &self.first_seen {
            let Some(images) = self.images_per_class.remove(class_id) else {
                continue;
            };
            if images.len() < self.min_images_per_class {
                continue;
            }
            classes_per_config[class_id.config_id as usize].push(*class_id);
            images_per_class.insert(*class_id, images);
        }

        log::info!(
            "Retained {} of {} classes with at least {} images",
            images_per_class.len(),
            self.first_seen.len(),
            self.min_images_per_class
        );

        if let Some(empty) = classes_per_config.iter().position(Vec::is_empty) {
            return Err(GeocellsError::EmptyConfiguration(empty as u16));
        }

        Ok(ClassCache {
            min_images_per_class: self.min_images_per_class,
            classes_per_config,
            images_per_class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::records::write_merged;
    use tempfile::TempDir;

    fn line(key: &str, classes: &[(u16, u32)]) -> MergedLine {
        MergedLine::new(
            key,
            classes.iter().map(|&(c, i)| ClassId::new(c, i)).collect(),
        )
    }

    #[test]
    fn test_threshold_filters_small_classes() {
        let mut builder = ClassCacheBuilder::new(2, 1);
        builder.add_line(line("a", &[(0, 3)])).unwrap();
        builder.add_line(line("b", &[(0, 3)])).unwrap();
        builder.add_line(line("c", &[(0, 7)])).unwrap();
        assert_eq!(builder.classes_seen(), 2);

        let cache = builder.finish().unwrap();
        assert_eq!(cache.classes_per_config, vec![vec![ClassId::new(0, 3)]]);
        assert_eq!(cache.images_of(&ClassId::new(0, 3)).unwrap(), ["a", "b"]);
        assert!(cache.images_of(&ClassId::new(0, 7)).is_none());
        cache.verify().unwrap();
    }

    #[test]
    fn test_duplicates_count_towards_population() {
        let mut builder = ClassCacheBuilder::new(2, 1);
        builder.add_line(line("a", &[(0, 1)])).unwrap();
        builder.add_line(line("a", &[(0, 1)])).unwrap();
        let cache = builder.finish().unwrap();
        assert_eq!(cache.images_of(&ClassId::new(0, 1)).unwrap(), ["a", "a"]);
    }

    #[test]
    fn test_classes_keep_first_seen_order() {
        let mut builder = ClassCacheBuilder::new(1, 2);
        builder.add_line(line("a", &[(0, 9), (1, 4)])).unwrap();
        builder.add_line(line("b", &[(0, 2), (1, 4)])).unwrap();
        let cache = builder.finish().unwrap();
        assert_eq!(
            cache.classes_per_config,
            vec![
                vec![ClassId::new(0, 9), ClassId::new(0, 2)],
                vec![ClassId::new(1, 4)]
            ]
        );
        assert_eq!(cache.images_of(&ClassId::new(1, 4)).unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_empty_configuration_is_an_error() {
        let mut builder = ClassCacheBuilder::new(2, 2);
        builder.add_line(line("a", &[(0, 0), (1, 0)])).unwrap();
        builder.add_line(line("b", &[(0, 0)])).unwrap();
        assert!(matches!(
            builder.finish(),
            Err(GeocellsError::EmptyConfiguration(1))
        ));
    }

    #[test]
    fn test_unknown_configuration_is_rejected() {
        let mut builder = ClassCacheBuilder::new(1, 2);
        assert!(builder.add_line(line("a", &[(2, 0)])).is_err());
    }

    #[test]
    fn test_add_file_streams_lines() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("labels_0.txt");
        let second = tmp.path().join("labels_1.txt");
        write_merged(&first, &[line("a", &[(0, 1)]), line("b", &[(0, 1)])]).unwrap();
        write_merged(&second, &[line("c", &[(0, 1)])]).unwrap();

        let mut builder = ClassCacheBuilder::new(3, 1);
        builder.add_file(&first).unwrap();
        builder.add_file(&second).unwrap();
        assert_eq!(builder.lines_read(), 3);

        let cache = builder.finish().unwrap();
        assert_eq!(cache.images_of(&ClassId::new(0, 1)).unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_rebuilding_is_idempotent() {
        let lines = vec![line("a", &[(0, 1)]), line("b", &[(0, 1), (0, 2)])];
        let build = || {
            let mut builder = ClassCacheBuilder::new(1, 1);
            for l in lines.clone() {
                builder.add_line(l).unwrap();
            }
            builder.finish().unwrap()
        };
        assert_eq!(build(), build());
    }
}
