//! Label merging: one line per image key and heading variant, listing every
//! class the image was assigned to.

use crate::config::{ClassId, LabelConfig};
use crate::error::{GeocellsError, Result};
use crate::storage::MergedLine;
use crate::storage::records::{for_each_record, parse_assignment, write_merged};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Assignments grouped by image key, in the order keys were first seen.
#[derive(Debug, Default)]
pub struct KeyGroups {
    index: FxHashMap<String, usize>,
    groups: Vec<(String, Vec<ClassId>)>,
}

impl KeyGroups {
    pub fn push(&mut self, class_id: ClassId, image_key: String) {
        match self.index.get(&image_key) {
            Some(&slot) => self.groups[slot].1.push(class_id),
            None => {
                self.index.insert(image_key.clone(), self.groups.len());
                self.groups.push((image_key, vec![class_id]));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ClassId])> {
        self.groups
            .iter()
            .map(|(key, classes)| (key.as_str(), classes.as_slice()))
    }
}

impl FromIterator<(ClassId, String)> for KeyGroups {
    fn from_iter<I: IntoIterator<Item = (ClassId, String)>>(iter: I) -> Self {
        let mut groups = KeyGroups::default();
        for (class_id, key) in iter {
            groups.push(class_id, key);
        }
        groups
    }
}

/// Expands grouped assignments into heading-variant label lines.
#[derive(Debug, Clone)]
pub struct LabelMerger {
    heading_field: usize,
    variants: Vec<String>,
}

impl LabelMerger {
    pub fn new(labels: &LabelConfig) -> Self {
        Self {
            heading_field: labels.heading_field,
            variants: labels.heading_variants.clone(),
        }
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// The image key with its heading field replaced by `variant`.
    ///
    /// ```
    /// use geocells::config::LabelConfig;
    /// use geocells::pipeline::merge::LabelMerger;
    ///
    /// let merger = LabelMerger::new(&LabelConfig::default());
    /// let key = "37.75@1@2@3@4@5@6@7@8@45@x";
    /// assert_eq!(merger.variant_key(key, "180").unwrap(), "37.75@1@2@3@4@5@6@7@8@180@x");
    /// ```
    pub fn variant_key(&self, image_key: &str, variant: &str) -> Result<String> {
        let mut fields: Vec<&str> = image_key.split('@').collect();
        let field_count = fields.len();
        let slot = fields.get_mut(self.heading_field).ok_or_else(|| {
            GeocellsError::InvalidInput(self.short_key_reason(image_key, field_count))
        })?;
        *slot = variant;
        Ok(fields.join("@"))
    }

    /// Label lines for grouped assignments: every key in first-seen order,
    /// each followed by all of its variants.
    pub fn merge(&self, groups: &KeyGroups) -> Result<Vec<MergedLine>> {
        let mut lines = Vec::with_capacity(groups.len() * self.variants.len());
        for (key, classes) in groups.iter() {
            for variant in &self.variants {
                lines.push(MergedLine::new(
                    self.variant_key(key, variant)?,
                    classes.to_vec(),
                ));
            }
        }
        Ok(lines)
    }

    /// Merge one bucket's assignment file into its label file. Returns the
    /// number of lines written.
    pub fn merge_file(&self, input: &Path, output: &Path) -> Result<usize> {
        let mut groups = KeyGroups::default();
        for_each_record(
            input,
            |line| {
                let (class_id, key) = parse_assignment(line)?;
                self.check_key(&key)?;
                Ok((class_id, key))
            },
            |(class_id, key)| {
                groups.push(class_id, key);
                Ok(())
            },
        )?;

        let lines = self.merge(&groups)?;
        write_merged(output, &lines)?;
        log::debug!(
            "Merged {} image keys from {} into {} label lines",
            groups.len(),
            input.display(),
            lines.len()
        );
        Ok(lines.len())
    }

    fn check_key(&self, image_key: &str) -> std::result::Result<(), String> {
        let fields = image_key.split('@').count();
        if fields <= self.heading_field {
            return Err(self.short_key_reason(image_key, fields));
        }
        Ok(())
    }

    fn short_key_reason(&self, image_key: &str, fields: usize) -> String {
        format!(
            "image key has {} '@' fields, heading field {} is missing: {}",
            fields, self.heading_field, image_key
        )
    }
}
