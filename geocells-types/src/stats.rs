use serde::{Deserialize, Serialize};

/// Counters collected while a pipeline run moves through its stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Cell centers generated, indexed by configuration id
    pub centers_per_config: Vec<usize>,
    /// Image records read from the manifest
    pub images: usize,
    /// Number of non-empty region buckets holding images
    pub image_buckets: usize,
    /// Assignments produced, indexed by configuration id
    pub assignments_per_config: Vec<usize>,
    /// Lines written by the label merger (one per image key and heading variant)
    pub merged_lines: usize,
    /// Distinct classes observed before threshold filtering
    pub classes_seen: usize,
    /// Classes meeting the population threshold
    pub classes_retained: usize,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total assignments across all configurations.
    pub fn total_assignments(&self) -> usize {
        self.assignments_per_config.iter().sum()
    }

    /// Configuration ids that produced no assignment at all.
    pub fn silent_configs(&self) -> Vec<u16> {
        self.assignments_per_config
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id as u16)
            .collect()
    }

    pub fn record_assignments(&mut self, per_config: &[usize]) {
        if self.assignments_per_config.len() < per_config.len() {
            self.assignments_per_config.resize(per_config.len(), 0);
        }
        for (total, count) in self.assignments_per_config.iter_mut().zip(per_config) {
            *total += count;
        }
    }
}
