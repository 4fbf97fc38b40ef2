//! Pipeline sizing configuration.

use std::collections::BTreeMap;

/// Default number of workers per stage.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Inter-stage channels are rendezvous hand-offs unless configured otherwise.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 0;

/// Worker and channel sizing shared by every stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Workers per stage when the stage has no override.
    pub worker_count: usize,
    /// Capacity of the channels between stages (0 = unbuffered).
    pub channel_capacity: usize,
    /// Per-stage worker overrides keyed by stage name.
    pub stage_workers: BTreeMap<String, usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            stage_workers: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Number of workers to start for `stage`; never less than one.
    pub fn workers_for(&self, stage: &str) -> usize {
        self.stage_workers
            .get(stage)
            .copied()
            .unwrap_or(self.worker_count)
            .max(1)
    }

    /// Create a channel sized for an inter-stage hand-off.
    pub fn channel<T>(&self) -> (flume::Sender<T>, flume::Receiver<T>) {
        flume::bounded(self.channel_capacity)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    pub fn stage_workers(mut self, stage: impl Into<String>, count: usize) -> Self {
        self.config.stage_workers.insert(stage.into(), count);
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.channel_capacity, 0);
        assert!(config.stage_workers.is_empty());
    }

    #[test]
    fn stage_override_wins_over_shared_count() {
        let config = PipelineConfig::builder()
            .worker_count(3)
            .stage_workers("persist", 8)
            .stage_workers("decode", 0)
            .build();

        assert_eq!(config.workers_for("persist"), 8);
        assert_eq!(config.workers_for("transform"), 3);
        // zero is clamped so a stage can always make progress
        assert_eq!(config.workers_for("decode"), 1);
    }
}
