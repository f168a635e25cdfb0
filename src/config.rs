//! Engine configuration (ambient concern added in the expansion -
//! grounded on the teacher's per-subsystem config structs, e.g.
//! `buffer::manager::BufferPoolConfig`, each a plain struct with a
//! `Default` impl rather than a builder or global).

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one `Engine` instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of partitions every installed flow is split into.
    pub partition_count: usize,
    /// Directory schemas are persisted to/loaded from (spec.md §6). `None`
    /// disables persistence entirely.
    pub state_directory: Option<PathBuf>,
    /// How long `shutdown` sleeps after the last `process_records` call
    /// before sending `Stop`, to let already-enqueued batches drain
    /// (spec.md §5).
    pub shutdown_drain_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            partition_count: num_cpus::get().max(1),
            state_directory: None,
            shutdown_drain_delay: Duration::from_millis(50),
        }
    }
}

impl EngineConfig {
    pub fn with_partition_count(mut self, partition_count: usize) -> Self {
        assert!(partition_count > 0, "partition count must be positive");
        self.partition_count = partition_count;
        self
    }

    pub fn with_state_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_directory = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_partition_count_is_at_least_one() {
        assert!(EngineConfig::default().partition_count >= 1);
    }
}
