use crate::domain::job::LogicalTime;
use crate::error::{OrderError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Construction-time settings for the processing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of jobs held by the queue.
    pub queue_capacity: usize,
    pub worker_count: usize,
    /// Retries after the first attempt before a job is dead-lettered.
    pub max_retries: u32,
    /// Delay before the first retry, in logical time units.
    pub base_backoff: LogicalTime,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            worker_count: 4,
            max_retries: 3,
            base_backoff: 1,
        }
    }
}

impl ProcessingConfig {
    /// Loads a JSON config file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ProcessingConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(OrderError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(OrderError::Config(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.base_backoff == 0 {
            return Err(OrderError::Config(
                "base_backoff must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
