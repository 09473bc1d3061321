use crate::config::ProcessingConfig;
use crate::domain::job::LogicalTime;

/// Exponential backoff policy.
///
/// Stateless: the attempt number lives on the job. Retry `n` (starting at 1)
/// waits `base * 2^(n-1)` logical time units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryScheduler {
    base: LogicalTime,
    max_retries: u32,
}

impl RetryScheduler {
    pub fn new(base: LogicalTime, max_retries: u32) -> Self {
        Self { base, max_retries }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(config.base_backoff, config.max_retries)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn next_delay(&self, attempt: u32) -> LogicalTime {
        if attempt == 0 {
            return 0;
        }
        2u64.checked_pow(attempt - 1)
            .and_then(|factor| self.base.checked_mul(factor))
            .unwrap_or(LogicalTime::MAX)
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_retries
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }
}
