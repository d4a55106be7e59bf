use std::time::Duration;

use crate::dedup::DEFAULT_DEDUP_BATCH_SIZE;

/// Tuning knobs for the search service.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// How often a running source's progress estimate is advanced.
    pub progress_interval: Duration,
    /// Points added per progress tick.
    pub progress_step: u8,
    /// Progress never exceeds this until the source settles.
    pub progress_ceiling: u8,
    /// How long `close()` waits for background fetches before giving up on them.
    pub close_grace: Duration,
    pub dedup_batch_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_secs(2),
            progress_step: 10,
            progress_ceiling: 90,
            close_grace: Duration::from_secs(5),
            dedup_batch_size: DEFAULT_DEDUP_BATCH_SIZE,
        }
    }
}

impl SearchConfig {
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_progress_step(mut self, step: u8) -> Self {
        self.progress_step = step;
        self
    }

    /// Clamped to 90 so a running source never looks finished.
    pub fn with_progress_ceiling(mut self, ceiling: u8) -> Self {
        self.progress_ceiling = ceiling.min(90);
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn with_dedup_batch_size(mut self, size: usize) -> Self {
        self.dedup_batch_size = size.max(1);
        self
    }
}
