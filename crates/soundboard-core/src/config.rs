//! Coordinator tuning knobs.

use std::time::Duration;

use crate::sink::IdleWait;
use crate::volume::VolumeSettings;

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// How long to wait for the sink to confirm a stop, and how to poll for it.
    pub idle_wait: IdleWait,
    /// Gains in effect at startup.
    pub volume: VolumeSettings,
}

impl CoordinatorConfig {
    pub fn with_stop_wait(mut self, timeout: Duration) -> Self {
        self.idle_wait.timeout = timeout;
        self
    }
}
