//! Orchestrator settings.

/// Settings for [`UsageMonitor`](crate::UsageMonitor).
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    /// Log full usernames instead of masked ones.
    pub dev: bool,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }
}
