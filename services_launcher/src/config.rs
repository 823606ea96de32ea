//! Launcher configuration

use crate::launcher::LauncherError;
use std::time::Duration;

/// Default time a started service has to report ready
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(30);
/// Default time a start action may take before it is abandoned
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);
/// Default pause between readiness probes
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Launcher configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LauncherConfig {
    /// How long a started service may take to report ready
    pub readiness_timeout: Duration,
    /// How long a start action may run
    pub start_timeout: Duration,
    /// Pause between readiness probes of one service
    pub probe_interval: Duration,
}

impl LauncherConfig {
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Rejects zero durations
    pub fn validate(&self) -> Result<(), LauncherError> {
        let fields = [
            ("readiness_timeout", self.readiness_timeout),
            ("start_timeout", self.start_timeout),
            ("probe_interval", self.probe_interval),
        ];
        for (field, value) in fields {
            if value.is_zero() {
                return Err(LauncherError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    field
                )));
            }
        }
        Ok(())
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            start_timeout: DEFAULT_START_TIMEOUT,
            probe_interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}
