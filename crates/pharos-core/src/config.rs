//! Registry configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::event_bus::OverflowPolicy;

/// Configuration for an [`AgentRegistry`](crate::AgentRegistry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Seconds without a heartbeat before an active agent is marked unhealthy
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// Seconds without a heartbeat before an agent is auto-deregistered
    ///
    /// Measured from the last heartbeat, not from the unhealthy transition.
    /// Should be at least twice `heartbeat_timeout_secs`.
    #[serde(default = "default_auto_deregister_timeout_secs")]
    pub auto_deregister_timeout_secs: u64,
    /// Health monitor tick interval in seconds
    ///
    /// `None` derives a fixed interval of half the heartbeat timeout.
    #[serde(default)]
    pub monitor_interval_secs: Option<u64>,
    /// Whether the background health monitor runs at all
    #[serde(default = "default_true")]
    pub enable_heartbeat_monitoring: bool,
    /// Whether registry events are broadcast to subscribers
    #[serde(default = "default_true")]
    pub enable_event_broadcasting: bool,
    /// Maximum number of events buffered for the dispatcher
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,
    /// What to do with events when the queue is full
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

fn default_heartbeat_timeout_secs() -> u64 {
    30
}

fn default_auto_deregister_timeout_secs() -> u64 {
    60
}

fn default_event_queue_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            auto_deregister_timeout_secs: default_auto_deregister_timeout_secs(),
            monitor_interval_secs: None,
            enable_heartbeat_monitoring: true,
            enable_event_broadcasting: true,
            event_queue_size: default_event_queue_size(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heartbeat timeout.
    pub fn with_heartbeat_timeout(mut self, secs: u64) -> Self {
        self.heartbeat_timeout_secs = secs;
        self
    }

    /// Set the auto-deregistration timeout.
    pub fn with_auto_deregister_timeout(mut self, secs: u64) -> Self {
        self.auto_deregister_timeout_secs = secs;
        self
    }

    /// Set an explicit monitor tick interval.
    pub fn with_monitor_interval(mut self, secs: u64) -> Self {
        self.monitor_interval_secs = Some(secs);
        self
    }

    /// Enable or disable the background health monitor.
    pub fn with_heartbeat_monitoring(mut self, enabled: bool) -> Self {
        self.enable_heartbeat_monitoring = enabled;
        self
    }

    /// Enable or disable event broadcasting.
    pub fn with_event_broadcasting(mut self, enabled: bool) -> Self {
        self.enable_event_broadcasting = enabled;
        self
    }

    /// Set the event queue capacity.
    pub fn with_event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }

    /// Set the overflow policy for a full event queue.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Heartbeat timeout as a [`Duration`].
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Auto-deregistration timeout as a [`Duration`].
    pub fn auto_deregister_timeout(&self) -> Duration {
        Duration::from_secs(self.auto_deregister_timeout_secs)
    }

    /// Monitor tick interval, explicit or derived as half the heartbeat timeout.
    pub fn monitor_interval(&self) -> Duration {
        match self.monitor_interval_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_millis(self.heartbeat_timeout_secs.saturating_mul(500)),
        }
    }

    /// Validate the configuration.
    ///
    /// Hard errors: zero timeouts, a deregistration timeout shorter than the
    /// heartbeat timeout, a zero-capacity event queue, a zero tick interval.
    /// A deregistration timeout below twice the heartbeat timeout only logs
    /// a warning: a healthy-looking agent may then be evicted after a single
    /// missed heartbeat window.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_timeout_secs == 0 {
            return Err(Error::InvalidConfig {
                field: "heartbeat_timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.auto_deregister_timeout_secs < self.heartbeat_timeout_secs {
            return Err(Error::InvalidConfig {
                field: "auto_deregister_timeout_secs".to_string(),
                message: "must be at least heartbeat_timeout_secs".to_string(),
            });
        }
        if self.event_queue_size == 0 {
            return Err(Error::InvalidConfig {
                field: "event_queue_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.monitor_interval_secs == Some(0) {
            return Err(Error::InvalidConfig {
                field: "monitor_interval_secs".to_string(),
                message: "must be positive when set".to_string(),
            });
        }
        if self.auto_deregister_timeout_secs < self.heartbeat_timeout_secs * 2 {
            warn!(
                heartbeat_timeout_secs = self.heartbeat_timeout_secs,
                auto_deregister_timeout_secs = self.auto_deregister_timeout_secs,
                "auto_deregister_timeout below 2x heartbeat_timeout; agents may be \
                 evicted after a single missed heartbeat window"
            );
        }
        Ok(())
    }
}
