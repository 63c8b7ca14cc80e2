//! Monitor configuration types
//!
//! Timing, retry and addressing parameters for the acquisition engine. Every
//! field has a serde default so a partial TOML table is enough to override a
//! single setting.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the acquisition engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between PID requests in milliseconds (default: 2000ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Timeout for each polling receive in milliseconds (default: 50ms)
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,

    /// Sleep between worker iterations in milliseconds (default: 100ms)
    #[serde(default = "default_loop_sleep")]
    pub loop_sleep_ms: u64,

    /// Transport frames drained per worker iteration (default: 1)
    #[serde(default = "default_frames_per_cycle")]
    pub frames_per_cycle: usize,

    /// Bus silence after which the vehicle is presumed asleep (default: 300s)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Timeout waiting for the SOH response in milliseconds (default: 2000ms)
    #[serde(default = "default_soh_timeout")]
    pub soh_timeout_ms: u64,

    /// Connection attempts per start (default: 5)
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Constant delay between connection attempts in milliseconds (default: 5000ms)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Capacity of the externally injected frame queue (default: 32)
    #[serde(default = "default_queue_capacity")]
    pub inbound_queue_capacity: usize,

    /// Multi-frame reassembly timeout in milliseconds (default: 1000ms)
    #[serde(default = "default_isotp_timeout")]
    pub isotp_timeout_ms: u64,

    /// Send PID requests with 29-bit functional addressing
    #[serde(default = "default_true")]
    pub extended_addressing: bool,

    /// Broker publish path settings
    #[serde(default)]
    pub publish: PublishConfig,
}

/// Settings for the broker publish path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Whether telemetry changes are published
    #[serde(default)]
    pub enabled: bool,

    /// Topic prefix, e.g. `polestar` gives `polestar/soc`
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_receive_timeout() -> u64 {
    50
}

fn default_loop_sleep() -> u64 {
    100
}

fn default_frames_per_cycle() -> usize {
    1
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_soh_timeout() -> u64 {
    2000
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    32
}

fn default_isotp_timeout() -> u64 {
    1000
}

fn default_topic_prefix() -> String {
    "polestar".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            receive_timeout_ms: default_receive_timeout(),
            loop_sleep_ms: default_loop_sleep(),
            frames_per_cycle: default_frames_per_cycle(),
            idle_timeout_secs: default_idle_timeout(),
            soh_timeout_ms: default_soh_timeout(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay(),
            inbound_queue_capacity: default_queue_capacity(),
            isotp_timeout_ms: default_isotp_timeout(),
            extended_addressing: default_true(),
            publish: PublishConfig::default(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            topic_prefix: default_topic_prefix(),
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the PID request interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Builder method: set the polling receive timeout
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method: set the sleep between worker iterations
    pub fn with_loop_sleep(mut self, sleep: Duration) -> Self {
        self.loop_sleep_ms = sleep.as_millis() as u64;
        self
    }

    /// Builder method: set how many transport frames each iteration drains
    pub fn with_frames_per_cycle(mut self, frames: usize) -> Self {
        self.frames_per_cycle = frames;
        self
    }

    /// Builder method: set the silence threshold for the asleep diagnostic
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_secs = timeout.as_secs();
        self
    }

    /// Builder method: set the SOH response timeout
    pub fn with_soh_timeout(mut self, timeout: Duration) -> Self {
        self.soh_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method: set connection attempts and the delay between them
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Builder method: set the injected frame queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.inbound_queue_capacity = capacity;
        self
    }

    /// Builder method: choose 29-bit or 11-bit request addressing
    pub fn with_extended_addressing(mut self, enabled: bool) -> Self {
        self.extended_addressing = enabled;
        self
    }

    /// Builder method: enable the broker publish path under a topic prefix
    pub fn with_publishing(mut self, topic_prefix: impl Into<String>) -> Self {
        self.publish = PublishConfig {
            enabled: true,
            topic_prefix: topic_prefix.into(),
        };
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn loop_sleep(&self) -> Duration {
        Duration::from_millis(self.loop_sleep_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn soh_timeout(&self) -> Duration {
        Duration::from_millis(self.soh_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn isotp_timeout(&self) -> Duration {
        Duration::from_millis(self.isotp_timeout_ms)
    }
}
