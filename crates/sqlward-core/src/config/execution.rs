//! Execution throttling configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How approved statements are forwarded to the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Timeout for establishing a target connection, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Read/write timeout for each forwarded statement, in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Wait while the target's `Threads_running` exceeds this (0 disables).
    #[serde(default)]
    pub max_threads_running: u64,

    /// Wait while any replica lags more than this many seconds (0 disables).
    #[serde(default)]
    pub max_replication_delay: u64,

    /// Refuse to execute against a target reporting `read_only=ON`.
    #[serde(default = "default_true")]
    pub check_read_only: bool,

    /// Interval between throttle polls, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            query_timeout_secs: default_query_timeout(),
            max_threads_running: 0,
            max_replication_delay: 0,
            check_read_only: true,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl ExecutionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    1000
}
