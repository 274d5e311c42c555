use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the application peer synchronization subsystem.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct SyncerConfig {
    /// Cadence of the own-status broadcast.
    #[serde(default = "default_publish_interval")]
    pub publish_interval: Duration,

    /// Per-peer budget for a `GetStatus` round trip.
    #[serde(default = "default_status_timeout")]
    pub status_timeout: Duration,

    /// Budget for serving one `GetData` stream.
    #[serde(default = "default_block_timeout")]
    pub block_timeout: Duration,

    /// How long `close` may wait for background tasks to drain.
    #[serde(default = "default_shutdown_deadline")]
    pub shutdown_deadline: Duration,

    /// Probe unknown peers with a direct `GetStatus` on connect.
    #[serde(default)]
    pub eager_probe: bool,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            publish_interval: default_publish_interval(),
            status_timeout: default_status_timeout(),
            block_timeout: default_block_timeout(),
            shutdown_deadline: default_shutdown_deadline(),
            eager_probe: false,
        }
    }
}

const fn default_publish_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

const fn default_status_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_block_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_shutdown_deadline() -> Duration {
    Duration::from_secs(5)
}
