//! Queue configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CourierError, CourierResult};
use crate::queue::DelayPolicy;

/// Construction-time inputs of a send queue.
///
/// JSON uses whole seconds for durations; every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub initial_send_delay_secs: u64,
    pub send_delay_secs: u64,
    /// EventStore capacity.
    pub max_url_count: usize,
    pub max_failed_sends: u32,
    /// Head is force-dropped once failures exceed this.
    pub give_up_after: u32,
    pub delivery_timeout_secs: u64,
    /// `None` keeps the queue in memory only.
    pub backup_path: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_send_delay_secs: 5,
            send_delay_secs: 180,
            max_url_count: 1000,
            max_failed_sends: 5,
            give_up_after: 10,
            delivery_timeout_secs: 60,
            backup_path: None,
        }
    }
}

impl QueueConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> CourierResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CourierError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: QueueConfig = serde_json::from_str(&raw)?;
        config.validated()
    }

    /// Clamp and check. `initial_send_delay` never exceeds `send_delay`.
    pub fn validated(mut self) -> CourierResult<Self> {
        if self.max_url_count == 0 {
            return Err(CourierError::InvalidConfig(
                "max_url_count must be at least 1".to_string(),
            ));
        }
        if self.send_delay_secs == 0 {
            return Err(CourierError::InvalidConfig(
                "send_delay_secs must be at least 1".to_string(),
            ));
        }
        if self.delivery_timeout_secs == 0 {
            return Err(CourierError::InvalidConfig(
                "delivery_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.initial_send_delay_secs = self.initial_send_delay_secs.min(self.send_delay_secs);
        Ok(self)
    }

    /// `<root>/<tracking_id>/queue.json`: one backup file per tracking account.
    pub fn backup_path_for(root: impl AsRef<Path>, tracking_id: &str) -> PathBuf {
        root.as_ref().join(tracking_id).join("queue.json")
    }

    pub fn with_backup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_path = Some(path.into());
        self
    }

    pub fn delay_policy(&self) -> DelayPolicy {
        DelayPolicy::new(
            Duration::from_secs(self.initial_send_delay_secs),
            Duration::from_secs(self.send_delay_secs),
            self.max_failed_sends,
        )
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}
