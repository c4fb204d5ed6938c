use crate::management::instance::config::InstanceConfig;
use crate::management::instance::sample::ResourceSample;
use crate::management::instance::status::InstanceStatus;
use serde::{Deserialize, Serialize};

/// Point-in-time aggregate view of one instance. Constructed fresh per query;
/// liveness can change at any time, so snapshots are never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub config: InstanceConfig,
    pub running: bool,
    pub sample: Option<ResourceSample>,
    pub world_size_mb: Option<u64>,
    /// Another registered instance holds the same port, which means a prior
    /// allocation race was hit. Surfaced as a warning, never hidden.
    pub port_conflict: bool,
    pub taken_at: u64,
}

impl StatusSnapshot {
    /// State as derivable from session existence. Transitional states are
    /// only observable by whoever drives the transition, so a snapshot sees
    /// either `Running` or `Stopped`.
    pub fn status(&self) -> InstanceStatus {
        if self.running {
            InstanceStatus::Running
        } else {
            InstanceStatus::Stopped
        }
    }
}
