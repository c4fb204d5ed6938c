use serde::{Deserialize, Serialize};

/// Derived at call time from session existence, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl InstanceStatus {
    pub fn is_live(&self) -> bool {
        !matches!(self, InstanceStatus::Stopped)
    }
}
