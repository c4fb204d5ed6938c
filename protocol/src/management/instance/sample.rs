use serde::{Deserialize, Serialize};

/// One sampling pass over the instance's process. Valid only for the instant
/// it was taken; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSample {
    pub pid: u32,
    pub cpu_percent: f32,
    pub memory_mb: u64,
    /// Best-effort; `None` when socket enumeration is denied.
    pub listening_port: Option<u16>,
}
