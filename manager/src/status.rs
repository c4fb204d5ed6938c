use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::warn;
use msm_protocol::management::instance::{InstanceConfig, StatusSnapshot};
use msm_protocol::status::{CpuInfo, DriveInfo, MemInfo, NetInfo, OsInfo, SysInfo};
use msm_protocol::Result;
use sysinfo::{CpuRefreshKind, Disks, Networks, RefreshKind, System};

use crate::registry::InstanceRegistry;
use crate::sampler::ResourceSampler;
use crate::session::{session_label, SessionMultiplexer};

/// Composes registry records, session liveness, per-process samples and
/// host-wide counters into read-only snapshots. Nothing is cached: liveness
/// can change at any time.
pub struct StatusAggregator {
    registry: Arc<InstanceRegistry>,
    mux: Arc<dyn SessionMultiplexer>,
    sampler: ResourceSampler,
}

impl StatusAggregator {
    pub fn new(registry: Arc<InstanceRegistry>, mux: Arc<dyn SessionMultiplexer>) -> Self {
        let sampler = ResourceSampler::new(mux.clone());
        Self {
            registry,
            mux,
            sampler,
        }
    }

    pub async fn snapshot(&self, name: &str) -> Result<StatusSnapshot> {
        let config = self.registry.load(name)?;
        let conflicts = self.registry.conflicting_ports().unwrap_or_default();
        Ok(self.compose(config, &conflicts).await)
    }

    pub async fn snapshot_all(&self) -> Result<Vec<StatusSnapshot>> {
        let mut configs = vec![];
        for name in self.registry.names()? {
            match self.registry.load(&name) {
                Ok(config) => configs.push(config),
                Err(e) => warn!("skipping '{}': {}", name, e),
            }
        }
        let conflicts = self.registry.conflicting_ports().unwrap_or_default();
        let snapshots = configs
            .into_iter()
            .map(|config| self.compose(config, &conflicts));
        Ok(futures::future::join_all(snapshots).await)
    }

    async fn compose(&self, config: InstanceConfig, conflicts: &BTreeSet<u16>) -> StatusSnapshot {
        // liveness comes from session existence alone; a denied sampler must
        // not turn a running instance into a stopped one
        let running = match self.mux.find(&session_label(&config.name)).await {
            Ok(session) => session.is_some(),
            Err(e) => {
                warn!("session probe for '{}' failed: {}", config.name, e);
                false
            }
        };

        let sample = if running {
            self.sampler.sample(&config).await.unwrap_or_else(|e| {
                warn!("sampling '{}' failed: {}", config.name, e);
                None
            })
        } else {
            None
        };

        StatusSnapshot {
            running,
            sample,
            world_size_mb: world_size_mb(&config.working_directory),
            port_conflict: conflicts.contains(&config.port),
            taken_at: Utc::now().timestamp() as u64,
            config,
        }
    }
}

/// Size of the instance's world directory, `None` when it does not exist.
fn world_size_mb(working_directory: &Path) -> Option<u64> {
    let world = working_directory.join("world");
    if !world.is_dir() {
        return None;
    }
    Some(directory_size(&world) / 1024 / 1024)
}

fn directory_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                directory_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

/// Host-wide counters. Every source degrades independently to its documented
/// fallback sentinel when the platform denies access to the accounting
/// facility; the snapshot as a whole never aborts.
pub async fn host_info() -> SysInfo {
    SysInfo {
        os: os_info(),
        cpu: cpu_info().await,
        mem: mem_info(),
        drive: drive_info(),
        net: net_info(),
    }
}

fn os_info() -> OsInfo {
    OsInfo {
        name: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    }
}

async fn cpu_info() -> CpuInfo {
    let mut system = System::new_with_specifics(
        RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()),
    );
    system.refresh_cpu_specifics(CpuRefreshKind::everything());
    tokio::time::sleep(Duration::from_millis(300)).await;
    system.refresh_cpu_usage();

    let cpus = system.cpus();
    if cpus.is_empty() {
        return CpuInfo::fallback();
    }
    CpuInfo {
        vendor: cpus[0].vendor_id().to_string(),
        name: cpus[0].brand().to_string(),
        count: cpus.len() as u32,
        usage: system.global_cpu_usage(),
        per_core: cpus.iter().map(|cpu| cpu.cpu_usage()).collect(),
    }
}

fn mem_info() -> MemInfo {
    let mut system = System::new();
    system.refresh_memory();

    let total = system.total_memory();
    if total == 0 {
        return MemInfo::fallback();
    }
    let available = system.available_memory();
    let used = total.saturating_sub(available);
    MemInfo {
        total_mb: total / 1024 / 1024,
        used_mb: used / 1024 / 1024,
        free_mb: available / 1024 / 1024,
        usage_percent: used as f32 / total as f32 * 100.0,
    }
}

fn drive_info() -> DriveInfo {
    let data_dir = crate::config::data_dir();
    let disks = Disks::new_with_refreshed_list();

    // the disk whose mount point is the deepest ancestor of the data dir
    let drive = disks
        .list()
        .iter()
        .filter(|disk| data_dir.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len());

    match drive {
        Some(disk) => DriveInfo {
            drive_format: disk.file_system().to_string_lossy().to_string(),
            total: disk.total_space(),
            free: disk.available_space(),
        },
        None => DriveInfo::fallback(),
    }
}

fn net_info() -> NetInfo {
    let networks = Networks::new_with_refreshed_list();
    let mut seen_any = false;
    let (mut received, mut transmitted) = (0u64, 0u64);
    for (_name, data) in &networks {
        seen_any = true;
        received += data.total_received();
        transmitted += data.total_transmitted();
    }
    if !seen_any {
        return NetInfo::fallback();
    }
    NetInfo {
        received,
        transmitted,
    }
}
