use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use msm_protocol::management::instance::StatusSnapshot;
use msm_protocol::status::SysInfo;
use tokio::sync::Notify;

use crate::status::{host_info, StatusAggregator};

/// Re-renders a full aggregated snapshot on a fixed interval until cancelled.
/// Cancellation lands at tick boundaries, never mid-sample, and is a clean
/// exit rather than an error. A failed pass is logged and skipped; the loop
/// itself never dies on one.
pub struct LiveMonitor {
    aggregator: StatusAggregator,
    interval: Duration,
}

impl LiveMonitor {
    pub fn new(aggregator: StatusAggregator, interval: Duration) -> Self {
        Self {
            aggregator,
            interval,
        }
    }

    pub async fn run(&self, cancel: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.render_tick().await {
                        warn!("monitor pass failed: {}, continuing", e);
                    }
                }
                _ = cancel.notified() => break,
                _ = &mut ctrl_c => break,
            }
        }
        info!("monitor stopped");
    }

    async fn render_tick(&self) -> anyhow::Result<()> {
        let host = host_info().await;
        let snapshots = self.aggregator.snapshot_all().await?;

        println!("{}", format_host(&host));
        if snapshots.is_empty() {
            println!("no servers registered");
        }
        for snapshot in &snapshots {
            println!("{}", format_snapshot(snapshot));
        }
        println!();
        Ok(())
    }
}

pub fn format_host(host: &SysInfo) -> String {
    let per_core = host
        .cpu
        .per_core
        .iter()
        .map(|usage| format!("{:.0}%", usage))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "host {}/{} | cpu {:.1}% ({} cores: {}) | mem {}MB/{}MB ({:.1}%) | disk {:.1}GB free of {:.1}GB | net rx {:.1}MB tx {:.1}MB",
        host.os.name,
        host.os.arch,
        host.cpu.usage,
        host.cpu.count,
        per_core,
        host.mem.used_mb,
        host.mem.total_mb,
        host.mem.usage_percent,
        host.drive.free as f64 / 1024.0 / 1024.0 / 1024.0,
        host.drive.total as f64 / 1024.0 / 1024.0 / 1024.0,
        host.net.received as f64 / 1024.0 / 1024.0,
        host.net.transmitted as f64 / 1024.0 / 1024.0,
    )
}

pub fn format_snapshot(snapshot: &StatusSnapshot) -> String {
    let state = if snapshot.status().is_live() {
        "running"
    } else {
        "stopped"
    };
    let mut line = format!(
        "{:<16} {:<8} port {}",
        snapshot.config.name, state, snapshot.config.port
    );
    if let Some(sample) = &snapshot.sample {
        line.push_str(&format!(
            " | pid {} cpu {:.1}% ram {}MB",
            sample.pid, sample.cpu_percent, sample.memory_mb
        ));
        if let Some(port) = sample.listening_port {
            line.push_str(&format!(" listening {}", port));
        }
    }
    if let Some(world_mb) = snapshot.world_size_mb {
        line.push_str(&format!(" | world {}MB", world_mb));
    }
    if snapshot.port_conflict {
        line.push_str(" | WARNING: port shared with another instance");
    }
    line
}
