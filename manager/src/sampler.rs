use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use msm_protocol::management::instance::{InstanceConfig, ResourceSample};
use msm_protocol::Result;
use sysinfo::{Pid, Process, ProcessesToUpdate, System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::session::{session_label, SessionMultiplexer};

/// Correlates OS process listings to named sessions and reads CPU/memory/
/// listening-port usage. "No sample" is a normal state, not an error.
pub struct ResourceSampler {
    mux: Arc<dyn SessionMultiplexer>,
}

impl ResourceSampler {
    pub fn new(mux: Arc<dyn SessionMultiplexer>) -> Self {
        Self { mux }
    }

    pub async fn sample(&self, config: &InstanceConfig) -> Result<Option<ResourceSample>> {
        let label = session_label(&config.name);
        let Some(session) = self.mux.find(&label).await? else {
            return Ok(None);
        };
        Ok(self.sample_process(config, session.pid).await)
    }

    async fn sample_process(&self, config: &InstanceConfig, session_pid: u32) -> Option<ResourceSample> {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let pid = match_candidate(&system, config, session_pid)?;

        // CPU usage is a delta between two refreshes; a single scheduler tick
        // would read as a spurious 0% or 100%.
        let window = MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_millis(200));
        tokio::time::sleep(window).await;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system.process(pid)?;
        Some(ResourceSample {
            pid: pid.as_u32(),
            cpu_percent: process.cpu_usage(),
            memory_mb: process.memory() / 1024 / 1024,
            listening_port: listening_port_of(pid.as_u32()),
        })
    }
}

/// Picks the process backing `config` among all running ones. Candidates are
/// narrowed by runtime executable and launch artifact; the session's process
/// tree is the authoritative disambiguator, since several instances may share
/// identical artifact names. A command-line match is only trusted when it is
/// unique; a tie is never guessed at.
fn match_candidate(system: &System, config: &InstanceConfig, session_pid: u32) -> Option<Pid> {
    let runtime = config.kind.runtime_process();
    let artifact = config.launch_artifact.to_string_lossy();

    let candidates: Vec<&Process> = system
        .processes()
        .values()
        .filter(|p| p.name().to_string_lossy().contains(runtime))
        .filter(|p| {
            p.cmd()
                .iter()
                .any(|arg| arg.to_string_lossy().contains(artifact.as_ref()))
        })
        .collect();

    if let Some(process) = candidates
        .iter()
        .find(|p| has_ancestor(system, p.pid(), session_pid))
    {
        return Some(process.pid());
    }

    let by_directory: Vec<&&Process> = candidates
        .iter()
        .filter(|p| p.cwd() == Some(config.working_directory.as_path()))
        .collect();
    match by_directory.len() {
        1 => {
            debug!(
                "'{}': matched by working directory, session ancestry unavailable",
                config.name
            );
            Some(by_directory[0].pid())
        }
        0 => None,
        n => {
            warn!(
                "'{}': {} processes match by command line, refusing to guess",
                config.name, n
            );
            None
        }
    }
}

fn has_ancestor(system: &System, pid: Pid, ancestor: u32) -> bool {
    let ancestor = Pid::from_u32(ancestor);
    let mut current = system.process(pid).and_then(|p| p.parent());
    // bounded walk in case of a cyclic/raced parent chain
    for _ in 0..32 {
        match current {
            Some(pid) if pid == ancestor => return true,
            Some(pid) => current = system.process(pid).and_then(|p| p.parent()),
            None => return false,
        }
    }
    false
}

/// Best-effort detection of the first TCP port `pid` listens on. Any denial
/// (missing /proc, foreign process fds) degrades to `None`.
#[cfg(unix)]
fn listening_port_of(pid: u32) -> Option<u16> {
    use std::collections::HashSet;
    use std::fs;

    let mut inodes = HashSet::new();
    for entry in fs::read_dir(format!("/proc/{}/fd", pid)).ok()? {
        let Ok(target) = fs::read_link(entry.ok()?.path()) else {
            continue;
        };
        let target = target.to_string_lossy().to_string();
        if let Some(inode) = target
            .strip_prefix("socket:[")
            .and_then(|s| s.strip_suffix(']'))
            .and_then(|s| s.parse::<u64>().ok())
        {
            inodes.insert(inode);
        }
    }

    let mut listeners = parse_tcp_table(&fs::read_to_string("/proc/net/tcp").ok()?);
    if let Ok(tcp6) = fs::read_to_string("/proc/net/tcp6") {
        listeners.extend(parse_tcp_table(&tcp6));
    }

    listeners
        .into_iter()
        .find(|(inode, _)| inodes.contains(inode))
        .map(|(_, port)| port)
}

#[cfg(not(unix))]
fn listening_port_of(_pid: u32) -> Option<u16> {
    None
}

/// `(inode, local port)` of every LISTEN row in a /proc/net/tcp table.
#[cfg(unix)]
fn parse_tcp_table(table: &str) -> Vec<(u64, u16)> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // sl local rem st ... inode is field 9
            if *fields.get(3)? != "0A" {
                return None;
            }
            let port = u16::from_str_radix(fields.get(1)?.rsplit(':').next()?, 16).ok()?;
            let inode = fields.get(9)?.parse().ok()?;
            Some((inode, port))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::FakeMultiplexer;
    use msm_protocol::management::instance::{InstanceConfigBuilder, ServerKind};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn no_session_means_no_sample() {
        let mux = Arc::new(FakeMultiplexer::new(true));
        let sampler = ResourceSampler::new(mux);
        let config = InstanceConfigBuilder::new()
            .name("idle")
            .kind(ServerKind::Paper)
            .build()
            .unwrap();

        assert_eq!(sampler.sample(&config).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn tcp_table_parser_keeps_listen_rows_only() {
        let table = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
           0: 00000000:63DD 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 31810 1 0000000000000000 100 0 0 10 0\n\
           1: 0100007F:8124 00000000:0000 06 00000000:00000000 00:00000000 00000000  1000        0 0 3 0000000000000000\n";
        let rows = parse_tcp_table(table);
        assert_eq!(rows, vec![(31810, 0x63DD)]);
    }

    #[cfg(unix)]
    #[test]
    fn denied_proc_access_degrades_to_none() {
        // pid 0 has no /proc entry
        assert_eq!(listening_port_of(0), None);
    }
}
