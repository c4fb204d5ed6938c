use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use crate::storage::file::{Config, FileIoWithBackup};

/// Bounded-wait parameters for lifecycle operations and the monitor loop.
/// Every blocking wait in the manager derives its deadline from here; none
/// blocks indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timings {
    pub stop_timeout_secs: u64,
    pub stop_poll_ms: u64,
    pub start_confirm_ms: u64,
    pub start_poll_ms: u64,
    pub restart_delay_secs: u64,
    pub monitor_interval_secs: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            stop_timeout_secs: 30,
            stop_poll_ms: 1000,
            start_confirm_ms: 2000,
            start_poll_ms: 250,
            restart_delay_secs: 3,
            monitor_interval_secs: 2,
        }
    }
}

impl Timings {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn stop_poll(&self) -> Duration {
        Duration::from_millis(self.stop_poll_ms)
    }

    pub fn start_confirm(&self) -> Duration {
        Duration::from_millis(self.start_confirm_ms)
    }

    pub fn start_poll(&self) -> Duration {
        Duration::from_millis(self.start_poll_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

/// immutable through full lifetime of app, unless restart app.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub timings: Timings,
}

impl FileIoWithBackup for AppConfig {}

impl Config for AppConfig {
    type ConfigType = AppConfig;
}

/// `~/.msm`, next to the servers it manages.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".msm")
}

pub fn servers_dir() -> PathBuf {
    data_dir().join("servers")
}

impl AppConfig {
    fn load() -> AppConfig {
        let dir = data_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::warn!("cannot create {}: {}, using defaults", dir.display(), e);
            return AppConfig::default();
        }
        Self::load_config_or_default(dir.join("config.json"), AppConfig::default)
            .unwrap_or_else(|e| {
                log::warn!("config unreadable ({}), using defaults", e);
                AppConfig::default()
            })
    }
}

static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(AppConfig::load);

impl AppConfig {
    pub fn get() -> &'static AppConfig {
        &APP_CONFIG
    }
}
