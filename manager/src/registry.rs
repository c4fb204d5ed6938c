use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;
use msm_protocol::management::instance::InstanceConfig;
use msm_protocol::{Error, Result};

use crate::ports;
use crate::storage::file::{Config, FileIoWithBackup};

pub const RECORD_FILE: &str = "msm_config.json";

struct RecordFile;

impl FileIoWithBackup for RecordFile {}

impl Config for RecordFile {
    type ConfigType = InstanceConfig;
}

/// Typed access to the per-instance record files under
/// `<servers_dir>/<name>/msm_config.json`. The registry is the sole writer;
/// `write_lock` serializes every read-modify-write so port allocation and
/// tuning cannot interleave within this process.
pub struct InstanceRegistry {
    servers_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl InstanceRegistry {
    pub fn new<P: Into<PathBuf>>(servers_dir: P) -> Result<Self> {
        let servers_dir = servers_dir.into();
        fs::create_dir_all(&servers_dir)?;
        Ok(Self {
            servers_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::new(crate::config::servers_dir())
    }

    pub fn servers_dir(&self) -> &Path {
        &self.servers_dir
    }

    fn instance_dir(&self, name: &str) -> PathBuf {
        self.servers_dir.join(name)
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.instance_dir(name).join(RECORD_FILE)
    }

    /// Names of all registered instances, sorted. A directory without a
    /// record file is not an instance.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names = vec![];
        for entry in fs::read_dir(&self.servers_dir)? {
            let entry = entry?;
            if entry.path().join(RECORD_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<InstanceConfig> {
        let path = self.record_path(name);
        if !path.is_file() {
            return Err(Error::NotFound(name.to_owned()));
        }
        let mut config = RecordFile::load_config(&path)
            .map_err(|e| Error::InvalidRecord(e.to_string()))?;
        if config.working_directory.as_os_str().is_empty() {
            config.working_directory = self.instance_dir(name);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &InstanceConfig) -> Result<()> {
        let _guard = self.lock();
        self.save_unlocked(config)
    }

    fn save_unlocked(&self, config: &InstanceConfig) -> Result<()> {
        config.validate()?;
        self.assert_port_free(&config.name, config.port)?;
        fs::create_dir_all(self.instance_dir(&config.name))?;
        RecordFile::save_config(self.record_path(&config.name), config)
            .map_err(|e| Error::InvalidRecord(e.to_string()))
    }

    /// Locked read-modify-write of one record.
    pub fn update<F>(&self, name: &str, f: F) -> Result<InstanceConfig>
    where
        F: FnOnce(&mut InstanceConfig),
    {
        let _guard = self.lock();
        let mut config = self.load(name)?;
        f(&mut config);
        self.save_unlocked(&config)?;
        Ok(config)
    }

    /// Ports held by all registered instances. Unreadable records are skipped
    /// with a warning; a full scan must not die on one bad file.
    pub fn used_ports(&self) -> Result<BTreeSet<u16>> {
        Ok(self.readable_configs()?.map(|c| c.port).collect())
    }

    /// Ports held by two or more records. Non-empty means a prior allocation
    /// race was hit; callers surface this as a warning.
    pub fn conflicting_ports(&self) -> Result<BTreeSet<u16>> {
        let mut seen = BTreeSet::new();
        let mut conflicts = BTreeSet::new();
        for config in self.readable_configs()? {
            if !seen.insert(config.port) {
                conflicts.insert(config.port);
            }
        }
        Ok(conflicts)
    }

    pub fn next_free_port(&self) -> Result<u16> {
        Ok(ports::allocate(&self.used_ports()?))
    }

    fn readable_configs(&self) -> Result<impl Iterator<Item = InstanceConfig> + '_> {
        let names = self.names()?;
        Ok(names.into_iter().filter_map(move |name| {
            self.load(&name)
                .map_err(|e| warn!("skipping record '{}': {}", name, e))
                .ok()
        }))
    }

    fn assert_port_free(&self, name: &str, port: u16) -> Result<()> {
        for other in self.names()? {
            if other == name {
                continue;
            }
            if let Ok(config) = self.load(&other) {
                if config.port == port {
                    return Err(Error::PortConflict(port));
                }
            }
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msm_protocol::management::instance::{InstanceConfigBuilder, ServerKind};
    use pretty_assertions::assert_eq;

    fn registry() -> (tempfile::TempDir, InstanceRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = InstanceRegistry::new(dir.path().join("servers")).unwrap();
        (dir, registry)
    }

    fn config(name: &str, port: u16) -> InstanceConfig {
        InstanceConfigBuilder::new()
            .name(name)
            .kind(ServerKind::Paper)
            .port(port)
            .build()
            .unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, registry) = registry();
        let original = config("survival", 25565);
        registry.save(&original).unwrap();

        let loaded = registry.load("survival").unwrap();
        assert_eq!(loaded.port, original.port);
        assert_eq!(loaded.kind, original.kind);
        // empty on disk, filled with the record directory on load
        assert_eq!(
            loaded.working_directory,
            registry.servers_dir().join("survival")
        );
    }

    #[test]
    fn load_of_unknown_name_is_not_found() {
        let (_dir, registry) = registry();
        assert!(matches!(
            registry.load("ghost"),
            Err(Error::NotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn names_are_sorted_and_require_a_record() {
        let (_dir, registry) = registry();
        registry.save(&config("beta", 25566)).unwrap();
        registry.save(&config("alpha", 25565)).unwrap();
        fs::create_dir_all(registry.servers_dir().join("not-an-instance")).unwrap();

        assert_eq!(registry.names().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn update_persists_the_mutation() {
        let (_dir, registry) = registry();
        registry.save(&config("survival", 25565)).unwrap();

        let updated = registry.update("survival", |c| c.ram_mb = 4096).unwrap();
        assert_eq!(updated.ram_mb, 4096);
        assert_eq!(registry.load("survival").unwrap().ram_mb, 4096);
    }

    #[test]
    fn save_rejects_a_taken_port() {
        let (_dir, registry) = registry();
        registry.save(&config("one", 25565)).unwrap();

        let err = registry.save(&config("two", 25565)).unwrap_err();
        assert!(matches!(err, Error::PortConflict(25565)));
    }

    #[test]
    fn conflicting_ports_detects_records_racing_past_allocation() {
        let (_dir, registry) = registry();
        registry.save(&config("one", 25565)).unwrap();
        // simulate a second process winning the same port: write the record
        // behind the registry's back
        let rogue_dir = registry.servers_dir().join("two");
        fs::create_dir_all(&rogue_dir).unwrap();
        fs::write(
            rogue_dir.join(RECORD_FILE),
            serde_json::to_string(&config("two", 25565)).unwrap(),
        )
        .unwrap();

        let conflicts = registry.conflicting_ports().unwrap();
        assert_eq!(conflicts, [25565].into_iter().collect());
    }

    #[test]
    fn next_free_port_skips_used_ports() {
        let (_dir, registry) = registry();
        registry.save(&config("one", 25565)).unwrap();
        registry.save(&config("two", 25566)).unwrap();
        assert_eq!(registry.next_free_port().unwrap(), 25567);
    }

    #[test]
    fn unreadable_record_does_not_poison_the_scan() {
        let (_dir, registry) = registry();
        registry.save(&config("good", 25565)).unwrap();
        let bad_dir = registry.servers_dir().join("bad");
        fs::create_dir_all(&bad_dir).unwrap();
        fs::write(bad_dir.join(RECORD_FILE), "{ not json").unwrap();

        assert_eq!(registry.used_ports().unwrap(), [25565].into_iter().collect());
    }
}
