use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub trait FileIoWithBackup {
    /// Replaces the file atomically (write to `.tmp`, then rename) and keeps
    /// the previous content in a `.bak` next to it.
    fn write_with_backup<P: AsRef<Path>>(path: P, content: &str) -> Result<(), std::io::Error> {
        let path = path.as_ref();

        if path.exists() {
            let backup_path = path.with_extension("bak");
            fs::copy(path, backup_path)?;
        }

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;

        Ok(())
    }
}

/// Trait for configuration handling.
pub trait Config: FileIoWithBackup {
    type ConfigType: Serialize + for<'de> Deserialize<'de>;

    fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Self::ConfigType> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self::ConfigType = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        Ok(config)
    }

    fn save_config<P: AsRef<Path>>(path: P, config: &Self::ConfigType) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(config)?;
        Self::write_with_backup(path, &content)?;
        Ok(())
    }

    fn load_config_or_default<P: AsRef<Path>, F: FnOnce() -> Self::ConfigType>(
        path: P,
        default: F,
    ) -> anyhow::Result<Self::ConfigType> {
        match fs::metadata(path.as_ref()) {
            Ok(metadata) if metadata.is_file() => Self::load_config(path),
            _ => {
                let config = default();
                Self::save_config(path, &config)?;
                Ok(config)
            }
        }
    }
}
