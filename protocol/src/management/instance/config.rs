use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    Vanilla,
    Paper,
    Spigot,
    Purpur,
    Fabric,
    Forge,
    NeoForge,
    BungeeCord,
    Velocity,
    Bedrock,
}

impl ServerKind {
    pub fn is_proxy(&self) -> bool {
        matches!(self, ServerKind::BungeeCord | ServerKind::Velocity)
    }

    /// Executable name the managed process runs under, used to narrow OS
    /// process listings to candidates of this kind.
    pub fn runtime_process(&self) -> &'static str {
        match self {
            ServerKind::Bedrock => "bedrock_server",
            _ => "java",
        }
    }

    /// Console line that asks this kind of server to shut itself down.
    pub fn stop_command(&self) -> &'static str {
        match self {
            ServerKind::BungeeCord => "end",
            ServerKind::Velocity => "shutdown",
            _ => "stop",
        }
    }
}

pub const PORT_MIN: u16 = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceConfig {
    #[serde(default = "uuid::Uuid::new_v4")]
    pub uuid: Uuid,

    pub name: String,
    pub kind: ServerKind,

    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_ram_mb")]
    pub ram_mb: u32,
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default = "default_launch_artifact")]
    pub launch_artifact: PathBuf,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Filled by the registry with the record's own directory when empty.
    #[serde(default)]
    pub working_directory: PathBuf,
}

fn default_version() -> String {
    "latest".to_owned()
}

fn default_ram_mb() -> u32 {
    2048
}

fn default_cores() -> u32 {
    2
}

fn default_launch_artifact() -> PathBuf {
    "server.jar".into()
}

fn default_port() -> u16 {
    25565
}

fn is_filesystem_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.')
}

impl InstanceConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !is_filesystem_safe(&self.name) {
            return Err(Error::InvalidRecord(format!(
                "name '{}' is not filesystem-safe",
                self.name
            )));
        }
        if self.ram_mb == 0 {
            return Err(Error::InvalidRecord("ram_mb must be > 0".to_owned()));
        }
        if self.cores == 0 {
            return Err(Error::InvalidRecord("cores must be > 0".to_owned()));
        }
        if self.port < PORT_MIN {
            return Err(Error::InvalidRecord(format!(
                "port {} below minimum {}",
                self.port, PORT_MIN
            )));
        }
        Ok(())
    }
}

pub struct InstanceConfigBuilder {
    uuid: Option<Uuid>,
    name: Option<String>,
    kind: Option<ServerKind>,
    version: Option<String>,
    ram_mb: Option<u32>,
    cores: Option<u32>,
    launch_artifact: Option<PathBuf>,
    port: Option<u16>,
    working_directory: Option<PathBuf>,
}

impl InstanceConfigBuilder {
    pub fn new() -> Self {
        Self {
            uuid: None,
            name: None,
            kind: None,
            version: None,
            ram_mb: None,
            cores: None,
            launch_artifact: None,
            port: None,
            working_directory: None,
        }
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: ServerKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn ram_mb(mut self, ram_mb: u32) -> Self {
        self.ram_mb = Some(ram_mb);
        self
    }

    pub fn cores(mut self, cores: u32) -> Self {
        self.cores = Some(cores);
        self
    }

    pub fn launch_artifact<P: Into<PathBuf>>(mut self, launch_artifact: P) -> Self {
        self.launch_artifact = Some(launch_artifact.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn working_directory<P: Into<PathBuf>>(mut self, working_directory: P) -> Self {
        self.working_directory = Some(working_directory.into());
        self
    }

    pub fn build(self) -> Result<InstanceConfig, Error> {
        let config = InstanceConfig {
            uuid: self.uuid.unwrap_or_else(Uuid::new_v4),
            name: self
                .name
                .ok_or_else(|| Error::InvalidRecord("name not set".to_owned()))?,
            kind: self
                .kind
                .ok_or_else(|| Error::InvalidRecord("kind not set".to_owned()))?,
            version: self.version.unwrap_or_else(default_version),
            ram_mb: self.ram_mb.unwrap_or_else(default_ram_mb),
            cores: self.cores.unwrap_or_else(default_cores),
            launch_artifact: self.launch_artifact.unwrap_or_else(default_launch_artifact),
            port: self.port.unwrap_or_else(default_port),
            working_directory: self.working_directory.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for InstanceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::str::FromStr;
    use std::sync::LazyLock;

    static INST_CONFIG: LazyLock<InstanceConfig> = LazyLock::new(|| {
        InstanceConfigBuilder::new()
            .uuid(Uuid::from_str("2a42f6ab-8bd9-450c-a391-5ee3bffffb64").unwrap())
            .name("survival")
            .kind(ServerKind::Paper)
            .version("1.20.4")
            .ram_mb(3072)
            .cores(2)
            .launch_artifact("server.jar")
            .port(25566)
            .working_directory("/home/user/.msm/servers/survival")
            .build()
            .unwrap()
    });

    const INST_CONFIG_TEXT: &str = r#"{
        "uuid": "2a42f6ab-8bd9-450c-a391-5ee3bffffb64",
        "name": "survival",
        "kind": "paper",
        "version": "1.20.4",
        "ram_mb": 3072,
        "cores": 2,
        "launch_artifact": "server.jar",
        "port": 25566,
        "working_directory": "/home/user/.msm/servers/survival"
    }"#;

    #[test]
    fn config_deserialize() {
        let deserialized: InstanceConfig = serde_json::from_str(INST_CONFIG_TEXT).unwrap();
        assert_eq!(*INST_CONFIG, deserialized);
    }

    #[test]
    fn config_serialize() {
        let serialized = serde_json::to_string_pretty(&*INST_CONFIG).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(serialized.as_str()).unwrap(),
            serde_json::from_str::<Value>(INST_CONFIG_TEXT).unwrap()
        );
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: InstanceConfig =
            serde_json::from_str(r#"{"name": "lobby", "kind": "velocity"}"#).unwrap();
        assert_eq!(config.version, "latest");
        assert_eq!(config.ram_mb, 2048);
        assert_eq!(config.cores, 2);
        assert_eq!(config.launch_artifact, PathBuf::from("server.jar"));
        assert_eq!(config.port, 25565);
        assert_eq!(config.working_directory, PathBuf::new());
    }

    #[test]
    fn missing_name_is_a_parse_error() {
        assert!(serde_json::from_str::<InstanceConfig>(r#"{"kind": "vanilla"}"#).is_err());
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(InstanceConfigBuilder::new()
            .name("has space")
            .kind(ServerKind::Vanilla)
            .build()
            .is_err());
        assert!(InstanceConfigBuilder::new()
            .name("ok")
            .kind(ServerKind::Vanilla)
            .ram_mb(0)
            .build()
            .is_err());
        assert!(InstanceConfigBuilder::new()
            .name("ok")
            .kind(ServerKind::Vanilla)
            .port(80)
            .build()
            .is_err());
    }

    #[test]
    fn kind_helpers() {
        assert!(ServerKind::BungeeCord.is_proxy());
        assert!(!ServerKind::Paper.is_proxy());
        assert_eq!(ServerKind::Bedrock.runtime_process(), "bedrock_server");
        assert_eq!(ServerKind::Fabric.runtime_process(), "java");
        assert_eq!(ServerKind::Velocity.stop_command(), "shutdown");
        assert_eq!(ServerKind::BungeeCord.stop_command(), "end");
        assert_eq!(ServerKind::Purpur.stop_command(), "stop");
    }
}
