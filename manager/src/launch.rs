use std::fs;
use std::path::Path;

use log::debug;
use msm_protocol::management::instance::{InstanceConfig, ServerKind};
use msm_protocol::{Error, Result};

use crate::session::SessionCommand;

pub trait LaunchExt {
    /// Builds the command a session will execute for this instance. Fails
    /// when the working directory or launch artifact is missing; such
    /// failures are reported to the operator, never retried.
    fn launch_command(&self) -> Result<SessionCommand>;
}

impl LaunchExt for InstanceConfig {
    fn launch_command(&self) -> Result<SessionCommand> {
        let dir = &self.working_directory;
        if !dir.is_dir() {
            return Err(Error::Launch(format!(
                "working directory {} does not exist",
                dir.display()
            )));
        }
        let artifact = dir.join(&self.launch_artifact);
        if !artifact.is_file() {
            return Err(Error::Launch(format!(
                "launch artifact {} is missing",
                artifact.display()
            )));
        }

        let command = match self.kind {
            ServerKind::Bedrock => SessionCommand {
                program: artifact.to_string_lossy().into_owned(),
                args: vec![],
                working_dir: dir.clone(),
            },
            _ => {
                let mut args = read_jvm_flags(dir);
                args.push(format!("-Xms{}M", self.ram_mb));
                args.push(format!("-Xmx{}M", self.ram_mb));
                args.push("-jar".to_owned());
                args.push(self.launch_artifact.to_string_lossy().into_owned());
                if !self.kind.is_proxy() {
                    args.push("nogui".to_owned());
                }
                SessionCommand {
                    program: "java".to_owned(),
                    args,
                    working_dir: dir.clone(),
                }
            }
        };
        debug!("launch command for '{}': {:?}", self.name, command);
        Ok(command)
    }
}

/// Optional extra JVM flags, one per line, from `jvm_flags.txt` in the
/// instance directory.
fn read_jvm_flags(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("jvm_flags.txt"))
        .map(|text| {
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
