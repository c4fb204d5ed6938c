use async_trait::async_trait;
use lazy_static::lazy_static;
use log::debug;
use msm_protocol::{Error, Result};
use regex::Regex;
use std::process::Output;
use tokio::process::Command;

use super::{SessionCommand, SessionMultiplexer, SessionRecord};

lazy_static! {
    // "\t3620.msm-survival\t(Detached)" -> pid 3620, label "msm-survival"
    static ref SESSION_LINE: Regex =
        Regex::new(r"(?m)^\s+(\d+)\.(\S+)\s").expect("Failed to compile SESSION_LINE regex");
}

/// GNU screen backend. Every operation shells out to `screen`; listing output
/// is parsed here and nowhere else.
pub struct ScreenMultiplexer;

impl ScreenMultiplexer {
    pub fn new() -> Self {
        Self
    }

    async fn run(args: &[&str]) -> Result<Output> {
        debug!("screen {}", args.join(" "));
        Command::new("screen")
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Session(format!("cannot run screen: {}", e)))
    }
}

impl Default for ScreenMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_listing(output: &str) -> Vec<SessionRecord> {
    SESSION_LINE
        .captures_iter(output)
        .filter_map(|caps| {
            Some(SessionRecord {
                pid: caps.get(1)?.as_str().parse().ok()?,
                label: caps.get(2)?.as_str().to_owned(),
            })
        })
        .collect()
}

#[async_trait]
impl SessionMultiplexer for ScreenMultiplexer {
    async fn spawn_detached(&self, label: &str, command: &SessionCommand) -> Result<()> {
        let mut cmd = Command::new("screen");
        cmd.arg("-dmS")
            .arg(label)
            .arg(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir);
        debug!("spawning session '{}': {:?}", label, command);

        let status = cmd
            .status()
            .await
            .map_err(|e| Error::Session(format!("cannot run screen: {}", e)))?;
        if !status.success() {
            return Err(Error::Session(format!(
                "screen -dmS {} exited with {}",
                label, status
            )));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionRecord>> {
        // screen -ls exits non-zero when no sessions exist, so only the
        // output is inspected.
        let output = Self::run(&["-ls"]).await?;
        Ok(parse_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn send_line(&self, label: &str, line: &str) -> Result<()> {
        let stuffed = format!("{}\n", line);
        let output = Self::run(&["-S", label, "-X", "stuff", &stuffed]).await?;
        if !output.status.success() {
            return Err(Error::Session(format!(
                "could not deliver input to session '{}'",
                label
            )));
        }
        Ok(())
    }

    async fn kill(&self, label: &str) -> Result<()> {
        let output = Self::run(&["-S", label, "-X", "quit"]).await?;
        if !output.status.success() {
            return Err(Error::Session(format!(
                "could not terminate session '{}'",
                label
            )));
        }
        Ok(())
    }
}
