mod screen;

pub use screen::ScreenMultiplexer;

use async_trait::async_trait;
use msm_protocol::Result;
use std::path::PathBuf;

/// Label of the detached session backing an instance. The label is the only
/// identity a session has; liveness is always re-derived by listing.
pub fn session_label(name: &str) -> String {
    format!("msm-{}", name)
}

/// One live named session as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub pid: u32,
    pub label: String,
}

/// A prepared launch command: program, arguments, working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// The four operations the core needs from a terminal-session backend. The
/// lifecycle controller and samplers depend only on this contract, never on
/// a particular tool's listing format.
#[async_trait]
pub trait SessionMultiplexer: Send + Sync {
    /// Create a new detached session labeled `label` running `command`.
    async fn spawn_detached(&self, label: &str, command: &SessionCommand) -> Result<()>;

    /// All currently existing sessions, as typed records.
    async fn list(&self) -> Result<Vec<SessionRecord>>;

    /// Deliver one literal text line to the session's input stream.
    async fn send_line(&self, label: &str, line: &str) -> Result<()>;

    /// Forcibly terminate the session and the process tree it wraps.
    async fn kill(&self, label: &str) -> Result<()>;

    async fn find(&self, label: &str) -> Result<Option<SessionRecord>> {
        Ok(self.list().await?.into_iter().find(|s| s.label == label))
    }
}
