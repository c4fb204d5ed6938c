use serde::{Deserialize, Serialize};

/// Result of a start request. `AlreadyRunning` is an idempotent no-op, not a
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// The session did not appear within the confirmation window. No cleanup
    /// is attempted; the operator is told to inspect manually.
    Failed {
        reason: String,
    },
}

impl StartOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            StartOutcome::Started | StartOutcome::AlreadyRunning => 0,
            StartOutcome::Failed { .. } => 1,
        }
    }
}

/// Result of a stop request. A forced termination after the graceful window
/// still counts as stopped (`graceful == false`), exit code 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StopOutcome {
    Stopped { graceful: bool },
    NotRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestartOutcome {
    pub stop: StopOutcome,
    pub start: StartOutcome,
}

impl RestartOutcome {
    pub fn exit_code(&self) -> i32 {
        self.start.exit_code()
    }
}

/// Result of delivering a console line to the instance's input stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SendOutcome {
    Sent,
    NotRunning,
}
