//! Step model representing one executed command.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded command and its outcome.
///
/// Steps are never mutated once recorded; branching copies them by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Position of the step within its session.
    pub step_number: usize,
    /// The literal command text.
    pub command: String,
    /// Combined stdout and stderr, trailing newlines stripped.
    pub output: String,
    /// Process exit status; `0` means success.
    pub exit_code: i32,
    /// When the command was executed.
    pub timestamp: DateTime<Utc>,
    /// Working directory at execution time.
    pub cwd: String,
    /// Allow-listed environment variables captured at execution time.
    #[serde(default)]
    pub env_snapshot: BTreeMap<String, String>,
}

impl Step {
    /// Whether the command exited with code 0.
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether the command exited with a non-zero code.
    pub const fn failed(&self) -> bool {
        !self.succeeded()
    }

    /// Short status label, `OK` or `ERR(<code>)`.
    pub fn status_label(&self) -> String {
        if self.succeeded() {
            "OK".to_string()
        } else {
            format!("ERR({})", self.exit_code)
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Step({}: {:?} [{}])",
            self.step_number,
            self.command,
            self.status_label()
        )
    }
}
