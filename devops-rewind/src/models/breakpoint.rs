//! Breakpoint model representing a stop condition on a session.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Step;

/// A breakpoint attached to a session.
///
/// Conditions are OR-combined: any one matching condition triggers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Identifier assigned by the store on insertion.
    pub id: i64,
    /// Owning session.
    pub session_id: String,
    /// Trigger at this exact step number.
    pub step_number: Option<usize>,
    /// Trigger when this regex is found anywhere in the command.
    pub pattern: Option<String>,
    /// Trigger on any non-zero exit code.
    pub on_error: bool,
}

impl Breakpoint {
    /// Whether any of this breakpoint's conditions match `step`.
    ///
    /// A pattern that does not compile never matches.
    pub fn matches_step(&self, step: &Step) -> bool {
        if self.step_number == Some(step.step_number) {
            return true;
        }

        if let Some(pattern) = &self.pattern {
            if pattern_found(pattern, &step.command) {
                return true;
            }
        }

        self.on_error && step.failed()
    }

    /// Human-readable description, e.g. `BP#3, at step 4, on any error`.
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("BP#{}", self.id)];
        if let Some(n) = self.step_number {
            parts.push(format!("at step {n}"));
        }
        if let Some(pattern) = &self.pattern {
            parts.push(format!("on pattern /{pattern}/"));
        }
        if self.on_error {
            parts.push("on any error".to_string());
        }
        parts.join(", ")
    }
}

fn pattern_found(pattern: &str, command: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(command))
}
