//! Session model: an append-only log of steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Step;

/// A recorded terminal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Globally unique identifier, never reassigned.
    pub id: String,
    /// Human label; not unique.
    pub name: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Recorded steps in insertion order.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Session this one was branched from, if any.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Step the branch was taken at. Present iff `parent_id` is.
    #[serde(default)]
    pub fork_step: Option<usize>,
}

impl Session {
    /// Create a new root session with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            steps: Vec::new(),
            parent_id: None,
            fork_step: None,
        }
    }

    /// Create an empty child session pointing at `parent_id`.
    pub(crate) fn new_branch(name: impl Into<String>, parent_id: &str, fork_step: usize) -> Self {
        Self {
            parent_id: Some(parent_id.to_string()),
            fork_step: Some(fork_step),
            ..Self::new(name)
        }
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Time between the first and last step, if there are at least two.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match self.steps.as_slice() {
            [first, .., last] => Some(last.timestamp - first.timestamp),
            _ => None,
        }
    }

    /// Whether this session was forked from another.
    pub const fn is_branch(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Look up a step by its step number.
    pub fn get_step(&self, step_number: usize) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_number == step_number)
    }

    /// Steps whose numbers fall in `from..=to`.
    pub fn get_range(&self, from: usize, to: usize) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| (from..=to).contains(&s.step_number))
            .collect()
    }

    /// Append a step to the log.
    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Number of steps with a non-zero exit code.
    pub fn failure_count(&self) -> usize {
        self.steps.iter().filter(|s| s.failed()).count()
    }

    /// First eight characters of the id, for display.
    pub fn short_id(&self) -> &str {
        self.id
            .char_indices()
            .nth(8)
            .map_or(self.id.as_str(), |(end, _)| &self.id[..end])
    }
}
