//! Breakpoint creation and matching.
//!
//! Breakpoints can be:
//! - step-based: trigger at a specific step number
//! - pattern-based: trigger when a regex is found in the command
//! - error-based: trigger on any non-zero exit code
//!
//! Patterns are compiled once when a breakpoint is created and rejected if
//! invalid. Matching never fails: a pattern that no longer compiles simply
//! does not match.

use regex::Regex;
use tracing::debug;

use crate::error::{Result, RewindError};
use crate::models::{Breakpoint, Step};
use crate::store::SessionStore;

/// Validate breakpoint conditions before anything is stored.
pub fn validate(step_number: Option<usize>, pattern: Option<&str>, on_error: bool) -> Result<()> {
    if step_number.is_none() && pattern.is_none() && !on_error {
        return Err(RewindError::MissingCondition);
    }

    if let Some(pattern) = pattern {
        Regex::new(pattern).map_err(|source| RewindError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
    }

    Ok(())
}

/// Breakpoints from `breakpoints` that trigger on `step`, in their original order.
pub fn check<'a>(breakpoints: &'a [Breakpoint], step: &Step) -> Vec<&'a Breakpoint> {
    breakpoints.iter().filter(|bp| bp.matches_step(step)).collect()
}

/// Manages the breakpoints of one session through a store.
pub struct BreakpointManager<'a> {
    session_id: String,
    store: &'a dyn SessionStore,
}

impl<'a> BreakpointManager<'a> {
    pub fn new(session_id: impl Into<String>, store: &'a dyn SessionStore) -> Self {
        Self {
            session_id: session_id.into(),
            store,
        }
    }

    /// Validate and store a new breakpoint.
    pub fn add(
        &self,
        step_number: Option<usize>,
        pattern: Option<&str>,
        on_error: bool,
    ) -> Result<Breakpoint> {
        validate(step_number, pattern, on_error)?;

        let id = self
            .store
            .add_breakpoint(&self.session_id, step_number, pattern, on_error)?;
        debug!(session_id = %self.session_id, breakpoint = id, "added breakpoint");

        Ok(Breakpoint {
            id,
            session_id: self.session_id.clone(),
            step_number,
            pattern: pattern.map(ToString::to_string),
            on_error,
        })
    }

    /// Remove a breakpoint by id. Returns whether it existed.
    ///
    /// Only breakpoints belonging to this session are removed.
    pub fn remove(&self, id: i64) -> Result<bool> {
        if !self.list()?.iter().any(|bp| bp.id == id) {
            return Ok(false);
        }
        self.store.remove_breakpoint(id)
    }

    /// All breakpoints for the session, in insertion order.
    pub fn list(&self) -> Result<Vec<Breakpoint>> {
        self.store.list_breakpoints(&self.session_id)
    }

    /// Breakpoints that trigger on `step`.
    pub fn check(&self, step: &Step) -> Result<Vec<Breakpoint>> {
        let all = self.list()?;
        Ok(check(&all, step).into_iter().cloned().collect())
    }

    /// Step-based breakpoints targeting `step_number`.
    pub fn check_step_number(&self, step_number: usize) -> Result<Vec<Breakpoint>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|bp| bp.step_number == Some(step_number))
            .collect())
    }
}
