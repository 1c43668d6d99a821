//! The persistence capability consumed by the core.

use crate::error::Result;
use crate::models::{Breakpoint, Session};

/// Save/load/delete/list sessions and their breakpoints by key.
///
/// Implementations must delete a session's steps and breakpoints together
/// with the session, and must make `save_session` atomic: readers see either
/// the previous version of a session or the new one, never a mix.
pub trait SessionStore {
    /// Insert or replace a session and all of its steps.
    fn save_session(&self, session: &Session) -> Result<()>;

    /// Load a session with its steps.
    fn load_session(&self, id: &str) -> Result<Option<Session>>;

    /// All sessions, newest first.
    fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<Session>>;

    /// Delete a session, its steps and its breakpoints. Returns whether it existed.
    fn delete_session(&self, id: &str) -> Result<bool>;

    fn session_exists(&self, id: &str) -> Result<bool>;

    /// Most recently created session with this name.
    fn find_session_by_name(&self, name: &str) -> Result<Option<Session>>;

    /// Ids of sessions whose id starts with `prefix`.
    fn find_session_ids_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Insert a breakpoint and return its store-assigned id.
    fn add_breakpoint(
        &self,
        session_id: &str,
        step_number: Option<usize>,
        pattern: Option<&str>,
        on_error: bool,
    ) -> Result<i64>;

    /// Breakpoints for a session in insertion order.
    fn list_breakpoints(&self, session_id: &str) -> Result<Vec<Breakpoint>>;

    /// Remove a breakpoint. Returns whether it existed.
    fn remove_breakpoint(&self, id: i64) -> Result<bool>;
}
