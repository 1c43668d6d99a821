//! Resolve a session from an id, a name, or an id prefix.

use tracing::debug;

use crate::error::{Result, RewindError};
use crate::models::Session;
use crate::store::SessionStore;

/// Shortest id prefix accepted as a session reference.
pub const MIN_PREFIX_LEN: usize = 4;

/// Find the session `key` refers to.
///
/// Priority order:
/// 1. Exact id
/// 2. Name (most recently created wins)
/// 3. Unique id prefix of at least [`MIN_PREFIX_LEN`] characters
pub fn resolve_session(store: &dyn SessionStore, key: &str) -> Result<Session> {
    if let Some(session) = store.load_session(key)? {
        return Ok(session);
    }

    if let Some(session) = store.find_session_by_name(key)? {
        debug!(key, id = %session.id, "resolved session by name");
        return Ok(session);
    }

    if key.chars().count() >= MIN_PREFIX_LEN {
        let ids = store.find_session_ids_by_prefix(key)?;
        match ids.as_slice() {
            [id] => {
                debug!(key, %id, "resolved session by id prefix");
                return store
                    .load_session(id)?
                    .ok_or_else(|| RewindError::NotFound(format!("session '{id}'")));
            }
            [] => {}
            many => {
                return Err(RewindError::NotFound(format!(
                    "unique session for ambiguous prefix '{key}' ({} candidates)",
                    many.len()
                )));
            }
        }
    }

    Err(RewindError::NotFound(format!("session '{key}'")))
}
