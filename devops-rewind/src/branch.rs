//! Session branching and lineage.
//!
//! A branch is a new session holding value copies of a prefix of another
//! session's steps, linked back through `parent_id` / `fork_step`.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::{Result, RewindError};
use crate::models::Session;
use crate::store::SessionStore;

/// Fork `original` at `from_step` (inclusive).
///
/// The new session gets a fresh id, `parent_id = original.id`,
/// `fork_step = from_step`, and copies of every step numbered `<= from_step`.
/// When `store` is given the branch is saved before returning; a failed save
/// leaves nothing behind because the save is a single transaction.
pub fn fork(
    original: &Session,
    from_step: i64,
    new_name: Option<&str>,
    store: Option<&dyn SessionStore>,
) -> Result<Session> {
    if original.total_steps() == 0 {
        return Err(RewindError::EmptySession {
            name: original.name.clone(),
        });
    }

    let max_step = original.total_steps() - 1;
    let from = usize::try_from(from_step)
        .ok()
        .filter(|n| *n <= max_step)
        .ok_or_else(|| RewindError::OutOfRange {
            session: original.name.clone(),
            requested: from_step,
            max: max_step,
        })?;

    let name = new_name.map_or_else(
        || format!("{}-branch-{from}", original.name),
        ToString::to_string,
    );

    let mut branch = Session::new_branch(name, &original.id, from);
    let mut copied: Vec<_> = original
        .steps
        .iter()
        .filter(|s| s.step_number <= from)
        .cloned()
        .collect();
    copied.sort_by_key(|s| s.step_number);
    for step in copied {
        branch.add_step(step);
    }

    if let Some(store) = store {
        store.save_session(&branch)?;
    }

    info!(
        parent = %original.id,
        branch = %branch.id,
        fork_step = from,
        steps = branch.total_steps(),
        "created branch"
    );
    Ok(branch)
}

/// The chain of sessions from the oldest resolvable ancestor to `session`.
///
/// The walk stops quietly at a root, at a parent the store cannot load, or
/// at an id already visited.
pub fn lineage(session: &Session, store: &dyn SessionStore) -> Result<Vec<Session>> {
    let mut chain = vec![session.clone()];
    let mut seen = HashSet::from([session.id.clone()]);
    let mut parent_id = session.parent_id.clone();

    while let Some(id) = parent_id {
        if !seen.insert(id.clone()) {
            warn!(session_id = %id, "cycle in branch lineage; truncating");
            break;
        }
        let Some(parent) = store.load_session(&id)? else {
            warn!(session_id = %id, "ancestor not found; truncating lineage");
            break;
        };
        parent_id = parent.parent_id.clone();
        chain.push(parent);
    }

    chain.reverse();
    Ok(chain)
}
