//! Database connection management.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use super::queries::{BreakpointQueries, SessionQueries, StepQueries};
use crate::error::{Result, RewindError};
use crate::models::{Breakpoint, Session};
use crate::store::SessionStore;

/// SQLite-backed session store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database at a specific path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened session database");

        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                parent_id   TEXT,
                fork_step   INTEGER
            );

            CREATE TABLE IF NOT EXISTS steps (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                step_number  INTEGER NOT NULL,
                command      TEXT NOT NULL,
                output       TEXT NOT NULL,
                exit_code    INTEGER NOT NULL,
                timestamp    TEXT NOT NULL,
                cwd          TEXT NOT NULL,
                env_snapshot TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS breakpoints (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                step_number  INTEGER,
                pattern      TEXT,
                on_error     INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_name ON sessions(name, created_at);
            CREATE INDEX IF NOT EXISTS idx_steps_session ON steps(session_id, step_number);
            CREATE INDEX IF NOT EXISTS idx_breakpoints_session ON breakpoints(session_id);
            ",
        )?;
        Ok(())
    }

    /// Get a reference to the connection.
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn with_steps(&self, mut session: Session) -> Result<Session> {
        session.steps = StepQueries::list_for_session(&self.conn, &session.id)?;
        Ok(session)
    }
}

impl SessionStore for Database {
    fn save_session(&self, session: &Session) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        SessionQueries::upsert(&tx, session)?;
        StepQueries::delete_for_session(&tx, &session.id)?;
        for step in &session.steps {
            StepQueries::insert(&tx, &session.id, step)?;
        }
        tx.commit()?;

        debug!(
            session_id = %session.id,
            steps = session.total_steps(),
            "saved session"
        );
        Ok(())
    }

    fn load_session(&self, id: &str) -> Result<Option<Session>> {
        SessionQueries::get_by_id(&self.conn, id)?
            .map(|s| self.with_steps(s))
            .transpose()
    }

    fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<Session>> {
        SessionQueries::list(&self.conn, limit)?
            .into_iter()
            .map(|s| self.with_steps(s))
            .collect()
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let deleted = SessionQueries::delete(&self.conn, id)?;
        if deleted {
            info!(session_id = %id, "deleted session");
        }
        Ok(deleted)
    }

    fn session_exists(&self, id: &str) -> Result<bool> {
        SessionQueries::exists(&self.conn, id)
    }

    fn find_session_by_name(&self, name: &str) -> Result<Option<Session>> {
        SessionQueries::get_latest_by_name(&self.conn, name)?
            .map(|s| self.with_steps(s))
            .transpose()
    }

    fn find_session_ids_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        SessionQueries::ids_with_prefix(&self.conn, prefix)
    }

    fn add_breakpoint(
        &self,
        session_id: &str,
        step_number: Option<usize>,
        pattern: Option<&str>,
        on_error: bool,
    ) -> Result<i64> {
        if !SessionQueries::exists(&self.conn, session_id)? {
            return Err(RewindError::NotFound(format!("session '{session_id}'")));
        }
        BreakpointQueries::insert(&self.conn, session_id, step_number, pattern, on_error)
    }

    fn list_breakpoints(&self, session_id: &str) -> Result<Vec<Breakpoint>> {
        BreakpointQueries::list_for_session(&self.conn, session_id)
    }

    fn remove_breakpoint(&self, id: i64) -> Result<bool> {
        BreakpointQueries::delete(&self.conn, id)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::models::Step;

    fn sample_session(name: &str, steps: usize) -> Session {
        let mut session = Session::new(name);
        for n in 0..steps {
            let mut env = BTreeMap::new();
            env.insert("HOME".to_string(), "/home/user".to_string());
            session.add_step(Step {
                step_number: n,
                command: format!("echo {n}"),
                output: n.to_string(),
                exit_code: i32::from(n == 2),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
                    + chrono::Duration::milliseconds(i64::try_from(n).unwrap() * 1500),
                cwd: "/srv".to_string(),
                env_snapshot: env,
            });
        }
        session
    }

    #[test]
    fn test_database_creation() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("test.db");
        let _db = Database::open_at(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let session = sample_session("deploy", 4);
        db.save_session(&session).unwrap();

        let loaded = db.load_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(db.load_session("missing").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_steps() {
        let db = Database::open_in_memory().unwrap();
        let mut session = sample_session("deploy", 2);
        db.save_session(&session).unwrap();

        session.add_step(sample_session("x", 3).steps[2].clone());
        db.save_session(&session).unwrap();

        let loaded = db.load_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded.total_steps(), 3);
    }

    #[test]
    fn test_resave_keeps_breakpoints() {
        let db = Database::open_in_memory().unwrap();
        let session = sample_session("deploy", 2);
        db.save_session(&session).unwrap();
        db.add_breakpoint(&session.id, Some(1), None, false).unwrap();

        db.save_session(&session).unwrap();
        assert_eq!(db.list_breakpoints(&session.id).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_cascades() {
        let db = Database::open_in_memory().unwrap();
        let session = sample_session("deploy", 3);
        db.save_session(&session).unwrap();
        db.add_breakpoint(&session.id, None, Some("make"), true).unwrap();

        assert!(db.delete_session(&session.id).unwrap());
        assert!(!db.session_exists(&session.id).unwrap());
        assert!(!db.delete_session(&session.id).unwrap());

        let orphan_steps: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM steps", [], |row| row.get(0))
            .unwrap();
        let orphan_bps: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM breakpoints", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphan_steps, 0);
        assert_eq!(orphan_bps, 0);
    }

    #[test]
    fn test_find_by_name_prefers_newest() {
        let db = Database::open_in_memory().unwrap();
        let mut older = sample_session("same", 1);
        older.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut newer = sample_session("same", 2);
        newer.created_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        db.save_session(&older).unwrap();
        db.save_session(&newer).unwrap();

        let found = db.find_session_by_name("same").unwrap().unwrap();
        assert_eq!(found.id, newer.id);
        assert!(db.find_session_by_name("other").unwrap().is_none());
    }

    #[test]
    fn test_list_sessions_newest_first_with_limit() {
        let db = Database::open_in_memory().unwrap();
        for (i, day) in [3u32, 1, 2].iter().enumerate() {
            let mut s = sample_session(&format!("s{i}"), 0);
            s.created_at = Utc.with_ymd_and_hms(2024, 1, *day, 0, 0, 0).unwrap();
            db.save_session(&s).unwrap();
        }

        let all = db.list_sessions(None).unwrap();
        let names: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["s0", "s2", "s1"]);
        assert_eq!(db.list_sessions(Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_breakpoints_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let session = sample_session("deploy", 1);
        db.save_session(&session).unwrap();

        let first = db.add_breakpoint(&session.id, Some(3), None, false).unwrap();
        let second = db.add_breakpoint(&session.id, None, Some("^make"), true).unwrap();

        let bps = db.list_breakpoints(&session.id).unwrap();
        assert_eq!(bps.iter().map(|b| b.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(bps[1].pattern.as_deref(), Some("^make"));
        assert!(bps[1].on_error);

        assert!(db.remove_breakpoint(first).unwrap());
        assert!(!db.remove_breakpoint(first).unwrap());
        assert_eq!(db.list_breakpoints(&session.id).unwrap().len(), 1);
    }

    #[test]
    fn test_add_breakpoint_unknown_session() {
        let db = Database::open_in_memory().unwrap();
        let err = db.add_breakpoint("nope", Some(1), None, false).unwrap_err();
        assert!(matches!(err, RewindError::NotFound(_)));
    }

    #[test]
    fn test_id_prefix_lookup() {
        let db = Database::open_in_memory().unwrap();
        let session = sample_session("deploy", 0);
        db.save_session(&session).unwrap();

        let ids = db.find_session_ids_by_prefix(&session.id[..8]).unwrap();
        assert_eq!(ids, vec![session.id.clone()]);
        assert!(db.find_session_ids_by_prefix("zzzz").unwrap().is_empty());
    }
}
