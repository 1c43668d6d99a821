//! Database query implementations.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, RewindError};
use crate::models::{Breakpoint, Session, Step};

/// Format a timestamp for storage. Fixed-width so that text ordering is time ordering.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a timestamp string flexibly from various formats.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    // Try RFC3339 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Common SQLite datetime format: "YYYY-MM-DD HH:MM:SS"
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    // With fractional seconds: "YYYY-MM-DD HH:MM:SS.SSS"
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    Err(RewindError::CorruptRecord(format!("invalid timestamp format: {s}")))
}

fn to_index(value: i64, column: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| RewindError::CorruptRecord(format!("negative {column}: {value}")))
}

fn from_index(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

const SESSION_COLUMNS: &str = "id, name, created_at, parent_id, fork_step";

/// Queries for the sessions table.
pub struct SessionQueries;

impl SessionQueries {
    /// Insert a session row, or update it in place if the id exists.
    ///
    /// Updating in place (rather than delete + insert) keeps the session's
    /// breakpoints from being cascade-deleted.
    pub fn upsert(conn: &Connection, session: &Session) -> Result<()> {
        conn.execute(
            r"INSERT INTO sessions (id, name, created_at, parent_id, fork_step)
              VALUES (?1, ?2, ?3, ?4, ?5)
              ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                created_at = excluded.created_at,
                parent_id = excluded.parent_id,
                fork_step = excluded.fork_step",
            params![
                session.id,
                session.name,
                format_timestamp(&session.created_at),
                session.parent_id,
                session.fork_step.map(from_index),
            ],
        )?;
        Ok(())
    }

    /// Get a session (without steps) by ID.
    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Session>> {
        let mut stmt = conn.prepare(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"))?;
        let result = stmt
            .query_row(params![id], |row| Ok(Self::row_to_session(row)))
            .optional()?;
        result.transpose()
    }

    /// Most recent session with the given name.
    pub fn get_latest_by_name(conn: &Connection, name: &str) -> Result<Option<Session>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE name = ?1 ORDER BY created_at DESC LIMIT 1"
        ))?;
        let result = stmt
            .query_row(params![name], |row| Ok(Self::row_to_session(row)))
            .optional()?;
        result.transpose()
    }

    /// List sessions (without steps), newest first.
    pub fn list(conn: &Connection, limit: Option<usize>) -> Result<Vec<Session>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, from_index);
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], |row| Ok(Self::row_to_session(row)))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row??);
        }
        Ok(sessions)
    }

    /// Ids beginning with `prefix`.
    pub fn ids_with_prefix(conn: &Connection, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT id FROM sessions WHERE substr(id, 1, length(?1)) = ?1")?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
        let found = conn
            .query_row("SELECT 1 FROM sessions WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Delete a session. Steps and breakpoints go with it via ON DELETE CASCADE.
    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let count = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    /// Convert a row to a Session with no steps loaded.
    fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session> {
        let created_at_str: String = row.get(2)?;
        let created_at = parse_timestamp(&created_at_str)?;

        let fork_step = row
            .get::<_, Option<i64>>(4)?
            .map(|n| to_index(n, "fork_step"))
            .transpose()?;

        Ok(Session {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at,
            steps: Vec::new(),
            parent_id: row.get(3)?,
            fork_step,
        })
    }
}

/// Queries for the steps table.
pub struct StepQueries;

impl StepQueries {
    /// Insert one step for a session.
    pub fn insert(conn: &Connection, session_id: &str, step: &Step) -> Result<()> {
        conn.execute(
            r"INSERT INTO steps (session_id, step_number, command, output, exit_code, timestamp, cwd, env_snapshot)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session_id,
                from_index(step.step_number),
                step.command,
                step.output,
                step.exit_code,
                format_timestamp(&step.timestamp),
                step.cwd,
                serde_json::to_string(&step.env_snapshot)?,
            ],
        )?;
        Ok(())
    }

    /// Remove every step belonging to a session.
    pub fn delete_for_session(conn: &Connection, session_id: &str) -> Result<usize> {
        let count = conn.execute("DELETE FROM steps WHERE session_id = ?1", params![session_id])?;
        Ok(count)
    }

    /// Steps for a session ordered by step number.
    pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<Step>> {
        let mut stmt = conn.prepare(
            r"SELECT step_number, command, output, exit_code, timestamp, cwd, env_snapshot
              FROM steps WHERE session_id = ?1 ORDER BY step_number ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| Ok(Self::row_to_step(row)))?;

        let mut steps = Vec::new();
        for row in rows {
            steps.push(row??);
        }
        Ok(steps)
    }

    /// Convert a row to a Step.
    fn row_to_step(row: &rusqlite::Row<'_>) -> Result<Step> {
        let timestamp_str: String = row.get(4)?;
        let env_json: String = row.get(6)?;
        let env_snapshot: BTreeMap<String, String> = serde_json::from_str(&env_json)?;

        Ok(Step {
            step_number: to_index(row.get(0)?, "step_number")?,
            command: row.get(1)?,
            output: row.get(2)?,
            exit_code: row.get(3)?,
            timestamp: parse_timestamp(&timestamp_str)?,
            cwd: row.get(5)?,
            env_snapshot,
        })
    }
}

/// Queries for the breakpoints table.
pub struct BreakpointQueries;

impl BreakpointQueries {
    /// Insert a new breakpoint (id is auto-generated).
    pub fn insert(
        conn: &Connection,
        session_id: &str,
        step_number: Option<usize>,
        pattern: Option<&str>,
        on_error: bool,
    ) -> Result<i64> {
        conn.execute(
            r"INSERT INTO breakpoints (session_id, step_number, pattern, on_error)
              VALUES (?1, ?2, ?3, ?4)",
            params![session_id, step_number.map(from_index), pattern, on_error],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Breakpoints for a session in insertion order.
    pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<Breakpoint>> {
        let mut stmt = conn.prepare(
            r"SELECT id, session_id, step_number, pattern, on_error
              FROM breakpoints WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| Ok(Self::row_to_breakpoint(row)))?;

        let mut breakpoints = Vec::new();
        for row in rows {
            breakpoints.push(row??);
        }
        Ok(breakpoints)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let count = conn.execute("DELETE FROM breakpoints WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    /// Convert a row to a Breakpoint.
    fn row_to_breakpoint(row: &rusqlite::Row<'_>) -> Result<Breakpoint> {
        let step_number = row
            .get::<_, Option<i64>>(2)?
            .map(|n| to_index(n, "step_number"))
            .transpose()?;

        Ok(Breakpoint {
            id: row.get(0)?,
            session_id: row.get(1)?,
            step_number,
            pattern: row.get(3)?,
            on_error: row.get(4)?,
        })
    }
}
