//! Session export and import.

use std::fmt::Write as _;

use crate::error::{Result, RewindError};
use crate::models::Session;

/// Pretty-printed JSON document of the whole session.
pub fn to_json(session: &Session) -> Result<String> {
    Ok(serde_json::to_string_pretty(session)?)
}

/// Parse a session previously written by [`to_json`].
///
/// Rejects documents whose branch fields disagree or whose steps are out of
/// order, so an import never stores a session the store would not produce.
pub fn from_json(json: &str) -> Result<Session> {
    let session: Session = serde_json::from_str(json)?;
    validate(&session)?;
    Ok(session)
}

fn validate(session: &Session) -> Result<()> {
    if session.id.is_empty() {
        return Err(RewindError::CorruptRecord("session has an empty id".to_string()));
    }
    if session.parent_id.is_some() != session.fork_step.is_some() {
        return Err(RewindError::CorruptRecord(format!(
            "session {}: parent_id and fork_step must be set together",
            session.id
        )));
    }
    if let Some(pair) = session
        .steps
        .windows(2)
        .find(|pair| pair[1].step_number < pair[0].step_number)
    {
        return Err(RewindError::CorruptRecord(format!(
            "session {}: step {} follows step {}",
            session.id, pair[1].step_number, pair[0].step_number
        )));
    }
    Ok(())
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// A bash script that re-runs every step in its recorded directory.
pub fn to_shell_script(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#!/usr/bin/env bash");
    let _ = writeln!(out, "# Session: {}", session.name);
    let _ = writeln!(out, "# Recorded: {}", session.created_at.to_rfc3339());
    let _ = writeln!(out, "# Steps: {}", session.total_steps());
    let _ = writeln!(out, "set -e");
    let _ = writeln!(out);

    for step in &session.steps {
        let _ = writeln!(out, "# Step {} - exit {}", step.step_number, step.exit_code);
        let _ = writeln!(out, "cd {}", shell_quote(&step.cwd));
        let _ = writeln!(out, "{}", step.command);
        let _ = writeln!(out);
    }
    out
}

/// A Markdown runbook with one section per step.
pub fn to_markdown(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Session: {}", session.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "- **ID**: `{}`", session.id);
    let _ = writeln!(
        out,
        "- **Recorded**: {}",
        session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "- **Steps**: {}", session.total_steps());
    let _ = writeln!(out);
    let _ = writeln!(out, "## Steps");
    let _ = writeln!(out);

    for step in &session.steps {
        let status = if step.succeeded() {
            "OK".to_string()
        } else {
            format!("FAILED (exit {})", step.exit_code)
        };
        let _ = writeln!(out, "### Step {} - {status}", step.step_number);
        let _ = writeln!(out, "**Directory**: `{}`", step.cwd);
        let _ = writeln!(out);
        let _ = writeln!(out, "```bash");
        let _ = writeln!(out, "$ {}", step.command);
        if !step.output.is_empty() {
            let _ = writeln!(out, "{}", step.output);
        }
        let _ = writeln!(out, "```");
        let _ = writeln!(out);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::Step;

    fn sample() -> Session {
        let mut s = Session::new("deploy");
        s.created_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let mut env = BTreeMap::new();
        env.insert("PWD".to_string(), "/srv".to_string());
        for (n, (command, output, exit_code)) in
            [("git pull", "Already up to date.", 0), ("make deploy", "", 2)]
                .into_iter()
                .enumerate()
        {
            s.add_step(Step {
                step_number: n,
                command: command.to_string(),
                output: output.to_string(),
                exit_code,
                timestamp: s.created_at,
                cwd: "/srv".to_string(),
                env_snapshot: env.clone(),
            });
        }
        s
    }

    #[test]
    fn test_json_round_trip() {
        let s = sample();
        let json = to_json(&s).unwrap();
        assert!(json.contains("\"step_number\": 1"));
        assert_eq!(from_json(&json).unwrap(), s);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(from_json("{\"name\": 3}").is_err());
    }

    #[test]
    fn test_from_json_rejects_fork_step_without_parent() {
        let json = to_json(&sample())
            .unwrap()
            .replace("\"fork_step\": null", "\"fork_step\": 3");
        assert!(json.contains("\"fork_step\": 3"));
        assert!(matches!(from_json(&json), Err(RewindError::CorruptRecord(_))));
    }

    #[test]
    fn test_from_json_rejects_parent_without_fork_step() {
        let mut s = sample();
        s.parent_id = Some("0190f0c4-0000-7000-8000-000000000000".to_string());
        let json = to_json(&s).unwrap();
        assert!(matches!(from_json(&json), Err(RewindError::CorruptRecord(_))));

        s.fork_step = Some(1);
        let json = to_json(&s).unwrap();
        assert_eq!(from_json(&json).unwrap(), s);
    }

    #[test]
    fn test_from_json_rejects_decreasing_step_numbers() {
        let mut s = sample();
        s.steps[0].step_number = 5;
        let json = to_json(&s).unwrap();
        let err = from_json(&json).unwrap_err();
        assert!(matches!(err, RewindError::CorruptRecord(_)));
        assert!(err.to_string().contains("step 1 follows step 5"));
    }

    #[test]
    fn test_shell_script() {
        let script = to_shell_script(&sample());
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "#!/usr/bin/env bash");
        assert_eq!(lines[1], "# Session: deploy");
        assert_eq!(lines[3], "# Steps: 2");
        assert_eq!(lines[4], "set -e");
        assert_eq!(&lines[6..9], &["# Step 0 - exit 0", "cd '/srv'", "git pull"]);
        assert!(script.contains("# Step 1 - exit 2\ncd '/srv'\nmake deploy\n"));
    }

    #[test]
    fn test_shell_script_quotes_directories() {
        let mut s = sample();
        s.steps[0].cwd = "/tmp/my dir/it's".to_string();
        s.steps[1].cwd = "/srv/$(reboot)".to_string();
        let script = to_shell_script(&s);
        assert!(script.contains("\ncd '/tmp/my dir/it'\\''s'\n"));
        assert!(script.contains("\ncd '/srv/$(reboot)'\n"));
    }

    #[test]
    fn test_markdown() {
        let md = to_markdown(&sample());
        assert!(md.starts_with("# Session: deploy\n"));
        assert!(md.contains("- **Recorded**: 2024-03-01 08:00:00 UTC"));
        assert!(md.contains("### Step 0 - OK\n"));
        assert!(md.contains("```bash\n$ git pull\nAlready up to date.\n```"));
        assert!(md.contains("### Step 1 - FAILED (exit 2)"));
        // No blank output line for a step without output.
        assert!(md.contains("$ make deploy\n```"));
    }
}
