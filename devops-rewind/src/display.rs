//! Plain-text rendering of sessions, steps, diffs and breakpoints.
//!
//! Every function returns a `String`; callers decide where it goes.

use std::fmt::Write as _;

use crate::diff::DiffResult;
use crate::models::{Breakpoint, Session, Step};
use crate::replay::RewindState;

const RULE_WIDTH: usize = 78;

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Truncate to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    format!("{}...", text.chars().take(keep).collect::<String>())
}

fn format_duration(duration: chrono::Duration) -> String {
    #[allow(clippy::cast_precision_loss)]
    let secs = duration.num_milliseconds() as f64 / 1000.0;
    format!("{secs:.1}s")
}

/// A single step: header line, optional output, then timestamp and directory.
pub fn render_step(step: &Step, show_output: bool) -> String {
    let status = if step.succeeded() {
        "OK".to_string()
    } else {
        format!("ERR {}", step.exit_code)
    };

    let mut out = String::new();
    let _ = writeln!(out, "[Step {}] $ {}  ({status})", step.step_number, step.command);
    if show_output {
        if step.output.is_empty() {
            let _ = writeln!(out, "    (no output)");
        } else {
            for line in step.output.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
    }
    let _ = writeln!(
        out,
        "    @ {}  cwd: {}",
        step.timestamp.format("%H:%M:%S"),
        step.cwd
    );
    out
}

/// Summary block for a session.
pub fn render_session_info(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "ID:       {}", session.id);
    let _ = writeln!(out, "Name:     {}", session.name);
    let _ = writeln!(
        out,
        "Created:  {}",
        session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Steps:    {}", session.total_steps());
    if let Some(duration) = session.duration() {
        let _ = writeln!(out, "Duration: {}", format_duration(duration));
    }
    if let (Some(parent), Some(fork_step)) = (&session.parent_id, session.fork_step) {
        let _ = writeln!(out, "Branch of: {parent} (from step {fork_step})");
    }
    match session.failure_count() {
        0 => {
            let _ = writeln!(out, "All steps succeeded");
        }
        n => {
            let _ = writeln!(out, "Failures: {n} step(s)");
        }
    }
    let _ = writeln!(out, "{}", rule());
    out
}

/// Table of sessions, one row each.
pub fn render_sessions_table(sessions: &[Session]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<28} {:<17} {:>6} {:>9} {:>8} {:<6}",
        "ID", "NAME", "CREATED", "STEPS", "DURATION", "FAILURES", "BRANCH"
    );
    let _ = writeln!(out, "{}", rule());

    for s in sessions {
        let duration = s.duration().map_or_else(|| "-".to_string(), format_duration);
        let _ = writeln!(
            out,
            "{:<10} {:<28} {:<17} {:>6} {:>9} {:>8} {:<6}",
            s.short_id(),
            truncate(&s.name, 28),
            s.created_at.format("%Y-%m-%d %H:%M"),
            s.total_steps(),
            duration,
            s.failure_count(),
            if s.is_branch() { "yes" } else { "no" },
        );
    }
    out
}

/// Table of breakpoints.
pub fn render_breakpoints_table(breakpoints: &[Breakpoint]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>6} {:>6} {:<40} {:<8}", "ID", "STEP", "PATTERN", "ON ERROR");
    let _ = writeln!(out, "{}", "-".repeat(63));
    for bp in breakpoints {
        let _ = writeln!(
            out,
            "{:>6} {:>6} {:<40} {:<8}",
            bp.id,
            bp.step_number.map_or_else(|| "-".to_string(), |n| n.to_string()),
            truncate(bp.pattern.as_deref().unwrap_or("-"), 40),
            if bp.on_error { "yes" } else { "no" },
        );
    }
    out
}

/// Summary of the state produced by a rewind.
pub fn render_rewind_state(state: &RewindState<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "State at step {}", state.step_number);
    let _ = writeln!(out, "  Working directory: {}", state.cwd);
    let _ = writeln!(out, "  Steps executed:    {}", state.steps_executed);
    let _ = writeln!(out, "  Prior failures:    {}", state.prior_failures);
    out
}

/// Side-by-side view of a diff followed by its summary.
///
/// Markers: `=` identical, `~` changed, `<` only in A, `>` only in B.
pub fn render_diff(a: &Session, b: &Session, result: &DiffResult<'_>) -> String {
    const COL: usize = 34;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:>4}  {:<COL$}  {:<COL$}",
        "STEP",
        format!("A: {}", truncate(&a.name, COL - 3)),
        format!("B: {}", truncate(&b.name, COL - 3)),
    );
    let _ = writeln!(out, "{}", rule());

    for d in &result.diffs {
        let marker = if d.is_missing_a() {
            '>'
        } else if d.is_missing_b() {
            '<'
        } else if d.fully_identical() {
            '='
        } else {
            '~'
        };
        let cell = |step: Option<&Step>| {
            step.map_or_else(
                || "(missing)".to_string(),
                |s| truncate(&format!("{} [{}]", s.command, s.status_label()), COL),
            )
        };
        let _ = writeln!(
            out,
            "{marker} {:>4}  {:<COL$}  {:<COL$}",
            d.step_index,
            cell(d.step_a),
            cell(d.step_b),
        );
        if !d.outputs_match && d.commands_match {
            let _ = writeln!(out, "        output differs");
        }
    }

    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{}", result.summary());
    out
}

/// One line per session in a lineage chain, oldest first.
pub fn render_lineage(chain: &[Session]) -> String {
    let mut out = String::new();
    for (depth, s) in chain.iter().enumerate() {
        let indent = "  ".repeat(depth);
        let fork = s
            .fork_step
            .map_or_else(String::new, |n| format!(" (forked at step {n})"));
        let _ = writeln!(
            out,
            "{indent}{} {}  {} step(s){fork}",
            s.short_id(),
            s.name,
            s.total_steps()
        );
    }
    out
}
