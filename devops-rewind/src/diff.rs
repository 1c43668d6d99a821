//! Position-by-position comparison of two sessions.

use crate::models::{Session, Step};

/// Comparison of the steps at one position.
#[derive(Debug, Clone)]
pub struct StepDiff<'a> {
    pub step_index: usize,
    pub step_a: Option<&'a Step>,
    pub step_b: Option<&'a Step>,
    pub commands_match: bool,
    pub outputs_match: bool,
    pub exit_codes_match: bool,
}

impl StepDiff<'_> {
    pub const fn fully_identical(&self) -> bool {
        self.commands_match && self.outputs_match && self.exit_codes_match
    }

    /// Present in B but not in A.
    pub const fn is_missing_a(&self) -> bool {
        self.step_a.is_none()
    }

    /// Present in A but not in B.
    pub const fn is_missing_b(&self) -> bool {
        self.step_b.is_none()
    }
}

/// Full comparison of two sessions over a range of positions.
#[derive(Debug, Clone)]
pub struct DiffResult<'a> {
    pub session_a_id: String,
    pub session_b_id: String,
    pub diffs: Vec<StepDiff<'a>>,
    /// First position whose commands differ.
    pub diverge_point: Option<usize>,
}

impl DiffResult<'_> {
    /// True when every compared position is fully identical (vacuously for none).
    pub fn are_identical(&self) -> bool {
        self.diffs.iter().all(StepDiff::fully_identical)
    }

    pub fn changed_steps(&self) -> Vec<&StepDiff<'_>> {
        self.diffs.iter().filter(|d| !d.fully_identical()).collect()
    }

    pub fn only_in_a(&self) -> usize {
        self.diffs.iter().filter(|d| d.is_missing_b()).count()
    }

    pub fn only_in_b(&self) -> usize {
        self.diffs.iter().filter(|d| d.is_missing_a()).count()
    }

    /// Short human-readable summary.
    pub fn summary(&self) -> String {
        if self.are_identical() {
            return "Sessions are identical in the compared range.".to_string();
        }

        let mut parts = Vec::new();
        if let Some(point) = self.diverge_point {
            parts.push(format!("Sessions diverge at step {point}."));
        }
        parts.push(format!("{} step(s) differ.", self.changed_steps().len()));

        let only_a = self.only_in_a();
        if only_a > 0 {
            parts.push(format!("{only_a} step(s) only in session A."));
        }
        let only_b = self.only_in_b();
        if only_b > 0 {
            parts.push(format!("{only_b} step(s) only in session B."));
        }

        parts.join("  ")
    }
}

/// Compare `a` and `b` from position `from_step` to the end of the longer one.
///
/// Only command equality decides the divergence point; a position with the
/// same command but different output or exit code is "changed" without
/// being a divergence.
pub fn diff_sessions<'a>(a: &'a Session, b: &'a Session, from_step: usize) -> DiffResult<'a> {
    let end = a.total_steps().max(b.total_steps());
    let mut diffs = Vec::new();
    let mut diverge_point = None;

    for i in from_step..end {
        let step_a = a.get_step(i);
        let step_b = b.get_step(i);

        let (commands_match, outputs_match, exit_codes_match) = match (step_a, step_b) {
            (None, None) => continue,
            (Some(x), Some(y)) => (
                x.command == y.command,
                x.output == y.output,
                x.exit_code == y.exit_code,
            ),
            _ => (false, false, false),
        };

        if diverge_point.is_none() && !commands_match {
            diverge_point = Some(i);
        }

        diffs.push(StepDiff {
            step_index: i,
            step_a,
            step_b,
            commands_match,
            outputs_match,
            exit_codes_match,
        });
    }

    DiffResult {
        session_a_id: a.id.clone(),
        session_b_id: b.id.clone(),
        diffs,
        diverge_point,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;

    fn session(commands: &[(&str, &str, i32)]) -> Session {
        let mut s = Session::new("s");
        for (n, (command, output, exit_code)) in commands.iter().enumerate() {
            s.add_step(Step {
                step_number: n,
                command: (*command).to_string(),
                output: (*output).to_string(),
                exit_code: *exit_code,
                timestamp: Utc::now(),
                cwd: "/tmp".to_string(),
                env_snapshot: BTreeMap::new(),
            });
        }
        s
    }

    const BASE: &[(&str, &str, i32)] = &[
        ("git pull", "Already up to date.", 0),
        ("make build", "ok", 0),
        ("make test", "ok", 0),
        ("make deploy", "done", 0),
    ];

    #[test]
    fn test_identical_sessions() {
        let a = session(BASE);
        let b = session(BASE);
        let result = diff_sessions(&a, &b, 0);
        assert!(result.are_identical());
        assert_eq!(result.diverge_point, None);
        assert_eq!(result.diffs.len(), 4);
        assert_eq!(result.summary(), "Sessions are identical in the compared range.");
    }

    #[test]
    fn test_divergence_at_single_position() {
        for i in 0..BASE.len() {
            let mut changed = BASE.to_vec();
            changed[i].0 = "something else";
            let a = session(BASE);
            let b = session(&changed);
            let result = diff_sessions(&a, &b, 0);
            assert_eq!(result.diverge_point, Some(i));
            assert_eq!(result.changed_steps().len(), 1);
        }
    }

    #[test]
    fn test_output_change_is_not_divergence() {
        let mut changed = BASE.to_vec();
        changed[2] = ("make test", "1 failed", 2);
        let a = session(BASE);
        let b = session(&changed);

        let result = diff_sessions(&a, &b, 0);
        assert_eq!(result.diverge_point, None);
        assert!(!result.are_identical());
        let d = &result.changed_steps()[0];
        assert_eq!(d.step_index, 2);
        assert!(d.commands_match);
        assert!(!d.outputs_match);
        assert!(!d.exit_codes_match);
    }

    #[test]
    fn test_unequal_lengths() {
        let a = session(BASE);
        let b = session(&BASE[..1]);

        let result = diff_sessions(&a, &b, 0);
        assert_eq!(result.only_in_a(), 3);
        assert_eq!(result.only_in_b(), 0);
        assert_eq!(result.diverge_point, Some(1));

        let reversed = diff_sessions(&b, &a, 0);
        assert_eq!(reversed.only_in_b(), 3);
        assert_eq!(
            reversed.summary(),
            "Sessions diverge at step 1.  3 step(s) differ.  3 step(s) only in session B."
        );
    }

    #[test]
    fn test_from_step_skips_earlier_positions() {
        let mut changed = BASE.to_vec();
        changed[0].0 = "git fetch";
        let a = session(BASE);
        let b = session(&changed);

        let result = diff_sessions(&a, &b, 1);
        assert!(result.are_identical());
        assert_eq!(result.diffs.first().map(|d| d.step_index), Some(1));
    }

    #[test]
    fn test_empty_sessions_are_identical() {
        let a = session(&[]);
        let b = session(&[]);
        let result = diff_sessions(&a, &b, 0);
        assert!(result.diffs.is_empty());
        assert!(result.are_identical());
        assert_eq!(result.diverge_point, None);
    }

    #[test]
    fn test_positions_missing_on_both_sides_are_skipped() {
        let mut a = session(BASE);
        let mut b = session(BASE);
        a.steps.remove(1);
        b.steps.remove(1);
        // Step numbers need not be contiguous; a gap in both is not emitted.
        let result = diff_sessions(&a, &b, 0);
        assert!(result.diffs.iter().all(|d| d.step_index != 1));
    }
}
