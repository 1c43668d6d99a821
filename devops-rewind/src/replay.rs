//! Replay timing and point-in-time session state.
//!
//! Nothing here waits or prints; [`crate::player`] does both.

use std::borrow::Borrow;
use std::time::Duration;

use crate::error::{Result, RewindError};
use crate::models::{Session, Step};

/// Longest pause ever inserted between two replayed steps, before speed scaling.
pub const MAX_STEP_DELAY: Duration = Duration::from_secs(10);

/// Speeds below this are treated as this.
pub const MIN_SPEED: f64 = 0.01;

/// Delay to wait before showing each step, one per step.
///
/// The first delay is always zero. Each later one is the gap between the
/// step's timestamp and the previous step's, clamped to
/// `[0, MAX_STEP_DELAY]` and divided by `max(speed, MIN_SPEED)`.
pub fn compute_delays<S: Borrow<Step>>(steps: &[S], speed: f64) -> Vec<Duration> {
    let divisor = speed.max(MIN_SPEED);
    let mut delays = Vec::with_capacity(steps.len());

    for (i, step) in steps.iter().enumerate() {
        if i == 0 {
            delays.push(Duration::ZERO);
            continue;
        }
        let prev = steps[i - 1].borrow().timestamp;
        let raw = step.borrow().timestamp - prev;
        let clamped = raw.to_std().unwrap_or(Duration::ZERO).min(MAX_STEP_DELAY);
        delays.push(clamped.div_f64(divisor));
    }

    delays
}

/// What the session looked like right after a given step ran.
#[derive(Debug, Clone)]
pub struct RewindState<'a> {
    pub step_number: usize,
    /// Steps numbered below the target, in order.
    pub prior_steps: Vec<&'a Step>,
    pub target: &'a Step,
    pub steps_executed: usize,
    /// Failed steps among `prior_steps`.
    pub prior_failures: usize,
    /// Working directory recorded on the target step.
    pub cwd: &'a str,
}

/// Reconstruct the state at `step`.
///
/// Fails with `NoSteps` for an empty session and `OutOfRange` for a position
/// outside `[0, total_steps - 1]`.
pub fn state_at_step(session: &Session, step: i64) -> Result<RewindState<'_>> {
    if session.total_steps() == 0 {
        return Err(RewindError::NoSteps(session.name.clone()));
    }

    let max = session.total_steps() - 1;
    let out_of_range = || RewindError::OutOfRange {
        session: session.name.clone(),
        requested: step,
        max,
    };

    let n = usize::try_from(step)
        .ok()
        .filter(|n| *n <= max)
        .ok_or_else(out_of_range)?;
    let target = session.get_step(n).ok_or_else(out_of_range)?;

    let prior_steps: Vec<&Step> = session.steps.iter().filter(|s| s.step_number < n).collect();
    let prior_failures = prior_steps.iter().filter(|s| s.failed()).count();

    Ok(RewindState {
        step_number: n,
        prior_steps,
        target,
        steps_executed: n + 1,
        prior_failures,
        cwd: &target.cwd,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
    }

    fn step(n: usize, exit_code: i32, timestamp: DateTime<Utc>) -> Step {
        Step {
            step_number: n,
            command: format!("cmd {n}"),
            output: String::new(),
            exit_code,
            timestamp,
            cwd: format!("/work/{n}"),
            env_snapshot: BTreeMap::new(),
        }
    }

    fn timed(seconds: &[i64]) -> Vec<Step> {
        seconds
            .iter()
            .enumerate()
            .map(|(n, s)| step(n, 0, at(*s)))
            .collect()
    }

    #[test]
    fn test_single_step_is_zero() {
        assert_eq!(compute_delays(&timed(&[0]), 1.0), vec![Duration::ZERO]);
        assert!(compute_delays::<Step>(&[], 1.0).is_empty());
    }

    #[test]
    fn test_delays_follow_timestamps() {
        let delays = compute_delays(&timed(&[0, 2, 5]), 1.0);
        assert_eq!(
            delays,
            vec![Duration::ZERO, Duration::from_secs(2), Duration::from_secs(3)]
        );
    }

    #[test]
    fn test_delays_are_clamped() {
        let delays = compute_delays(&timed(&[100, 40, 3600]), 1.0);
        assert_eq!(delays, vec![Duration::ZERO, Duration::ZERO, MAX_STEP_DELAY]);
    }

    #[test]
    fn test_speed_scales_delays() {
        let steps = timed(&[0, 1, 3, 4, 30]);
        let normal = compute_delays(&steps, 1.0);
        let double = compute_delays(&steps, 2.0);
        assert_eq!(normal.len(), steps.len());
        assert_eq!(double[0], Duration::ZERO);
        for (d1, d2) in normal.iter().zip(&double) {
            assert!(d2 <= d1);
        }
        assert_eq!(double[2], Duration::from_secs(1));
    }

    #[test]
    fn test_non_positive_speed_is_floored() {
        let steps = timed(&[0, 1]);
        let floor = compute_delays(&steps, MIN_SPEED);
        assert_eq!(compute_delays(&steps, 0.0), floor);
        assert_eq!(compute_delays(&steps, -3.0), floor);
        assert_eq!(floor[1], Duration::from_secs(100));
    }

    #[test]
    fn test_delays_accept_borrowed_steps() {
        let steps = timed(&[0, 4]);
        let refs: Vec<&Step> = steps.iter().collect();
        assert_eq!(compute_delays(&refs, 4.0)[1], Duration::from_secs(1));
    }

    fn five_step_session() -> Session {
        let mut session = Session::new("demo");
        for n in 0..5 {
            let exit_code = if n == 3 { 1 } else { 0 };
            session.add_step(step(n, exit_code, at(i64::try_from(n).unwrap())));
        }
        session
    }

    #[test]
    fn test_state_at_step() {
        let session = five_step_session();

        let state = state_at_step(&session, 2).unwrap();
        assert_eq!(state.steps_executed, 3);
        assert_eq!(state.prior_failures, 0);
        assert_eq!(state.prior_steps.len(), 2);
        assert_eq!(state.cwd, "/work/2");

        let state = state_at_step(&session, 4).unwrap();
        assert_eq!(state.steps_executed, 5);
        assert_eq!(state.prior_failures, 1);
        assert_eq!(state.target.command, "cmd 4");

        let first = state_at_step(&session, 0).unwrap();
        assert!(first.prior_steps.is_empty());
    }

    #[test]
    fn test_state_at_step_unavailable() {
        let session = five_step_session();
        for bad in [5, -1] {
            let err = state_at_step(&session, bad).unwrap_err();
            assert!(matches!(err, RewindError::OutOfRange { max: 4, .. }));
            assert!(err.is_unavailable());
        }

        let empty = Session::new("empty");
        let err = state_at_step(&empty, 0).unwrap_err();
        assert!(matches!(err, RewindError::NoSteps(_)));
        assert!(err.is_unavailable());
    }
}
