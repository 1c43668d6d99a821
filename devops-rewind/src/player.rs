//! Terminal replay and rewind of recorded sessions.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::breakpoints;
use crate::display::{render_rewind_state, render_session_info, render_step};
use crate::error::Result;
use crate::models::{Breakpoint, Session};
use crate::replay::{compute_delays, state_at_step};

/// How a replay should run.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Playback multiplier; 2.0 plays twice as fast.
    pub speed: f64,
    /// Wait for Enter between steps instead of sleeping.
    pub step_mode: bool,
    pub from_step: usize,
    /// Last step to play, inclusive. Defaults to the final step.
    pub to_step: Option<usize>,
    pub breakpoints: Vec<Breakpoint>,
    /// Halt after the first step that hits a breakpoint.
    pub stop_on_breakpoint: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            step_mode: false,
            from_step: 0,
            to_step: None,
            breakpoints: Vec::new(),
            stop_on_breakpoint: false,
        }
    }
}

/// What a replay actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Number of steps shown.
    pub played: usize,
    /// Step number a breakpoint stopped the replay at.
    pub stopped_at: Option<usize>,
}

/// Replays sessions onto `out`, reading step-mode confirmations from `input`.
pub struct Player<W, R> {
    out: W,
    input: R,
}

impl<W, R> Player<W, R>
where
    W: Write,
    R: AsyncBufRead + Unpin,
{
    pub const fn new(out: W, input: R) -> Self {
        Self { out, input }
    }

    /// Give back the output handle.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Play the steps in `[from_step, to_step]` in order.
    pub async fn replay(&mut self, session: &Session, opts: &ReplayOptions) -> Result<ReplayOutcome> {
        let mut outcome = ReplayOutcome::default();

        if session.total_steps() == 0 {
            writeln!(self.out, "Session has no steps to replay.")?;
            return Ok(outcome);
        }

        let to = opts.to_step.unwrap_or(session.total_steps() - 1);
        let steps = session.get_range(opts.from_step, to);
        if steps.is_empty() {
            writeln!(self.out, "No steps in range [{}, {to}].", opts.from_step)?;
            return Ok(outcome);
        }

        write!(self.out, "{}", render_session_info(session))?;
        writeln!(
            self.out,
            "\nReplaying steps {}-{to} ({} steps, speed={}x)\n",
            opts.from_step,
            steps.len(),
            opts.speed
        )?;

        let delays = compute_delays(&steps, opts.speed);
        let last = steps.len() - 1;

        for (idx, (step, delay)) in steps.iter().zip(delays).enumerate() {
            if !opts.step_mode && !delay.is_zero() {
                self.out.flush()?;
                tokio::time::sleep(delay).await;
            }

            write!(self.out, "{}", render_step(step, true))?;
            outcome.played += 1;

            let hits = breakpoints::check(&opts.breakpoints, step);
            for bp in &hits {
                writeln!(self.out, "Breakpoint hit: {}", bp.describe())?;
            }
            if opts.stop_on_breakpoint && !hits.is_empty() {
                debug!(step = step.step_number, "replay stopped at breakpoint");
                outcome.stopped_at = Some(step.step_number);
                writeln!(self.out, "\nStopped at breakpoint on step {}.", step.step_number)?;
                return Ok(outcome);
            }

            if opts.step_mode && idx < last && !self.wait_for_enter().await? {
                writeln!(self.out)?;
                break;
            }
        }

        writeln!(self.out, "\nReplay complete.")?;
        Ok(outcome)
    }

    /// Show the session as it stood right after `step` ran.
    ///
    /// Returns `false` when that state does not exist.
    pub fn rewind(&mut self, session: &Session, step: i64) -> Result<bool> {
        let state = match state_at_step(session, step) {
            Ok(state) => state,
            Err(e) if e.is_unavailable() => {
                writeln!(self.out, "State at step {step} is not available: {e}")?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        write!(self.out, "{}", render_session_info(session))?;
        writeln!(
            self.out,
            "Rewound to step {}  (showing all steps 0-{})\n",
            state.step_number, state.step_number
        )?;
        for prior in &state.prior_steps {
            write!(self.out, "{}", render_step(prior, false))?;
        }
        writeln!(self.out, "\n>>> TARGET STEP <<<")?;
        write!(self.out, "{}", render_step(state.target, true))?;
        writeln!(self.out)?;
        write!(self.out, "{}", render_rewind_state(&state))?;
        Ok(true)
    }

    /// Print one step with its output. Returns `false` if there is no such step.
    pub fn show_step(&mut self, session: &Session, step_number: usize) -> Result<bool> {
        match session.get_step(step_number) {
            Some(step) => {
                write!(self.out, "{}", render_step(step, true))?;
                Ok(true)
            }
            None => {
                writeln!(self.out, "Step {step_number} not found in session.")?;
                Ok(false)
            }
        }
    }

    /// `false` on end of input.
    async fn wait_for_enter(&mut self) -> Result<bool> {
        write!(self.out, "  Press Enter for next step...")?;
        self.out.flush()?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).await?;
        Ok(read > 0)
    }
}
