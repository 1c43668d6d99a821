//! Recording commands into a session.
//!
//! Each command is run through a [`CommandExecutor`], and the result is
//! appended as a [`Step`]. `cd` never reaches the executor: the recorder
//! tracks the working directory itself and runs every later command there.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::models::{Session, Step};
use crate::process::{spawn_process, ProcessOptions};
use crate::store::SessionStore;

/// Exit code recorded for a command that ran past its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Output and exit code of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub output: String,
    pub exit_code: i32,
}

/// Runs a single command line in a directory.
///
/// Never fails: problems running the command are reported as an
/// [`Execution`] with a non-zero exit code.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &str, cwd: &Path) -> Execution;
}

/// Executes commands with `<shell> -c <command>`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.shell.clone(), config.command_timeout())
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, command: &str, cwd: &Path) -> Execution {
        let options = ProcessOptions::new(&self.shell)
            .arg("-c")
            .arg(command)
            .working_dir(cwd)
            .timeout(self.timeout);

        match spawn_process(options).await {
            Ok(result) if result.timed_out => Execution {
                output: format!(
                    "[devops-rewind: command timed out after {}s]",
                    self.timeout.as_secs()
                ),
                exit_code: TIMEOUT_EXIT_CODE,
            },
            Ok(result) => Execution {
                output: result.combined_output(),
                // Killed by a signal.
                exit_code: result.code().unwrap_or(-1),
            },
            Err(e) => Execution {
                output: format!("[devops-rewind: error running command: {e:#}]"),
                exit_code: 1,
            },
        }
    }
}

/// Records commands into a session, one step per command.
pub struct SessionRecorder<'a, E, W> {
    session: Session,
    executor: E,
    store: Option<&'a dyn SessionStore>,
    cwd: PathBuf,
    env_allowlist: Vec<String>,
    out: W,
}

impl<'a, E, W> SessionRecorder<'a, E, W>
where
    E: CommandExecutor,
    W: Write,
{
    /// Create a recorder that appends to `session`.
    ///
    /// The working directory starts at the last recorded step's directory,
    /// so a freshly forked branch resumes where its fork step left off.
    /// An empty session starts in the process's current directory.
    pub fn new(session: Session, executor: E, out: W) -> Self {
        let cwd = session.steps.last().map_or_else(
            || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            |last| PathBuf::from(&last.cwd),
        );
        Self {
            session,
            executor,
            store: None,
            cwd,
            env_allowlist: crate::config::DEFAULT_ENV_ALLOWLIST
                .iter()
                .map(ToString::to_string)
                .collect(),
            out,
        }
    }

    /// Persist the session after every step.
    #[must_use]
    pub fn with_store(mut self, store: &'a dyn SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    #[must_use]
    pub fn with_env_allowlist(mut self, keys: Vec<String>) -> Self {
        self.env_allowlist = keys;
        self
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Run and record one command. Its step number is the current step count.
    pub async fn record_single(&mut self, command: &str) -> Result<Step> {
        let command = command.trim();
        let step_number = self.session.total_steps();
        let timestamp = Utc::now();
        let env_snapshot = self.capture_env();

        let execution = if is_cd(command) {
            self.change_dir(command)
        } else {
            self.executor.run(command, &self.cwd).await
        };

        if !execution.output.is_empty() {
            writeln!(self.out, "{}", execution.output)?;
        }
        if execution.exit_code != 0 {
            writeln!(self.out, "exit code: {}", execution.exit_code)?;
        }

        let step = Step {
            step_number,
            command: command.to_string(),
            output: execution.output,
            exit_code: execution.exit_code,
            timestamp,
            cwd: self.cwd.to_string_lossy().into_owned(),
            env_snapshot,
        };
        debug!(
            session_id = %self.session.id,
            step = step_number,
            exit_code = step.exit_code,
            "recorded step"
        );

        self.session.add_step(step.clone());
        self.persist()?;
        Ok(step)
    }

    /// Read commands from `input` until `exit`, `quit`, end of input or Ctrl-C.
    ///
    /// Blank lines are skipped. Returns the number of steps recorded.
    pub async fn record_interactive<R>(&mut self, mut input: R) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        writeln!(self.out, "Recording session: {}", self.session.name)?;
        writeln!(self.out, "Type commands normally. Type exit or press Ctrl-D to stop.")?;

        let start = self.session.total_steps();
        loop {
            write!(
                self.out,
                "[{}] {} $ ",
                self.session.total_steps(),
                self.cwd.display()
            )?;
            self.out.flush()?;

            let mut line = String::new();
            let read = tokio::select! {
                read = input.read_line(&mut line) => read?,
                _ = tokio::signal::ctrl_c() => {
                    writeln!(self.out, "\nInterrupted, stopping recording.")?;
                    break;
                }
            };
            if read == 0 {
                writeln!(self.out, "\nEOF received, stopping recording.")?;
                break;
            }

            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if command == "exit" || command == "quit" {
                writeln!(self.out, "Stopping recording.")?;
                break;
            }

            self.record_single(command).await?;
        }

        self.persist()?;
        let recorded = self.session.total_steps() - start;
        info!(session_id = %self.session.id, recorded, "recording finished");

        writeln!(self.out, "Session saved: {}", self.session.id)?;
        writeln!(self.out, "Name: {}", self.session.name)?;
        writeln!(self.out, "Total steps recorded: {}", self.session.total_steps())?;
        Ok(recorded)
    }

    fn persist(&self) -> Result<()> {
        if let Some(store) = self.store {
            store.save_session(&self.session)?;
        }
        Ok(())
    }

    fn capture_env(&self) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = self
            .env_allowlist
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.clone(), value)))
            .collect();
        env.insert("PWD".to_string(), self.cwd.to_string_lossy().into_owned());
        env
    }

    fn change_dir(&mut self, command: &str) -> Execution {
        let arg = command[2..].trim();
        let target = normalize(&self.cwd.join(expand_home(arg)));

        if target.is_dir() {
            self.cwd = target;
            Execution {
                output: String::new(),
                exit_code: 0,
            }
        } else {
            Execution {
                output: format!("cd: no such file or directory: {}", target.display()),
                exit_code: 1,
            }
        }
    }
}

/// `cd` alone or followed by whitespace and an argument.
fn is_cd(command: &str) -> bool {
    command
        .strip_prefix("cd")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

fn expand_home(arg: &str) -> PathBuf {
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    match arg {
        "" | "~" => home(),
        _ => arg
            .strip_prefix("~/")
            .map_or_else(|| PathBuf::from(arg), |rest| home().join(rest)),
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
