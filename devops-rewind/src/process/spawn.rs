//! Async process spawning with captured output and a timeout.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::warn;

/// A captured line from a running process.
#[derive(Debug, Clone)]
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// What to run and how.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Set on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Kill the process once this elapses.
    pub timeout: Option<Duration>,
}

impl ProcessOptions {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Result from a completed (or killed) process.
#[derive(Debug)]
pub struct ProcessResult {
    pub status: ExitStatus,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub timed_out: bool,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.status.success() && !self.timed_out
    }

    /// Exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Stdout followed by stderr, trailing newlines removed.
    pub fn combined_output(&self) -> String {
        let mut combined = self.stdout.join("\n");
        if !self.stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&self.stderr.join("\n"));
        }
        combined.trim_end_matches('\n').to_string()
    }
}

/// Spawn a process, collect its output, and wait for it to exit.
///
/// Stdin is closed. On timeout the child is killed and `timed_out` is set.
pub async fn spawn_process(options: ProcessOptions) -> Result<ProcessResult> {
    let mut cmd = Command::new(&options.program);
    cmd.args(&options.args)
        .envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &options.working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn process: {}", options.program))?;

    let (tx, mut rx) = mpsc::channel::<OutputLine>(1000);

    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(OutputLine::Stdout(line)).await.is_err() {
                    break;
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(OutputLine::Stderr(line)).await.is_err() {
                    break;
                }
            }
        });
    }

    // Channel closes once both readers finish.
    drop(tx);

    let mut stdout_lines = Vec::new();
    let mut stderr_lines = Vec::new();
    let mut timed_out = false;

    // The deadline covers both draining output and waiting for exit, so a
    // process that closes its pipes and keeps running is still killed.
    let run = async {
        while let Some(line) = rx.recv().await {
            match line {
                OutputLine::Stdout(line) => stdout_lines.push(line),
                OutputLine::Stderr(line) => stderr_lines.push(line),
            }
        }
        child.wait().await
    };

    let finished = match options.timeout {
        Some(limit) => timeout(limit, run).await.ok(),
        None => Some(run.await),
    };

    let status = match finished {
        Some(status) => status.context("Failed to wait for process to exit")?,
        None => {
            timed_out = true;
            warn!(program = %options.program, limit = ?options.timeout, "process timed out; killing");
            let _ = child.kill().await;
            while let Ok(line) = rx.try_recv() {
                match line {
                    OutputLine::Stdout(line) => stdout_lines.push(line),
                    OutputLine::Stderr(line) => stderr_lines.push(line),
                }
            }
            child
                .wait()
                .await
                .context("Failed to wait for process to exit")?
        }
    };

    Ok(ProcessResult {
        status,
        stdout: stdout_lines,
        stderr: stderr_lines,
        timed_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_echo() {
        let result = spawn_process(ProcessOptions::new("echo").arg("hello world"))
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.stdout, vec!["hello world"]);
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_with_env_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = spawn_process(
            ProcessOptions::new("sh")
                .arg("-c")
                .arg("echo $MY_VAR; pwd")
                .env("MY_VAR", "test_value")
                .working_dir(dir.path()),
        )
        .await
        .unwrap();

        assert_eq!(result.stdout[0], "test_value");
        let name = dir.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(result.stdout[1].ends_with(&name));
    }

    #[tokio::test]
    async fn test_combined_output_orders_stdout_first() {
        let result = spawn_process(
            ProcessOptions::new("sh")
                .arg("-c")
                .arg("echo err >&2; echo out; exit 3"),
        )
        .await
        .unwrap();

        assert!(!result.success());
        assert_eq!(result.code(), Some(3));
        assert_eq!(result.combined_output(), "out\nerr");
    }

    #[tokio::test]
    async fn test_spawn_nonexistent() {
        let result = spawn_process(ProcessOptions::new("nonexistent_command_12345")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_spawn_with_timeout() {
        let result = spawn_process(
            ProcessOptions::new("sleep")
                .arg("10")
                .timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert!(result.timed_out);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_timeout_covers_process_with_closed_pipes() {
        let started = std::time::Instant::now();
        let result = spawn_process(
            ProcessOptions::new("sh")
                .arg("-c")
                .arg("exec >/dev/null 2>&1; sleep 5")
                .timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap();

        assert!(result.timed_out);
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
