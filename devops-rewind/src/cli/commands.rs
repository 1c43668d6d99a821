//! CLI command execution.
//!
//! Each command opens the session database, resolves its session arguments
//! and hands off to the library. Everything user-facing goes to stdout.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::json;
use tokio::io::BufReader;

use crate::branch::{fork, lineage};
use crate::breakpoints::BreakpointManager;
use crate::config::Config;
use crate::db::Database;
use crate::diff::diff_sessions;
use crate::display::{
    render_breakpoints_table, render_diff, render_lineage, render_sessions_table,
};
use crate::export;
use crate::models::Session;
use crate::player::{Player, ReplayOptions};
use crate::recorder::{SessionRecorder, ShellExecutor};
use crate::session::resolve_session;
use crate::store::SessionStore;

use super::args::{BreakpointCommands, Cli, Commands, ExportFormat, ListFormat};

/// Run a parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    if matches!(cli.command, Commands::Version) {
        println!("devops-rewind v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let db = Database::open_at(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    match cli.command {
        Commands::Record { name, shell } => {
            let name = name.unwrap_or_else(|| Utc::now().format("session-%Y%m%d-%H%M%S").to_string());
            if let Some(shell) = shell {
                config.shell = shell;
            }
            record(&db, &config, Session::new(name)).await
        }
        Commands::List { limit, format } => list_sessions(&db, limit, format),
        Commands::Show { session, step } => show_step(&db, &session, step),
        Commands::Replay {
            session,
            speed,
            step_mode,
            from_step,
            to_step,
            stop_on_breakpoint,
        } => {
            let session = resolve(&db, &session)?;
            let opts = ReplayOptions {
                speed,
                step_mode,
                from_step,
                to_step,
                breakpoints: db.list_breakpoints(&session.id)?,
                stop_on_breakpoint,
            };
            let mut player = Player::new(io::stdout(), BufReader::new(tokio::io::stdin()));
            player.replay(&session, &opts).await?;
            Ok(())
        }
        Commands::Rewind {
            session,
            step,
            re_exec,
        } => rewind(&db, &config, &session, step, re_exec).await,
        Commands::Branch {
            session,
            step,
            name,
            re_exec,
        } => branch(&db, &config, &session, step, name.as_deref(), re_exec).await,
        Commands::Lineage { session } => {
            let session = resolve(&db, &session)?;
            print!("{}", render_lineage(&lineage(&session, &db)?));
            Ok(())
        }
        Commands::Diff {
            session_a,
            session_b,
            from_step,
        } => {
            let a = resolve(&db, &session_a)?;
            let b = resolve(&db, &session_b)?;
            let result = diff_sessions(&a, &b, from_step);
            print!("{}", render_diff(&a, &b, &result));
            Ok(())
        }
        Commands::Breakpoint(cmd) => breakpoint(&db, cmd),
        Commands::Delete { session, yes } => delete_session(&db, &session, yes),
        Commands::Export { session, format } => {
            let session = resolve(&db, &session)?;
            let text = match format {
                ExportFormat::Json => export::to_json(&session)?,
                ExportFormat::Sh => export::to_shell_script(&session),
                ExportFormat::Markdown => export::to_markdown(&session),
            };
            println!("{}", text.trim_end());
            Ok(())
        }
        Commands::Import { file } => import_session(&db, &file),
        Commands::Version => Ok(()),
    }
}

fn resolve(db: &Database, key: &str) -> Result<Session> {
    resolve_session(db, key).with_context(|| format!("Could not resolve session '{key}'"))
}

/// Record into `session` until the user stops, persisting every step.
async fn record(db: &Database, config: &Config, session: Session) -> Result<()> {
    let executor = ShellExecutor::from_config(config);
    println!("Shell: {}", executor.shell());

    let mut recorder = SessionRecorder::new(session, executor, io::stdout())
        .with_store(db)
        .with_env_allowlist(config.env_allowlist.clone());
    recorder
        .record_interactive(BufReader::new(tokio::io::stdin()))
        .await
        .context("Recording failed")?;
    Ok(())
}

fn list_sessions(db: &Database, limit: usize, format: ListFormat) -> Result<()> {
    let sessions = db.list_sessions(Some(limit))?;

    match format {
        ListFormat::Json => {
            let rows: Vec<_> = sessions
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "name": s.name,
                        "created_at": s.created_at.to_rfc3339(),
                        "total_steps": s.total_steps(),
                        "failures": s.failure_count(),
                        "parent_id": s.parent_id,
                        "fork_step": s.fork_step,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        ListFormat::Table => {
            if sessions.is_empty() {
                println!("No sessions recorded yet. Start one with: devops-rewind record");
            } else {
                print!("{}", render_sessions_table(&sessions));
            }
        }
    }
    Ok(())
}

fn show_step(db: &Database, key: &str, step: usize) -> Result<()> {
    let session = resolve(db, key)?;
    if session.get_step(step).is_none() {
        bail!(
            "Step {step} not found in session '{}' ({} steps)",
            session.name,
            session.total_steps()
        );
    }
    let mut player = Player::new(io::stdout(), tokio::io::empty());
    player.show_step(&session, step)?;
    Ok(())
}

async fn rewind(db: &Database, config: &Config, key: &str, step: i64, re_exec: bool) -> Result<()> {
    let session = resolve(db, key)?;
    let mut player = Player::new(io::stdout(), tokio::io::empty());
    if !player.rewind(&session, step)? {
        return Ok(());
    }

    if re_exec {
        println!("\nBranching from step {step} into a new recording session...");
        let branched = fork(&session, step, None, Some(db))?;
        println!("Branch: {} ({})", branched.name, branched.id);
        record(db, config, branched).await?;
    }
    Ok(())
}

async fn branch(
    db: &Database,
    config: &Config,
    key: &str,
    step: i64,
    name: Option<&str>,
    re_exec: bool,
) -> Result<()> {
    let session = resolve(db, key)?;
    let branched = fork(&session, step, name, Some(db))?;

    println!("Branch created: {}", branched.id);
    println!("Name: {}", branched.name);
    println!("Forked from: {} at step {step}", session.name);
    println!("History steps copied: {}", branched.total_steps());

    if re_exec {
        println!("\nStarting recording in the new branch...");
        record(db, config, branched).await?;
    }
    Ok(())
}

fn breakpoint(db: &Database, cmd: BreakpointCommands) -> Result<()> {
    match cmd {
        BreakpointCommands::Add {
            session,
            step,
            pattern,
            on_error,
        } => {
            let session = resolve(db, &session)?;
            let bp = BreakpointManager::new(&session.id, db).add(step, pattern.as_deref(), on_error)?;
            println!("Breakpoint added: {}", bp.describe());
        }
        BreakpointCommands::List { session } => {
            let session = resolve(db, &session)?;
            let bps = BreakpointManager::new(&session.id, db).list()?;
            if bps.is_empty() {
                println!("No breakpoints set for session '{}'.", session.name);
            } else {
                print!("{}", render_breakpoints_table(&bps));
            }
        }
        BreakpointCommands::Remove { session, id } => {
            let session = resolve(db, &session)?;
            if !BreakpointManager::new(&session.id, db).remove(id)? {
                bail!("Breakpoint #{id} not found in session '{}'", session.name);
            }
            println!("Breakpoint #{id} removed.");
        }
    }
    Ok(())
}

fn delete_session(db: &Database, key: &str, yes: bool) -> Result<()> {
    let session = resolve(db, key)?;

    if !yes && !confirm(&format!("Delete session '{}' ({})?", session.name, session.short_id()))? {
        println!("Aborted.");
        return Ok(());
    }

    if !db.delete_session(&session.id)? {
        bail!("Failed to delete session '{}'", session.name);
    }
    println!("Session '{}' ({}) deleted.", session.name, session.short_id());
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn import_session(db: &Database, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let session = export::from_json(&content)
        .with_context(|| format!("Invalid session file {}", file.display()))?;

    if db.session_exists(&session.id)? {
        bail!("Session {} already exists", session.id);
    }
    db.save_session(&session)?;
    println!(
        "Imported session '{}' ({}) with {} steps.",
        session.name,
        session.id,
        session.total_steps()
    );
    Ok(())
}
