//! Configuration for devops-rewind.
//!
//! Settings come from three layers, later ones winning:
//! - built-in defaults
//! - `~/.devops-rewind/config.toml` (optional)
//! - `DEVOPS_REWIND_DB` / `DEVOPS_REWIND_SHELL` environment variables
//!
//! The CLI applies its own flags on top of the result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, RewindError};

/// Name of the per-user data directory under `$HOME`.
pub const APP_DIR: &str = ".devops-rewind";

/// Config filename inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Database filename inside the data directory.
pub const DB_FILE: &str = "sessions.db";

/// Recorded commands are killed after this many seconds by default.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Environment variables captured into every step.
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "PWD", "SHELL", "USER", "LANG"];

const ENV_DB: &str = "DEVOPS_REWIND_DB";
const ENV_SHELL: &str = "DEVOPS_REWIND_SHELL";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the SQLite session database.
    pub db_path: PathBuf,
    /// Shell used to run recorded commands.
    pub shell: String,
    /// Per-command timeout while recording.
    pub command_timeout_secs: u64,
    /// Environment variable names captured into each step.
    pub env_allowlist: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: app_dir().join(DB_FILE),
            shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string()),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Config {
    /// Load the user config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = app_dir().join(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|source| RewindError::Config {
                path: path.display().to_string(),
                source,
            })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Parse config from TOML text; missing keys take their defaults.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `DEVOPS_REWIND_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB).filter(|v| !v.is_empty()) {
            self.db_path = PathBuf::from(db);
        }
        if let Some(shell) = lookup(ENV_SHELL).filter(|v| !v.is_empty()) {
            self.shell = shell;
        }
    }

    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// The per-user data directory, `~/.devops-rewind`.
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.command_timeout(), Duration::from_secs(300));
        assert!(config.db_path.ends_with("sessions.db"));
        assert!(config.env_allowlist.contains(&"PATH".to_string()));
        assert!(!config.env_allowlist.contains(&"AWS_SECRET_ACCESS_KEY".to_string()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("command_timeout_secs = 5\nshell = \"/bin/zsh\"\n").unwrap();
        assert_eq!(config.command_timeout_secs, 5);
        assert_eq!(config.shell, "/bin/zsh");
        assert_eq!(config.env_allowlist, Config::default().env_allowlist);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(Config::from_toml("command_timeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "env_allowlist = [\"HOME\"]\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.env_allowlist, vec!["HOME".to_string()]);
    }

    #[test]
    fn test_from_file_reports_invalid_toml_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "shell = [unterminated\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, RewindError::Config { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "DEVOPS_REWIND_DB" => Some("/tmp/other.db".to_string()),
            "DEVOPS_REWIND_SHELL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.shell, Config::default().shell);
    }
}
