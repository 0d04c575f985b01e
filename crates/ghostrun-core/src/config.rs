//! Configuration resolution for Ghostrun.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Config file (`--config` path, else `~/.config/ghostrun/config.toml`)
//! 3. Environment variables (`GHOSTRUN_*`)
//! 4. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete Ghostrun configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub executor: ExecutorConfig,
    pub commands: CommandsConfig,
    pub images: ImageConfig,
    pub notifications: NotificationConfig,
    pub docs: DocsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Idle interval between SSE keep-alive comments (seconds).
    pub keepalive_secs: u64,
    /// Allowed CORS origins. A leading or trailing `*` matches any suffix or
    /// prefix respectively.
    pub cors_origins: Vec<String>,
    /// Directory whose subdirectories are offered as projects. Defaults to
    /// the home directory.
    pub projects_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            keepalive_secs: 15,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                // Tailscale addresses
                "http://100.*".to_string(),
                "*.ts.net".to_string(),
            ],
            projects_dir: None,
        }
    }
}

impl ServerConfig {
    pub const fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    /// Resolved project base directory, `None` if there is no home directory.
    pub fn projects_dir(&self) -> Option<PathBuf> {
        self.projects_dir.clone().or_else(dirs::home_dir)
    }
}

/// Agent process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub claude_bin: PathBuf,
    /// Bounded lifetime of one execution (seconds).
    pub timeout_secs: u64,
    /// Pending events buffered between executor and relay.
    pub channel_capacity: usize,
    /// Longest stdout line accepted from the agent (bytes).
    pub max_line_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            claude_bin: PathBuf::from("claude"),
            timeout_secs: 60 * 60,
            channel_capacity: 100,
            max_line_bytes: 1024 * 1024,
        }
    }
}

impl ExecutorConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Slash commands callers may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub allowed: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            allowed: ["plan", "fullstack", "go", "nextjs"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Limits for images attached to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_count: usize,
    /// Largest decoded image (bytes).
    pub max_bytes: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_count: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_mime_types: ["image/jpeg", "image/png", "image/gif", "image/webp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Push notifications via ntfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Notifications are disabled when unset.
    pub ntfy_topic: Option<String>,
    pub ntfy_base_url: String,
    pub timeout_secs: u64,
    /// `terminal-notifier` binary for local desktop notifications
    /// (macOS). Disabled when unset.
    pub terminal_notifier: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ntfy_topic: None,
            ntfy_base_url: "https://ntfy.sh".to_string(),
            timeout_secs: 10,
            terminal_notifier: None,
        }
    }
}

impl NotificationConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Planning documents listed by `/api/files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Docs directory, relative to the project.
    pub dir: String,
    /// Folders under `dir` to scan, in response order.
    pub folders: Vec<String>,
    /// File extension listed, without the dot.
    pub extension: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            dir: "開発".to_string(),
            folders: ["実装/実装待ち", "実装/完了", "検討中", "資料"]
                .into_iter()
                .map(String::from)
                .collect(),
            extension: "md".to_string(),
        }
    }
}

impl Config {
    /// Reject values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.executor.timeout_secs == 0 {
            return Err(Error::Config("executor.timeout_secs must be positive".into()));
        }
        if self.executor.channel_capacity == 0 {
            return Err(Error::Config(
                "executor.channel_capacity must be positive".into(),
            ));
        }
        if self.executor.max_line_bytes == 0 {
            return Err(Error::Config("executor.max_line_bytes must be positive".into()));
        }
        if self.server.keepalive_secs == 0 {
            return Err(Error::Config("server.keepalive_secs must be positive".into()));
        }
        if self.commands.allowed.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::Config("commands.allowed contains an empty name".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit `path` must exist; the default location is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(explicit) => load_config_file(explicit)?,
        None => match global_config_path() {
            Some(global) if global.exists() => load_config_file(&global)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Default config file location.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ghostrun").join("config.toml"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `GHOSTRUN_*` overrides read through `lookup`. Unparseable numbers
/// are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("GHOSTRUN_BIND") {
        config.server.bind = val;
    }
    if let Some(val) = lookup("GHOSTRUN_PROJECTS_DIR") {
        config.server.projects_dir = (!val.is_empty()).then(|| PathBuf::from(val));
    }
    if let Some(n) = lookup("GHOSTRUN_KEEPALIVE_SECS").and_then(|v| v.parse().ok()) {
        config.server.keepalive_secs = n;
    }
    if let Some(val) = lookup("GHOSTRUN_CLAUDE_BIN") {
        config.executor.claude_bin = PathBuf::from(val);
    }
    if let Some(n) = lookup("GHOSTRUN_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.executor.timeout_secs = n;
    }
    if let Some(val) = lookup("GHOSTRUN_ALLOWED_COMMANDS") {
        config.commands.allowed = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(val) = lookup("GHOSTRUN_TERMINAL_NOTIFIER") {
        config.notifications.terminal_notifier = (!val.is_empty()).then(|| PathBuf::from(val));
    }
    if let Some(topic) = lookup("GHOSTRUN_NTFY_TOPIC").or_else(|| lookup("NTFY_TOPIC")) {
        config.notifications.ntfy_topic = (!topic.is_empty()).then_some(topic);
    }
}
