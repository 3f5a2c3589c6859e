use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{dlog_debug, Error, Result};

/// Name of the queue file external producers write into the project.
pub const QUEUE_FILE_NAME: &str = "agent-tasks.json";

/// Default poll interval between queue reads, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Backoff applied after an error escapes the poll/dispatch cycle.
pub const DEFAULT_ERROR_BACKOFF_SECS: u64 = 10;

/// Explicit headless environment applied to every editor subprocess.
///
/// The original design mutated process-wide environment variables at
/// startup; carrying them as data keeps the host process clean and lets
/// tests construct invocations without side effects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadlessEnv {
    /// X display the editor should render to (a virtual one in practice).
    #[serde(default = "default_display")]
    pub display: String,
}

fn default_display() -> String {
    ":99".to_string()
}

impl Default for HeadlessEnv {
    fn default() -> Self {
        Self {
            display: default_display(),
        }
    }
}

impl HeadlessEnv {
    /// The full variable set passed to each subprocess.
    pub fn vars(&self) -> Vec<(String, String)> {
        vec![
            ("DISPLAY".to_string(), self.display.clone()),
            ("UNITY_HEADLESS".to_string(), "1".to_string()),
            ("UNITY_BATCHMODE".to_string(), "1".to_string()),
            ("UNITY_QUIT".to_string(), "1".to_string()),
        ]
    }
}

/// Agent configuration, merged from `~/.drover/drover.toml` and CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Root of the project the editor operates on.
    pub project_path: PathBuf,
    /// Explicit editor binary path; discovered when absent.
    pub tool_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
    /// Per-task subprocess timeout; unlimited blocking when unset.
    pub task_timeout_secs: Option<u64>,
    #[serde(default)]
    pub headless: HeadlessEnv,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_error_backoff() -> u64 {
    DEFAULT_ERROR_BACKOFF_SECS
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            project_path: PathBuf::from("."),
            tool_path: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            error_backoff_secs: DEFAULT_ERROR_BACKOFF_SECS,
            task_timeout_secs: None,
            headless: HeadlessEnv::default(),
        }
    }
}

impl AgentConfig {
    pub fn drover_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".drover"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::drover_dir()?.join("drover.toml"))
    }

    /// Load the on-disk configuration, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        dlog_debug!("AgentConfig::load path={}", path.display());
        if !path.exists() {
            dlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        dlog_debug!(
            "Config loaded: project={}, tool={:?}, poll={}s",
            config.project_path.display(),
            config.tool_path,
            config.poll_interval_secs
        );
        Ok(config)
    }

    /// Path of the task queue file inside the project.
    pub fn queue_path(&self) -> PathBuf {
        self.project_path.join(QUEUE_FILE_NAME)
    }

    /// Directory that receives editor subprocess log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.project_path.join("Logs")
    }

    /// Directory that receives the agent's own log file.
    pub fn agent_logs_dir(&self) -> PathBuf {
        self.logs_dir().join("Agents")
    }

    pub fn with_project_path(mut self, path: &Path) -> Self {
        self.project_path = path.to_path_buf();
        self
    }
}
