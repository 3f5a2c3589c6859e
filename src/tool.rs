//! Editor tool invocation layer.
//!
//! `EditorTool` wraps the external editor executable: it resolves the binary
//! once at construction, builds a typed `Invocation` for each task kind, and
//! runs the subprocess to completion. Success is exactly "exit code zero";
//! a non-zero exit is terminal for the task and is surfaced through logging.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::process::Command;

use crate::config::{AgentConfig, HeadlessEnv};
use crate::task::{str_param, Task, TaskKind};
use crate::{dlog, dlog_debug, dlog_error, Error, Result};

/// Default build target when a build task omits `platform`.
pub const DEFAULT_BUILD_TARGET: &str = "Linux64";

/// Default build output directory (relative to the project) when a build
/// task omits `build_path`.
pub const DEFAULT_BUILD_DIR: &str = "Builds";

/// Per-process sequence folded into log/result stamps. Back-to-back runs of
/// the same kind can land in the same millisecond; the sequence keeps their
/// paths distinct.
static STAMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_stamp() -> String {
    let seq = STAMP_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{:04}", Utc::now().format("%Y%m%d-%H%M%S%.3f"), seq)
}

/// Well-known editor install locations checked after `$PATH`.
const TOOL_CANDIDATES: &[&str] = &[
    "/opt/Unity/Editor/Unity",
    "/Applications/Unity/Unity.app/Contents/MacOS/Unity",
    "/usr/bin/Unity",
    "/usr/local/bin/Unity",
];

/// Result of one editor subprocess run.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// True exactly when the subprocess exited with code zero.
    pub success: bool,
    /// Captured standard-error text.
    pub stderr: String,
    /// The editor log file this run wrote to.
    pub log_file: PathBuf,
    pub finished_at: DateTime<Utc>,
}

/// A fully-constructed editor command line, ready to run.
///
/// Built per task from the tool path, the fixed headless/batch flags, the
/// project path, and kind-specific flags. The headless environment rides
/// along as data instead of being set on the host process.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    log_file: PathBuf,
}

impl Invocation {
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Render the command line for logging.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        // Lets a timeout expiry terminate the subprocess instead of leaking it.
        cmd.kill_on_drop(true);
        cmd
    }
}

/// The external editor executable and the context shared by all invocations.
#[derive(Debug, Clone)]
pub struct EditorTool {
    binary: PathBuf,
    project_path: PathBuf,
    headless: HeadlessEnv,
    timeout: Option<Duration>,
}

impl EditorTool {
    /// Resolve the editor binary for the given configuration.
    ///
    /// Resolution order: explicit config path, then `which("Unity")`, then
    /// well-known install locations. Returns `ToolNotFound` when nothing
    /// matches; the agent treats that as degraded mode, not a fatal error.
    pub fn resolve(config: &AgentConfig) -> Result<Self> {
        let binary = match &config.tool_path {
            Some(path) => path.clone(),
            None => Self::discover().ok_or(Error::ToolNotFound)?,
        };
        dlog_debug!("Editor tool resolved: {}", binary.display());
        Ok(Self {
            binary,
            project_path: config.project_path.clone(),
            headless: config.headless.clone(),
            timeout: config.task_timeout_secs.map(Duration::from_secs),
        })
    }

    /// Construct a tool directly, bypassing discovery.
    pub fn new(binary: PathBuf, project_path: PathBuf, headless: HeadlessEnv) -> Self {
        Self {
            binary,
            project_path,
            headless,
            timeout: None,
        }
    }

    /// Set a per-task timeout; expiry forcibly terminates the subprocess.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn discover() -> Option<PathBuf> {
        if let Ok(path) = which::which("Unity") {
            return Some(path);
        }
        TOOL_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    fn logs_dir(&self) -> PathBuf {
        self.project_path.join("Logs")
    }

    /// Log-file path for one run of `kind`; the timestamp-plus-sequence
    /// stamp keeps repeated runs of the same kind from colliding.
    fn stamped_log_file(&self, kind: &TaskKind) -> PathBuf {
        self.logs_dir()
            .join(format!("{}-{}.log", kind, next_stamp()))
    }

    /// Build the command line for a task.
    ///
    /// Exhaustive over `TaskKind`; `Unknown` never reaches here because the
    /// dispatcher drops it first, so it is a validation error.
    pub fn invocation(&self, task: &Task) -> Result<Invocation> {
        let log_file = self.stamped_log_file(&task.kind);
        let project = self.project_path.display().to_string();

        let mut args = vec![
            "-batchmode".to_string(),
            "-quit".to_string(),
            "-projectPath".to_string(),
            project,
        ];

        match &task.kind {
            TaskKind::Build => {
                let platform =
                    str_param(&task.params, "platform").unwrap_or(DEFAULT_BUILD_TARGET);
                let build_dir =
                    str_param(&task.params, "build_path").unwrap_or(DEFAULT_BUILD_DIR);
                args.push("-buildTarget".to_string());
                args.push(platform.to_string());
                args.push("-buildPath".to_string());
                args.push(self.project_path.join(build_dir).display().to_string());
            }
            TaskKind::Test => {
                let results = self
                    .logs_dir()
                    .join(format!("test-results-{}.xml", next_stamp()));
                args.push("-runTests".to_string());
                args.push("-testResults".to_string());
                args.push(results.display().to_string());
            }
            TaskKind::Compile => {}
            TaskKind::Import => {
                let asset = str_param(&task.params, "asset_path").unwrap_or("");
                args.push("-importPackage".to_string());
                args.push(asset.to_string());
            }
            TaskKind::Unknown(raw) => {
                return Err(Error::Validation(format!(
                    "no executor for task kind '{}'",
                    raw
                )));
            }
        }

        args.push("-logFile".to_string());
        args.push(log_file.display().to_string());

        // Optional flags go after the fixed set.
        if task.kind == TaskKind::Test {
            if let Some(filter) = str_param(&task.params, "filter") {
                if !filter.is_empty() {
                    args.push("-testFilter".to_string());
                    args.push(filter.to_string());
                }
            }
        }

        Ok(Invocation {
            program: self.binary.clone(),
            args,
            env: self.headless.vars(),
            log_file,
        })
    }

    /// Execute one task to completion and classify the outcome.
    ///
    /// Blocks the control loop for the duration of the subprocess. With a
    /// timeout configured, expiry kills the subprocess and reports
    /// `Error::Timeout`; without one this blocks indefinitely.
    pub async fn run(&self, task: &Task) -> Result<ExecOutcome> {
        let invocation = self.invocation(task)?;
        std::fs::create_dir_all(self.logs_dir())?;

        dlog!("Executing {} task: {}", task.kind, invocation.display_line());

        let mut cmd = invocation.command();
        let output = match self.timeout {
            Some(duration) => tokio::time::timeout(duration, cmd.output())
                .await
                .map_err(|_| Error::Timeout(duration))??,
            None => cmd.output().await?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let outcome = ExecOutcome {
            success: output.status.success(),
            stderr,
            log_file: invocation.log_file().to_path_buf(),
            finished_at: Utc::now(),
        };

        if outcome.success {
            dlog!("{} task completed successfully", task.kind);
        } else {
            dlog_error!("{} task failed: {}", task.kind, outcome.stderr);
        }

        Ok(outcome)
    }
}
