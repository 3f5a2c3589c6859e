//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Creating temporary project directories
//! - Stub editor binaries that record their argv
//! - Writing queue files

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

use drover::config::{AgentConfig, HeadlessEnv};
use drover::display::DisplayProbe;

/// A display probe that reports an already-running display and never
/// touches the host.
pub struct NoopProbe;

impl DisplayProbe for NoopProbe {
    fn is_running(&self) -> bool {
        true
    }

    fn start(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A temporary project directory with a stub editor tool.
pub struct TestProject {
    /// Held only to keep the directory alive for the duration of the test.
    pub _temp_dir: TempDir,
    /// Path to the project root.
    pub path: PathBuf,
    /// Path to the stub editor binary.
    pub tool: PathBuf,
}

impl TestProject {
    /// Create a project whose stub tool exits with `exit_code` and records
    /// each invocation's argv, one line per run, to `invocations.txt`.
    pub fn new(exit_code: i32) -> Self {
        Self::with_script(&format!(
            "echo \"$@\" >> \"$RECORD\"\necho 'editor stderr output' >&2\nexit {}\n",
            exit_code
        ))
    }

    /// Create a project with a custom stub tool body. The body can use the
    /// `RECORD` variable, which expands to the invocation record file.
    pub fn with_script(body: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().to_path_buf();

        let record = path.join("invocations.txt");
        let tool = path.join("editor.sh");
        let script = format!("#!/bin/sh\nRECORD=\"{}\"\n{}", record.display(), body);
        std::fs::write(&tool, script).expect("Failed to write stub tool");
        let mut perms = std::fs::metadata(&tool)
            .expect("Failed to stat stub tool")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&tool, perms).expect("Failed to chmod stub tool");

        Self {
            _temp_dir: temp_dir,
            path,
            tool,
        }
    }

    /// Agent configuration pointing at this project, tuned for tests:
    /// zero sleep intervals and the stub tool as the editor binary.
    pub fn config(&self) -> AgentConfig {
        AgentConfig {
            project_path: self.path.clone(),
            tool_path: Some(self.tool.clone()),
            poll_interval_secs: 0,
            error_backoff_secs: 0,
            task_timeout_secs: None,
            headless: HeadlessEnv::default(),
        }
    }

    pub fn queue_path(&self) -> PathBuf {
        self.path.join("agent-tasks.json")
    }

    /// Write the queue file verbatim.
    pub fn write_queue(&self, json: &str) {
        std::fs::write(self.queue_path(), json).expect("Failed to write queue file");
    }

    /// Argv lines recorded by the stub tool, one per invocation.
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.path.join("invocations.txt"))
            .map(|s| s.lines().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn marker_exists(&self, name: &str) -> bool {
        self.path.join(name).exists()
    }
}

/// Convenience for asserting a flag/value pair appears in a recorded argv line.
pub fn has_flag_value(argv: &str, flag: &str, value: &str) -> bool {
    argv.contains(&format!("{} {}", flag, value))
}
