//! The background agent: lifecycle, admission, and dispatch.
//!
//! A single logical thread of control runs poll -> merge -> dispatch ->
//! sleep until a termination signal requests a stop. Signal handlers only
//! flip a shared flag; the loop observes it at cycle boundaries, so an
//! in-flight subprocess always runs to completion before the agent stops.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AgentConfig;
use crate::display::{self, DisplayProbe};
use crate::queue::TaskQueue;
use crate::task::{Fingerprint, Task, TaskKind};
use crate::tool::EditorTool;
use crate::{dlog, dlog_error, dlog_warn, Error, Result};

/// Agent lifecycle state. Transitions are monotonic:
/// starting -> running -> stopping -> stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Starting => write!(f, "starting"),
            RunState::Running => write!(f, "running"),
            RunState::Stopping => write!(f, "stopping"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Read-only snapshot of the agent, side-effect free.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub agent_id: String,
    pub run_state: RunState,
    pub pending_count: usize,
    pub tool_path: Option<PathBuf>,
    pub project_path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// The orchestration process itself.
pub struct Agent {
    id: String,
    run_state: RunState,
    pending: VecDeque<Task>,
    /// Fingerprints of every task consumed this run. Keeps an unchanged
    /// queue file from re-admitting finished work.
    executed: HashSet<Fingerprint>,
    config: AgentConfig,
    queue: TaskQueue,
    tool: Option<EditorTool>,
}

impl Agent {
    /// Construct an agent for the given configuration.
    ///
    /// The editor binary is resolved once here. An absent binary degrades
    /// the agent rather than failing it: tasks are still admitted and then
    /// fail fast at dispatch.
    pub fn new(config: AgentConfig) -> Self {
        let id = Self::instance_id();
        let queue = TaskQueue::new(&config.queue_path());
        let tool = match EditorTool::resolve(&config) {
            Ok(tool) => Some(tool),
            Err(_) => {
                dlog_warn!("Editor tool not found; tasks will fail until one is configured");
                None
            }
        };
        Self {
            id,
            run_state: RunState::Starting,
            pending: VecDeque::new(),
            executed: HashSet::new(),
            config,
            queue,
            tool,
        }
    }

    /// Identifier for the agent running in this process, stable per run.
    pub fn instance_id() -> String {
        format!("drover-{}", std::process::id())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current state of the agent as a read-only snapshot.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            agent_id: self.id.clone(),
            run_state: self.run_state,
            pending_count: self.pending.len(),
            tool_path: self.tool.as_ref().map(|t| t.binary().to_path_buf()),
            project_path: self.config.project_path.clone(),
            timestamp: Utc::now(),
        }
    }

    fn transition(&mut self, to: RunState) -> Result<()> {
        if to <= self.run_state {
            return Err(Error::InvalidStateTransition {
                from: self.run_state.to_string(),
                to: to.to_string(),
            });
        }
        self.run_state = to;
        Ok(())
    }

    /// Poll the queue and admit every descriptor not already known.
    ///
    /// Structural duplicates of pending or already-executed tasks are
    /// silently skipped, so re-reading an unchanged queue admits nothing.
    /// Returns the number of tasks admitted; a queue read failure
    /// propagates so the run loop can back off.
    pub fn merge_new_tasks(&mut self) -> Result<usize> {
        let mut admitted = 0;
        for descriptor in self.queue.poll()? {
            let fingerprint = descriptor.fingerprint();
            if self.executed.contains(&fingerprint) {
                continue;
            }
            if self.pending.iter().any(|t| t.fingerprint() == fingerprint) {
                continue;
            }
            dlog!("New task admitted: {}", descriptor.kind);
            self.pending.push_back(Task::admit(descriptor, &self.id));
            admitted += 1;
        }
        Ok(admitted)
    }

    /// Execute every pending task, one at a time, in admission order.
    ///
    /// Iterates a snapshot of the pending list so removal during execution
    /// can neither skip nor re-process an entry. Every task is removed from
    /// pending when its turn ends, whether it succeeded, failed, or raised;
    /// failure is terminal and surfaces only through the log.
    pub async fn dispatch_pending(&mut self) {
        let batch: Vec<Task> = self.pending.iter().cloned().collect();
        for task in batch {
            let fingerprint = task.fingerprint();
            match (&task.kind, &self.tool) {
                (TaskKind::Unknown(raw), _) => {
                    dlog_warn!("Unknown task kind '{}', dropping", raw);
                }
                (_, None) => {
                    dlog_error!(
                        "Cannot execute {} task: editor tool not found",
                        task.kind
                    );
                }
                (_, Some(tool)) => {
                    // Outcome classification and logging happen inside the
                    // tool; spawn errors are contained here per task.
                    if let Err(e) = tool.run(&task).await {
                        dlog_error!("Error executing {} task: {}", task.kind, e);
                    }
                }
            }
            self.remove_pending(&fingerprint);
            self.executed.insert(fingerprint);
        }
    }

    fn remove_pending(&mut self, fingerprint: &Fingerprint) {
        if let Some(pos) = self
            .pending
            .iter()
            .position(|t| t.fingerprint() == *fingerprint)
        {
            self.pending.remove(pos);
        }
    }

    /// One poll/merge/dispatch cycle.
    async fn cycle(&mut self) -> Result<()> {
        self.merge_new_tasks()?;
        self.dispatch_pending().await;
        Ok(())
    }

    /// Drive the agent until the shutdown flag is observed.
    ///
    /// Prepares the headless environment (best-effort), enters the running
    /// state, and repeats poll/dispatch/sleep. An error escaping a cycle is
    /// logged and followed by the longer backoff sleep instead of exiting.
    /// When the flag is set the current cycle finishes first, then the
    /// agent transitions through stopping to stopped.
    pub async fn run(
        &mut self,
        probe: &dyn DisplayProbe,
        shutdown: Arc<AtomicBool>,
    ) -> Result<()> {
        dlog!("Starting background agent: {}", self.id);
        display::prepare(probe).await;
        self.transition(RunState::Running)?;

        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        let backoff = Duration::from_secs(self.config.error_backoff_secs);

        while !shutdown.load(Ordering::SeqCst) {
            match self.cycle().await {
                Ok(()) => tokio::time::sleep(poll_interval).await,
                Err(e) => {
                    dlog_error!("Error in main loop: {}", e);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        self.transition(RunState::Stopping)?;
        dlog!("Stopping background agent: {}", self.id);
        self.transition(RunState::Stopped)?;
        Ok(())
    }
}
