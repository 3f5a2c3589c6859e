//! Headless display provisioning.
//!
//! The editor needs an X display even in batch mode. At startup the agent
//! checks whether a virtual display server is already running and starts one
//! detached if not. The check-then-start is racy by design: a duplicate
//! start is harmless and merely logged by the second process. Everything
//! here is best-effort; failures never block agent startup.

use std::process::Stdio;
use std::time::Duration;

use crate::{dlog, dlog_debug, dlog_warn};

/// Grace period after starting the display server, giving it time to bind.
const START_GRACE: Duration = Duration::from_secs(2);

/// Probe for an external display server process.
///
/// A seam for tests: the production probe shells out to `pgrep` and spawns
/// `Xvfb`; fakes substitute canned answers without touching the host.
/// Probes are shared across the agent future, hence the thread bounds.
pub trait DisplayProbe: Send + Sync {
    /// Whether a display server is already running.
    fn is_running(&self) -> bool;

    /// Start a display server, detached. The agent does not own its
    /// lifecycle beyond this launch.
    fn start(&self) -> std::io::Result<()>;
}

/// Production probe backed by `pgrep -f Xvfb` and a detached `Xvfb` spawn.
#[derive(Debug, Clone)]
pub struct XvfbProbe {
    display: String,
}

impl XvfbProbe {
    pub fn new(display: &str) -> Self {
        Self {
            display: display.to_string(),
        }
    }
}

impl DisplayProbe for XvfbProbe {
    fn is_running(&self) -> bool {
        std::process::Command::new("pgrep")
            .args(["-f", "Xvfb"])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn start(&self) -> std::io::Result<()> {
        std::process::Command::new("Xvfb")
            .arg(&self.display)
            .args(["-screen", "0", "1024x768x24", "-ac"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

/// Ensure a virtual display is available for editor subprocesses.
///
/// Never returns an error: a display that cannot be started is logged and
/// the agent proceeds (editor tasks will then fail on their own terms).
pub async fn prepare(probe: &dyn DisplayProbe) {
    if probe.is_running() {
        dlog_debug!("Virtual display already running");
        return;
    }

    dlog!("Starting virtual display");
    match probe.start() {
        Ok(()) => tokio::time::sleep(START_GRACE).await,
        Err(e) => dlog_warn!("Failed to start virtual display: {}", e),
    }
}
