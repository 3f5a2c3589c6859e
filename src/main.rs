use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use drover::agent::Agent;
use drover::config::AgentConfig;
use drover::display::XvfbProbe;
use drover::queue::TaskQueue;
use drover::task::{Params, TaskDescriptor, TaskKind};
use drover::{dlog, Error, Result};

/// Drover - background task agent for headless editor automation
#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    DROVER_DEBUG=1    Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Path to the project directory
    #[arg(short = 'p', long)]
    pub project_path: Option<PathBuf>,

    /// Path to the editor executable (discovered when omitted)
    #[arg(long)]
    pub tool_path: Option<PathBuf>,

    /// Seconds between queue polls
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Per-task timeout in seconds; tasks block without limit when omitted
    #[arg(long)]
    pub task_timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Append a task descriptor to the project's queue file
    Submit {
        /// Task kind: build, test, compile, or import
        kind: String,

        /// Task parameter as KEY=VALUE (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Print the status snapshot for the resolved configuration
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    drover::log::init(&config.agent_logs_dir(), &Agent::instance_id(), cli.debug);

    match cli.command {
        Some(Command::Submit { kind, params }) => run_submit(config, &kind, &params),
        Some(Command::Status) => run_status(config),
        None => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_agent(config))
        }
    }
}

/// Merge the on-disk configuration with CLI overrides.
fn resolve_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = AgentConfig::load()?;
    if let Some(path) = &cli.project_path {
        config.project_path = path.clone();
    }
    if let Some(path) = &cli.tool_path {
        config.tool_path = Some(path.clone());
    }
    if let Some(secs) = cli.poll_interval {
        config.poll_interval_secs = secs;
    }
    if let Some(secs) = cli.task_timeout {
        config.task_timeout_secs = Some(secs);
    }
    Ok(config)
}

/// Run the agent until a termination signal stops it.
async fn run_agent(config: AgentConfig) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(&shutdown)?;

    let mut agent = Agent::new(config);
    let probe = XvfbProbe::new(&agent.config().headless.display);
    agent.run(&probe, shutdown).await
}

/// Install SIGINT/SIGTERM handlers that request a graceful stop.
///
/// The handlers only flip the shared flag; the main loop observes it at
/// cycle boundaries. Installation failure is fatal and aborts startup.
fn install_signal_handlers(shutdown: &Arc<AtomicBool>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    for kind in [SignalKind::interrupt(), SignalKind::terminate()] {
        let mut stream = signal(kind)?;
        let flag = shutdown.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                flag.store(true, Ordering::SeqCst);
            }
        });
    }
    Ok(())
}

/// Append a task descriptor to the queue file for the running agent to pick up.
fn run_submit(config: AgentConfig, kind: &str, raw_params: &[String]) -> Result<()> {
    let mut params = Params::new();
    for raw in raw_params {
        let (key, value) = parse_param(raw)?;
        params.insert(key, value);
    }

    let descriptor = TaskDescriptor {
        kind: TaskKind::parse(kind),
        params,
    };
    let queue = TaskQueue::new(&config.queue_path());
    queue.submit(descriptor)?;

    dlog!("Submitted {} task to {}", kind, queue.path().display());
    println!("Submitted {} task to {}", kind, queue.path().display());
    Ok(())
}

/// Print the snapshot a freshly-constructed agent reports, as JSON.
fn run_status(config: AgentConfig) -> Result<()> {
    let agent = Agent::new(config);
    println!("{}", serde_json::to_string_pretty(&agent.status())?);
    Ok(())
}

/// Parse a `KEY=VALUE` parameter. Values that read as JSON numbers or
/// booleans keep that type; everything else is a string.
fn parse_param(raw: &str) -> Result<(String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::Validation(format!("invalid parameter '{}', expected KEY=VALUE", raw)))?;
    if key.is_empty() {
        return Err(Error::Validation(format!(
            "invalid parameter '{}', empty key",
            raw
        )));
    }

    let parsed = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(v) if v.is_number() || v.is_boolean() => v,
        _ => serde_json::Value::String(value.to_string()),
    };
    Ok((key.to_string(), parsed))
}
