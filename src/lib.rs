pub mod agent;
pub mod config;
pub mod display;
pub mod error;
pub mod log;
pub mod queue;
pub mod task;
pub mod tool;

pub use agent::{Agent, RunState, StatusSnapshot};
pub use config::AgentConfig;
pub use error::{Error, Result};
pub use task::{Task, TaskDescriptor, TaskKind};
