use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Editor tool not found")]
    ToolNotFound,

    #[error("Invalid run state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Task timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
