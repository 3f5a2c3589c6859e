//! Task data model for the dispatch queue.
//!
//! Tasks arrive as JSON descriptors written by external producers, are
//! admitted exactly once by the agent, and are consumed exactly once by the
//! dispatcher. Identity is structural: two descriptors with the same kind
//! and parameters are the same task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Parameter map carried by a task descriptor.
///
/// A `BTreeMap` keeps key order canonical so fingerprints are deterministic.
pub type Params = BTreeMap<String, serde_json::Value>;

/// The kind of work a task requests.
///
/// `Unknown` preserves the raw wire string so it can be reported when the
/// dispatcher drops the task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Build,
    Test,
    Compile,
    Import,
    Unknown(String),
}

impl TaskKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "build" => TaskKind::Build,
            "test" => TaskKind::Test,
            "compile" => TaskKind::Compile,
            "import" => TaskKind::Import,
            other => TaskKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Build => "build",
            TaskKind::Test => "test",
            TaskKind::Compile => "compile",
            TaskKind::Import => "import",
            TaskKind::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for TaskKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(TaskKind::parse(&s))
    }
}

/// Wire form of a task as found in the queue file:
/// `{ "type": "build", "params": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub params: Params,
}

impl TaskDescriptor {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    /// Structural identity of this descriptor.
    ///
    /// Kind plus canonically-ordered parameters; admission context never
    /// participates, so re-reading an unchanged queue yields the same
    /// fingerprints.
    pub fn fingerprint(&self) -> Fingerprint {
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        Fingerprint(format!("{}|{}", self.kind.as_str(), params))
    }
}

/// Opaque structural identity of a task, used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

/// An admitted unit of work.
///
/// Created when the reader first observes a descriptor; consumed exactly
/// once by the dispatcher. Success and failure both terminate the task.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub kind: TaskKind,
    pub params: Params,
    /// When the agent first observed this task.
    pub submitted_at: DateTime<Utc>,
    /// Identifier of the agent instance that admitted it.
    pub owner_id: String,
}

impl Task {
    pub fn admit(descriptor: TaskDescriptor, owner_id: &str) -> Self {
        Self {
            kind: descriptor.kind,
            params: descriptor.params,
            submitted_at: Utc::now(),
            owner_id: owner_id.to_string(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        Fingerprint(format!("{}|{}", self.kind.as_str(), params))
    }
}

/// Read a string parameter, treating non-string values as absent.
pub fn str_param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}
