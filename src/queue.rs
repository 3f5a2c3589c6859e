//! Task queue file access.
//!
//! The queue is a JSON array of task descriptors at a well-known path inside
//! the project directory. External producers append or replace it; the agent
//! re-reads the whole file on every poll and treats a missing or malformed
//! file as an empty queue for that cycle.

use std::fs;
use std::path::{Path, PathBuf};

use crate::task::TaskDescriptor;
use crate::{dlog_debug, dlog_error, Result};

#[derive(Debug, Clone)]
pub struct TaskQueue {
    path: PathBuf,
}

impl TaskQueue {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every descriptor currently in the queue file.
    ///
    /// One full pass per invocation. A missing file is an empty queue, not
    /// an error. A file that fails to parse is logged and yields nothing for
    /// this cycle (no partial admission; the next poll retries it). A read
    /// failure on an existing file propagates so the caller can back off.
    pub fn poll(&self) -> Result<Vec<TaskDescriptor>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Vec<TaskDescriptor>>(&text) {
            Ok(descriptors) => {
                dlog_debug!(
                    "Queue poll: {} descriptor(s) in {}",
                    descriptors.len(),
                    self.path.display()
                );
                Ok(descriptors)
            }
            Err(e) => {
                dlog_error!("Failed to parse queue file {}: {}", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    /// Append a descriptor to the queue file.
    ///
    /// Read-modify-write of the JSON array; a missing file starts a new
    /// queue. Used by the `submit` CLI helper, not by the agent loop.
    pub fn submit(&self, descriptor: TaskDescriptor) -> Result<()> {
        let mut descriptors = if self.path.exists() {
            serde_json::from_str::<Vec<TaskDescriptor>>(&fs::read_to_string(&self.path)?)?
        } else {
            Vec::new()
        };
        descriptors.push(descriptor);
        fs::write(&self.path, serde_json::to_string_pretty(&descriptors)?)?;
        Ok(())
    }
}
