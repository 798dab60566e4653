//! Error types for the backend. Engine conditions that are part of normal
//! play (ignored input, integrity warnings) are values, not errors.

use std::path::PathBuf;

/// A task handed in from outside could not be turned into a `TaskFact`.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
  #[error("{slot} must be a non-negative integer, got {value}")]
  InvalidOperand { slot: &'static str, value: i64 },

  #[error("task magnitude {max_magnitude} exceeds the supported range of {limit}")]
  OutOfRange { max_magnitude: i64, limit: i64 },
}

/// A client message could not be handled.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
  #[error("Invalid JSON: {0}")]
  InvalidJson(#[from] serde_json::Error),

  #[error("no live task: send new_task first")]
  NoTask,

  #[error("'{message}' is not available in {mode} mode")]
  WrongMode { message: &'static str, mode: &'static str },

  #[error(transparent)]
  Task(#[from] TaskError),
}

/// Recording an advance in the progress store failed.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
  #[error("progress store rejected advance for task {task_id}: {reason}")]
  Rejected { task_id: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}
