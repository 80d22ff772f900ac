//! Identity and status of a remote pipeline run.

use std::fmt;

/// The minimal identity needed to resume watching a pipeline.
///
/// Travels to the detached watcher as process arguments, so it must be
/// reconstructible from plain strings alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
  /// Numeric project id or full `group/project` path
  pub project_id: String,
  pub pipeline_id: u64,
}

impl JobHandle {
  pub fn new(project_id: impl Into<String>, pipeline_id: u64) -> Self {
    Self {
      project_id: project_id.into(),
      pipeline_id,
    }
  }

  /// Arguments that make `glaunch` watch this pipeline.
  pub fn to_watch_args(&self) -> Vec<String> {
    vec![
      "pipeline".to_string(),
      "watch".to_string(),
      "--project-id".to_string(),
      self.project_id.clone(),
      "--pipeline-id".to_string(),
      self.pipeline_id.to_string(),
    ]
  }
}

impl fmt::Display for JobHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.project_id, self.pipeline_id)
  }
}

/// Pipeline status as reported by the remote side.
///
/// Only `pending` and `running` keep a watcher polling. Every other value,
/// including ones this build has never seen, is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
  Pending,
  Running,
  Terminal(String),
}

impl JobStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, JobStatus::Terminal(_))
  }

  pub fn as_str(&self) -> &str {
    match self {
      JobStatus::Pending => "pending",
      JobStatus::Running => "running",
      JobStatus::Terminal(status) => status,
    }
  }
}

impl From<&str> for JobStatus {
  fn from(status: &str) -> Self {
    match status.trim().to_ascii_lowercase().as_str() {
      "pending" => JobStatus::Pending,
      "running" => JobStatus::Running,
      other => JobStatus::Terminal(other.to_string()),
    }
  }
}

impl fmt::Display for JobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
