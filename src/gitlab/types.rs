use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;

/// Project summary for list views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub id: u64,
  pub name: String,
  pub namespace: String,
  pub path: String,
  pub path_with_namespace: String,
  pub web_url: String,
  pub description: Option<String>,
}

/// A CI pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
  pub id: u64,
  pub status: String,
  pub git_ref: String,
  pub sha: String,
  pub web_url: String,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl Pipeline {
  pub fn job_status(&self) -> JobStatus {
    JobStatus::from(self.status.as_str())
  }
}

/// Head commit of a branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
  pub id: String,
  pub short_id: String,
  pub title: String,
  pub author_name: String,
  pub author_email: String,
  pub authored_date: Option<DateTime<Utc>>,
  pub committed_date: Option<DateTime<Utc>>,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
  pub name: String,
  pub commit: Option<Commit>,
  pub protected: bool,
  pub merged: bool,
  pub default: bool,
  pub developers_can_push: bool,
  pub developers_can_merge: bool,
}

/// Issue summary for list views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  pub id: u64,
  /// Project-scoped number shown as #iid
  pub iid: u64,
  pub title: String,
  pub state: String, // "opened" or "closed"
  pub assignee: Option<String>,
  pub labels: Vec<String>,
  pub web_url: String,
}
