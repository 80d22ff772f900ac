//! Serde-deserializable types matching GitLab REST v4 responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiNamespace {
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub username: String,
}

impl ApiUser {
  /// Full name, or the username for accounts without one.
  pub fn display_name(self) -> String {
    if self.name.trim().is_empty() {
      self.username
    } else {
      self.name
    }
  }
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiProject {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub path: String,
  #[serde(default)]
  pub path_with_namespace: String,
  #[serde(default)]
  pub web_url: String,
  pub description: Option<String>,
  pub namespace: Option<ApiNamespace>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPipeline {
  pub id: u64,
  pub status: String,
  #[serde(rename = "ref", default)]
  pub git_ref: String,
  #[serde(default)]
  pub sha: String,
  #[serde(default)]
  pub web_url: String,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCommit {
  pub id: String,
  #[serde(default)]
  pub short_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub author_name: String,
  #[serde(default)]
  pub author_email: String,
  pub authored_date: Option<DateTime<Utc>>,
  pub committed_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiBranch {
  pub name: String,
  pub commit: Option<ApiCommit>,
  #[serde(default)]
  pub protected: bool,
  #[serde(default)]
  pub merged: bool,
  #[serde(default)]
  pub default: bool,
  #[serde(default)]
  pub developers_can_push: bool,
  #[serde(default)]
  pub developers_can_merge: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub id: u64,
  pub iid: u64,
  pub title: String,
  #[serde(default)]
  pub state: String,
  pub assignee: Option<ApiUser>,
  #[serde(default)]
  pub labels: Vec<String>,
  #[serde(default)]
  pub web_url: String,
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiPipelineVariable<'a> {
  pub key: &'a str,
  pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ApiCreatePipeline<'a> {
  #[serde(rename = "ref")]
  pub git_ref: &'a str,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub variables: Vec<ApiPipelineVariable<'a>>,
}

impl<'a> ApiCreatePipeline<'a> {
  pub fn new(git_ref: &'a str, variables: &'a BTreeMap<String, String>) -> Self {
    Self {
      git_ref,
      variables: variables
        .iter()
        .map(|(key, value)| ApiPipelineVariable { key, value })
        .collect(),
    }
  }
}

// ============================================================================
// Conversions to domain types
// ============================================================================

use super::types::{Branch, Commit, Issue, Pipeline, Project};

impl From<ApiProject> for Project {
  fn from(p: ApiProject) -> Self {
    Project {
      id: p.id,
      name: p.name,
      namespace: p.namespace.map(|n| n.name).unwrap_or_default(),
      path: p.path,
      path_with_namespace: p.path_with_namespace,
      web_url: p.web_url,
      description: p.description.filter(|d| !d.trim().is_empty()),
    }
  }
}

impl From<ApiPipeline> for Pipeline {
  fn from(p: ApiPipeline) -> Self {
    Pipeline {
      id: p.id,
      status: p.status,
      git_ref: p.git_ref,
      sha: p.sha,
      web_url: p.web_url,
      created_at: p.created_at,
      updated_at: p.updated_at,
    }
  }
}

impl From<ApiCommit> for Commit {
  fn from(c: ApiCommit) -> Self {
    Commit {
      id: c.id,
      short_id: c.short_id,
      title: c.title,
      author_name: c.author_name,
      author_email: c.author_email,
      authored_date: c.authored_date,
      committed_date: c.committed_date,
      message: c.message,
    }
  }
}

impl From<ApiBranch> for Branch {
  fn from(b: ApiBranch) -> Self {
    Branch {
      name: b.name,
      commit: b.commit.map(Commit::from),
      protected: b.protected,
      merged: b.merged,
      default: b.default,
      developers_can_push: b.developers_can_push,
      developers_can_merge: b.developers_can_merge,
    }
  }
}

impl From<ApiIssue> for Issue {
  fn from(i: ApiIssue) -> Self {
    Issue {
      id: i.id,
      iid: i.iid,
      title: i.title,
      state: i.state,
      assignee: i.assignee.map(ApiUser::display_name),
      labels: i.labels,
      web_url: i.web_url,
    }
  }
}
