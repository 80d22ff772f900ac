//! Cache keys for GitLab listings.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

/// Query key types for GitLab API calls.
#[derive(Clone, Debug)]
pub enum GitLabQueryKey {
  /// Projects the token can see
  Projects,
  /// A single project by id or path
  Project { project: String },
  /// Pipelines of a project
  Pipelines { project: String },
  /// Branches of a project
  Branches { project: String },
  /// Issues of a project
  Issues { project: String },
}

impl QueryKey for GitLabQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Projects => "projects".to_string(),
      Self::Project { project } => format!("project:{}", normalize_project(project)),
      Self::Pipelines { project } => format!("pipelines:{}", normalize_project(project)),
      Self::Branches { project } => format!("branches:{}", normalize_project(project)),
      Self::Issues { project } => format!("issues:{}", normalize_project(project)),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn description(&self) -> String {
    match self {
      Self::Projects => "all projects".to_string(),
      Self::Project { project } => format!("project {}", project),
      Self::Pipelines { project } => format!("pipelines for project {}", project),
      Self::Branches { project } => format!("branches for project {}", project),
      Self::Issues { project } => format!("issues for project {}", project),
    }
  }
}

/// Project paths are case-insensitive on GitLab.
fn normalize_project(project: &str) -> String {
  project.trim().to_lowercase()
}
