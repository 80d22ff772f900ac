//! The contract the cache, aggregator and watcher consume.

use color_eyre::Result;
use std::collections::BTreeMap;
use std::future::Future;

use super::types::{Branch, Issue, Pipeline, Project};

/// Paged listings and pipeline control for a DevOps platform.
///
/// `project` is a numeric id or a full `group/project` path. Pages follow the
/// platform's numbering (see [`crate::paginate::FIRST_PAGE`]).
pub trait RemoteClient: Send + Sync {
  fn list_projects(&self, page: u32, per_page: u32)
    -> impl Future<Output = Result<Vec<Project>>> + Send;

  fn get_project(&self, project: &str) -> impl Future<Output = Result<Project>> + Send;

  /// List pipelines newest first, optionally only those with `status`.
  fn list_pipelines(
    &self,
    project: &str,
    page: u32,
    per_page: u32,
    status: Option<&str>,
  ) -> impl Future<Output = Result<Vec<Pipeline>>> + Send;

  fn list_branches(
    &self,
    project: &str,
    page: u32,
    per_page: u32,
  ) -> impl Future<Output = Result<Vec<Branch>>> + Send;

  fn list_issues(
    &self,
    project: &str,
    page: u32,
    per_page: u32,
  ) -> impl Future<Output = Result<Vec<Issue>>> + Send;

  fn create_pipeline(
    &self,
    project: &str,
    git_ref: &str,
    variables: &BTreeMap<String, String>,
  ) -> impl Future<Output = Result<Pipeline>> + Send;

  fn cancel_pipeline(
    &self,
    project: &str,
    pipeline_id: u64,
  ) -> impl Future<Output = Result<Pipeline>> + Send;

  fn get_pipeline(
    &self,
    project: &str,
    pipeline_id: u64,
  ) -> impl Future<Output = Result<Pipeline>> + Send;
}
