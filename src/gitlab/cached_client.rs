//! Cached GitLab client that wraps a remote client with transparent caching.

use color_eyre::Result;
use std::collections::BTreeMap;

use crate::cache::{CacheLayer, CacheStorage};
use crate::config::CacheConfig;
use crate::paginate::fetch_all;

use super::cache::GitLabQueryKey;
use super::remote::RemoteClient;
use super::types::{Branch, Issue, Pipeline, Project};

/// GitLab client with transparent caching support.
///
/// Listings are aggregated across all pages and cached as a whole. Pipeline
/// control operations always go to the remote side.
pub struct CachedGitLabClient<C: RemoteClient, S: CacheStorage> {
  inner: C,
  cache: CacheLayer<S>,
  ttls: CacheConfig,
  page_size: u32,
}

impl<C: RemoteClient, S: CacheStorage> CachedGitLabClient<C, S> {
  pub fn new(inner: C, cache: CacheLayer<S>, ttls: CacheConfig, page_size: u32) -> Self {
    Self {
      inner,
      cache,
      ttls,
      page_size,
    }
  }

  /// The uncached client, for volatile reads such as pipeline status.
  #[cfg(test)]
  pub fn remote(&self) -> &C {
    &self.inner
  }

  #[cfg(test)]
  pub fn cache(&self) -> &CacheLayer<S> {
    &self.cache
  }

  /// All projects visible to the token.
  pub async fn projects(&self) -> Result<Vec<Project>> {
    let inner = &self.inner;
    let page_size = self.page_size;

    self
      .cache
      .load_or_store(&GitLabQueryKey::Projects, self.ttls.projects_ttl(), || {
        fetch_all(&(), page_size, |_, page, per_page| {
          inner.list_projects(page, per_page)
        })
      })
      .await
  }

  /// One project by numeric id or `group/project` path. Shares the project
  /// listing TTL.
  pub async fn project(&self, project: &str) -> Result<Project> {
    let query_key = GitLabQueryKey::Project {
      project: project.to_string(),
    };
    let inner = &self.inner;

    self
      .cache
      .load_or_store(&query_key, self.ttls.projects_ttl(), || {
        inner.get_project(project)
      })
      .await
  }

  /// All pipelines of a project, newest first.
  pub async fn pipelines(&self, project: &str) -> Result<Vec<Pipeline>> {
    let query_key = GitLabQueryKey::Pipelines {
      project: project.to_string(),
    };
    let inner = &self.inner;
    let page_size = self.page_size;

    self
      .cache
      .load_or_store(&query_key, self.ttls.pipelines_ttl(), || {
        fetch_all(project, page_size, |scope, page, per_page| {
          inner.list_pipelines(scope, page, per_page, None)
        })
      })
      .await
  }

  pub async fn branches(&self, project: &str) -> Result<Vec<Branch>> {
    let query_key = GitLabQueryKey::Branches {
      project: project.to_string(),
    };
    let inner = &self.inner;
    let page_size = self.page_size;

    self
      .cache
      .load_or_store(&query_key, self.ttls.branches_ttl(), || {
        fetch_all(project, page_size, |scope, page, per_page| {
          inner.list_branches(scope, page, per_page)
        })
      })
      .await
  }

  pub async fn issues(&self, project: &str) -> Result<Vec<Issue>> {
    let query_key = GitLabQueryKey::Issues {
      project: project.to_string(),
    };
    let inner = &self.inner;
    let page_size = self.page_size;

    self
      .cache
      .load_or_store(&query_key, self.ttls.issues_ttl(), || {
        fetch_all(project, page_size, |scope, page, per_page| {
          inner.list_issues(scope, page, per_page)
        })
      })
      .await
  }

  /// Start a pipeline (not cached - write operation).
  pub async fn create_pipeline(
    &self,
    project: &str,
    git_ref: &str,
    variables: &BTreeMap<String, String>,
  ) -> Result<Pipeline> {
    self.inner.create_pipeline(project, git_ref, variables).await
  }

  /// Cancel a pipeline (not cached - write operation).
  pub async fn cancel_pipeline(&self, project: &str, pipeline_id: u64) -> Result<Pipeline> {
    self.inner.cancel_pipeline(project, pipeline_id).await
  }
}
