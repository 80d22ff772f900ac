//! Launcher verbs rendered as script-filter feedback.

use chrono::Utc;
use color_eyre::Result;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::cache::CacheStorage;
use crate::feedback::{Feedback, Item};
use crate::gitlab::types::{Branch, Issue, Pipeline, Project};
use crate::gitlab::{CachedGitLabClient, RemoteClient};
use crate::job::JobHandle;

/// Pipeline variable naming the app to build.
const APP_VARIABLE: &str = "CI_BUILD_APP";

pub struct Commands<C: RemoteClient, S: CacheStorage> {
  client: CachedGitLabClient<C, S>,
}

impl<C: RemoteClient, S: CacheStorage> Commands<C, S> {
  pub fn new(client: CachedGitLabClient<C, S>) -> Self {
    Self { client }
  }

  pub async fn list_projects(&self, query: Option<&str>) -> Result<Feedback> {
    let projects = self.client.projects().await?;

    let mut feedback = Feedback::new();
    for project in &projects {
      feedback.push(project_item(project));
    }
    finish(&mut feedback, query, "No projects");
    Ok(feedback)
  }

  /// Resolve a single project, e.g. a `group/project` path to its id.
  pub async fn show_project(&self, project: &str) -> Result<Feedback> {
    let project = self.client.project(project).await?;

    let mut feedback = Feedback::new();
    feedback.push(project_item(&project));
    Ok(feedback)
  }

  pub async fn list_pipelines(&self, project: &str, query: Option<&str>) -> Result<Feedback> {
    let pipelines = self.client.pipelines(project).await?;

    let mut feedback = Feedback::new();
    feedback.push(
      Item::new("Run")
        .subtitle("Runs a pipeline")
        .arg("run")
        .valid(true),
    );
    feedback.push(
      Item::new("Open")
        .subtitle("Open pipelines page")
        .arg("open")
        .valid(true),
    );
    for pipeline in &pipelines {
      feedback.push(pipeline_item(pipeline));
    }
    finish(&mut feedback, query, "No pipelines");
    Ok(feedback)
  }

  pub async fn list_branches(&self, project: &str, query: Option<&str>) -> Result<Feedback> {
    let branches = self.client.branches(project).await?;

    let mut feedback = Feedback::new();
    for branch in &branches {
      feedback.push(branch_item(branch));
    }
    finish(&mut feedback, query, "No branches");
    Ok(feedback)
  }

  pub async fn list_issues(&self, project: &str, query: Option<&str>) -> Result<Feedback> {
    let issues = self.client.issues(project).await?;

    let mut feedback = Feedback::new();
    feedback.push(
      Item::new("Open")
        .subtitle("Opens project issue list")
        .arg("open_issues")
        .valid(true),
    );
    feedback.push(
      Item::new("New")
        .subtitle("Creates a new issue")
        .arg("new_issue")
        .valid(true),
    );
    for issue in &issues {
      feedback.push(issue_item(issue));
    }
    finish(&mut feedback, query, "No issues");
    Ok(feedback)
  }

  /// Start a pipeline on `branch`. On success, also returns the handle the
  /// caller should hand to a background watcher.
  pub async fn run_pipeline(
    &self,
    project: &str,
    branch: &str,
    app: Option<&str>,
  ) -> (Feedback, Option<JobHandle>) {
    info!(project, branch, app = app.unwrap_or_default(), "running pipeline");

    let mut variables = BTreeMap::new();
    if let Some(app) = app.filter(|a| !a.is_empty()) {
      variables.insert(APP_VARIABLE.to_string(), app.to_string());
    }

    match self.client.create_pipeline(project, branch, &variables).await {
      Ok(pipeline) => {
        let mut feedback = Feedback::new();
        feedback.push(
          Item::new(&pipeline.web_url)
            .subtitle(&pipeline.status)
            .var("pipeline_id", pipeline.id.to_string())
            .var("pipeline_url", &pipeline.web_url)
            .valid(true),
        );
        (feedback, Some(JobHandle::new(project, pipeline.id)))
      }
      Err(e) => {
        warn!(project, branch, error = %e, "failed to create pipeline");
        (Feedback::failure(e.to_string()), None)
      }
    }
  }

  pub async fn cancel_pipeline(&self, project: &str, pipeline_id: u64) -> Feedback {
    info!(project, pipeline_id, "cancelling pipeline");

    match self.client.cancel_pipeline(project, pipeline_id).await {
      Ok(pipeline) => {
        let mut feedback = Feedback::new();
        feedback.push(
          Item::new("Pipeline is cancelled")
            .subtitle(&pipeline.web_url)
            .var("pipeline_url", &pipeline.web_url)
            .valid(true),
        );
        feedback
      }
      Err(e) => {
        warn!(project, pipeline_id, error = %e, "failed to cancel pipeline");
        Feedback::failure(e.to_string())
      }
    }
  }
}

/// Describe every cache entry with its age and freshness.
pub fn list_cache<S: CacheStorage>(storage: &S) -> Result<Feedback> {
  let now = Utc::now();
  let entries = storage.entries()?;

  let mut feedback = Feedback::new();
  for entry in &entries {
    let age = entry.age_at(now).as_secs();
    let state = if entry.is_fresh_at(now, entry.ttl) {
      "fresh"
    } else {
      "stale"
    };
    feedback.push(
      Item::new(&entry.description)
        .subtitle(format!(
          "{}, {}s old, ttl {}s, {} bytes",
          state,
          age,
          entry.ttl.as_secs(),
          entry.payload.len()
        ))
        .var("cache_key", &entry.key),
    );
  }
  feedback.warn_empty("Empty", "Cache is empty");
  Ok(feedback)
}

pub fn clear_cache<S: CacheStorage>(storage: &S) -> Result<Feedback> {
  let removed = storage.clear()?;
  info!(removed, "cleared cache");

  let mut feedback = Feedback::new();
  feedback.push(Item::new("Cache cleared").subtitle(format!("Removed {} entries", removed)));
  Ok(feedback)
}

fn finish(feedback: &mut Feedback, query: Option<&str>, empty_subtitle: &str) {
  if let Some(query) = query {
    feedback.filter(query);
  }
  feedback.warn_empty("Empty", empty_subtitle);
}

fn project_item(project: &Project) -> Item {
  Item::new(&project.name)
    .subtitle(&project.web_url)
    .arg(&project.web_url)
    .var("project_id", project.id.to_string())
    .var("project_path", &project.path_with_namespace)
    .valid(true)
}

fn pipeline_item(pipeline: &Pipeline) -> Item {
  Item::new(&pipeline.git_ref)
    .subtitle(&pipeline.status)
    .var("pipeline_id", pipeline.id.to_string())
    .var("pipeline_ref", &pipeline.git_ref)
    .var("pipeline_status", &pipeline.status)
    .var("pipeline_url", &pipeline.web_url)
    .valid(true)
}

fn branch_item(branch: &Branch) -> Item {
  let title = branch
    .commit
    .as_ref()
    .map(|c| c.title.as_str())
    .unwrap_or_default();
  let subtitle = match (title, branch.merged) {
    ("", true) => "merged".to_string(),
    (title, true) => format!("{} merged", title),
    (title, false) => title.to_string(),
  };

  Item::new(&branch.name)
    .subtitle(subtitle)
    .var("branch_name", &branch.name)
    .valid(true)
}

fn issue_item(issue: &Issue) -> Item {
  let subtitle = match &issue.assignee {
    Some(assignee) => format!("#{} {} {}", issue.iid, issue.state, assignee),
    None => format!("#{} {}", issue.iid, issue.state),
  };

  Item::new(&issue.title)
    .subtitle(subtitle)
    .autocomplete(&issue.title)
    .var("issue_id", issue.iid.to_string())
    .var("issue_url", &issue.web_url)
    .valid(true)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheLayer, SqliteStorage};
  use crate::config::CacheConfig;
  use crate::gitlab::testing::{pipeline, project, FakeRemote};

  fn commands(remote: FakeRemote) -> Commands<FakeRemote, SqliteStorage> {
    let cache = CacheLayer::new(SqliteStorage::open_in_memory().unwrap());
    Commands::new(CachedGitLabClient::new(
      remote,
      cache,
      CacheConfig::default(),
      100,
    ))
  }

  fn titles(feedback: &Feedback) -> Vec<&str> {
    feedback.items.iter().map(|i| i.title.as_str()).collect()
  }

  #[tokio::test]
  async fn test_pipeline_list_has_actions_then_pipelines() {
    let remote =
      FakeRemote::default().with_pipelines(vec![pipeline(2, "running"), pipeline(1, "failed")]);
    let commands = commands(remote);

    let feedback = commands.list_pipelines("42", None).await.unwrap();

    assert_eq!(titles(&feedback), vec!["Run", "Open", "main", "main"]);
    let first = &feedback.items[2];
    assert_eq!(first.subtitle.as_deref(), Some("running"));
    assert_eq!(first.variables["pipeline_id"], "2");
  }

  #[tokio::test]
  async fn test_show_project_resolves_path() {
    let remote = FakeRemote::default().with_projects(vec![project(42, "tools/launcher")]);
    let commands = commands(remote);

    let feedback = commands.show_project("tools/launcher").await.unwrap();

    assert_eq!(titles(&feedback), vec!["launcher"]);
    assert_eq!(feedback.items[0].variables["project_id"], "42");
    assert_eq!(
      feedback.items[0].variables["project_path"],
      "tools/launcher"
    );
  }

  #[tokio::test]
  async fn test_show_unknown_project_is_an_error() {
    let commands = commands(FakeRemote::default());
    assert!(commands.show_project("7").await.is_err());
  }

  #[tokio::test]
  async fn test_empty_branch_list_warns() {
    let commands = commands(FakeRemote::default());
    let feedback = commands.list_branches("42", None).await.unwrap();
    assert_eq!(titles(&feedback), vec!["Empty"]);
  }

  #[tokio::test]
  async fn test_query_filters_static_items_too() {
    let commands = commands(FakeRemote::default());
    let feedback = commands.list_issues("42", Some("new")).await.unwrap();
    assert_eq!(titles(&feedback), vec!["New"]);
  }

  #[tokio::test]
  async fn test_listing_failure_is_an_error() {
    let commands = commands(FakeRemote::default().failing_lists());
    assert!(commands.list_projects(None).await.is_err());
  }

  #[tokio::test]
  async fn test_run_pipeline_returns_handle() {
    let commands = commands(FakeRemote::default());

    let (feedback, handle) = commands.run_pipeline("42", "main", Some("api")).await;

    assert_eq!(handle, Some(JobHandle::new("42", 900)));
    assert_eq!(feedback.items.len(), 1);
    assert_eq!(feedback.items[0].variables["pipeline_id"], "900");
  }

  #[tokio::test]
  async fn test_cancel_pipeline_renders_result() {
    let commands = commands(FakeRemote::default());
    let feedback = commands.cancel_pipeline("42", 812).await;
    assert_eq!(titles(&feedback), vec!["Pipeline is cancelled"]);
  }

  #[tokio::test]
  async fn test_cache_list_and_clear() {
    let commands = commands(FakeRemote::default());
    commands.list_branches("42", None).await.unwrap();

    let storage = commands.client.cache().storage();
    let listed = list_cache(storage).unwrap();
    assert_eq!(titles(&listed), vec!["branches for project 42"]);
    assert!(listed.items[0]
      .subtitle
      .as_deref()
      .unwrap()
      .starts_with("fresh"));

    let cleared = clear_cache(storage).unwrap();
    assert_eq!(
      cleared.items[0].subtitle.as_deref(),
      Some("Removed 1 entries")
    );
    assert_eq!(titles(&list_cache(storage).unwrap()), vec!["Empty"]);
  }

  #[test]
  fn test_branch_subtitle_marks_merged() {
    let branch = Branch {
      name: "feature/cache".to_string(),
      commit: None,
      protected: false,
      merged: true,
      default: false,
      developers_can_push: true,
      developers_can_merge: true,
    };
    assert_eq!(branch_item(&branch).subtitle.as_deref(), Some("merged"));
  }

  #[test]
  fn test_issue_subtitle() {
    let issue = Issue {
      id: 1,
      iid: 7,
      title: "Cache never expires".to_string(),
      state: "opened".to_string(),
      assignee: Some("Dev".to_string()),
      labels: Vec::new(),
      web_url: String::new(),
    };
    assert_eq!(
      issue_item(&issue).subtitle.as_deref(),
      Some("#7 opened Dev")
    );
  }
}
