//! In-memory remote used by unit tests.

use color_eyre::{eyre::eyre, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::remote::RemoteClient;
use super::types::{Branch, Issue, Pipeline, Project};
use crate::paginate::FIRST_PAGE;

pub fn pipeline(id: u64, status: &str) -> Pipeline {
  Pipeline {
    id,
    status: status.to_string(),
    git_ref: "main".to_string(),
    sha: format!("{:040x}", id),
    web_url: format!("https://gitlab.example.com/tools/launcher/-/pipelines/{}", id),
    created_at: None,
    updated_at: None,
  }
}

pub fn project(id: u64, path_with_namespace: &str) -> Project {
  let (namespace, path) = path_with_namespace
    .rsplit_once('/')
    .unwrap_or(("", path_with_namespace));
  Project {
    id,
    name: path.to_string(),
    namespace: namespace.to_string(),
    path: path.to_string(),
    path_with_namespace: path_with_namespace.to_string(),
    web_url: format!("https://gitlab.example.com/{}", path_with_namespace),
    description: None,
  }
}

/// Serves fixed listings page by page and scripted pipeline statuses.
#[derive(Default)]
pub struct FakeRemote {
  projects: Vec<Project>,
  pipelines: Vec<Pipeline>,
  fail_lists: bool,
  list_calls: AtomicUsize,
  project_calls: AtomicUsize,
  status_script: Mutex<VecDeque<Result<String>>>,
  status_calls: AtomicUsize,
  created_with: Mutex<Option<BTreeMap<String, String>>>,
}

impl FakeRemote {
  pub fn with_projects(mut self, projects: Vec<Project>) -> Self {
    self.projects = projects;
    self
  }

  pub fn with_pipelines(mut self, pipelines: Vec<Pipeline>) -> Self {
    self.pipelines = pipelines;
    self
  }

  pub fn failing_lists(mut self) -> Self {
    self.fail_lists = true;
    self
  }

  /// Responses returned by successive `get_pipeline` calls. `Err` entries
  /// simulate transport failures.
  pub fn with_status_script(self, script: Vec<Result<&str>>) -> Self {
    let script = script
      .into_iter()
      .map(|step| step.map(str::to_string))
      .collect();
    *self.status_script.lock().unwrap() = script;
    self
  }

  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub fn project_calls(&self) -> usize {
    self.project_calls.load(Ordering::SeqCst)
  }

  pub fn status_calls(&self) -> usize {
    self.status_calls.load(Ordering::SeqCst)
  }

  pub fn created_with(&self) -> Option<BTreeMap<String, String>> {
    self.created_with.lock().unwrap().clone()
  }

  fn page<T: Clone>(&self, items: &[T], page: u32, per_page: u32) -> Result<Vec<T>> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_lists {
      return Err(eyre!("HTTP 503 Service Unavailable"));
    }
    let start = ((page - FIRST_PAGE) * per_page) as usize;
    Ok(
      items
        .iter()
        .skip(start)
        .take(per_page as usize)
        .cloned()
        .collect(),
    )
  }
}

impl RemoteClient for FakeRemote {
  async fn list_projects(&self, page: u32, per_page: u32) -> Result<Vec<Project>> {
    self.page(&self.projects, page, per_page)
  }

  async fn get_project(&self, project: &str) -> Result<Project> {
    self.project_calls.fetch_add(1, Ordering::SeqCst);
    self
      .projects
      .iter()
      .find(|p| p.id.to_string() == project || p.path_with_namespace == project)
      .cloned()
      .ok_or_else(|| eyre!("Resource not found: /projects/{}", project))
  }

  async fn list_pipelines(
    &self,
    _project: &str,
    page: u32,
    per_page: u32,
    _status: Option<&str>,
  ) -> Result<Vec<Pipeline>> {
    self.page(&self.pipelines, page, per_page)
  }

  async fn list_branches(&self, _project: &str, page: u32, per_page: u32) -> Result<Vec<Branch>> {
    self.page::<Branch>(&[], page, per_page)
  }

  async fn list_issues(&self, _project: &str, page: u32, per_page: u32) -> Result<Vec<Issue>> {
    self.page::<Issue>(&[], page, per_page)
  }

  async fn create_pipeline(
    &self,
    _project: &str,
    git_ref: &str,
    variables: &BTreeMap<String, String>,
  ) -> Result<Pipeline> {
    *self.created_with.lock().unwrap() = Some(variables.clone());
    Ok(Pipeline {
      git_ref: git_ref.to_string(),
      ..pipeline(900, "created")
    })
  }

  async fn cancel_pipeline(&self, _project: &str, pipeline_id: u64) -> Result<Pipeline> {
    Ok(pipeline(pipeline_id, "canceled"))
  }

  async fn get_pipeline(&self, _project: &str, pipeline_id: u64) -> Result<Pipeline> {
    self.status_calls.fetch_add(1, Ordering::SeqCst);
    let step = self
      .status_script
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(eyre!("status script exhausted")));
    step.map(|status| pipeline(pipeline_id, &status))
  }
}
