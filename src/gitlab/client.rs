use crate::config::{Config, GitLabConfig};
use crate::gitlab::api_types::{
  ApiBranch, ApiCreatePipeline, ApiIssue, ApiPipeline, ApiProject,
};
use crate::gitlab::remote::RemoteClient;
use crate::gitlab::types::{Branch, Issue, Pipeline, Project};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Minimum access level for listed projects (10 = guest).
const MIN_ACCESS_LEVEL: &str = "10";

/// GitLab REST v4 client wrapper
#[derive(Clone)]
pub struct GitLabClient {
  http: reqwest::Client,
  api_base: String,
}

impl GitLabClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(&config.gitlab, &token)
  }

  pub fn with_token(config: &GitLabConfig, token: &str) -> Result<Self> {
    let base =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid GitLab URL {}: {}", config.url, e))?;
    if !matches!(base.scheme(), "http" | "https") {
      return Err(eyre!("GitLab URL must be http or https: {}", config.url));
    }

    let mut token_value =
      HeaderValue::from_str(token).map_err(|e| eyre!("Invalid GitLab token: {}", e))?;
    token_value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert("PRIVATE-TOKEN", token_value);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .user_agent(concat!("glaunch/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      api_base: format!("{}/api/v4", base.as_str().trim_end_matches('/')),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.api_base, path)
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
    debug!(path, "GET");
    let response = self
      .http
      .get(self.url(path))
      .query(query)
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?;

    decode(check_response(response).await?, path).await
  }

  async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
    &self,
    path: &str,
    body: Option<&B>,
  ) -> Result<T> {
    debug!(path, "POST");
    let mut request = self.http.post(self.url(path));
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?;

    decode(check_response(response).await?, path).await
  }
}

fn page_query(page: u32, per_page: u32) -> Vec<(&'static str, String)> {
  vec![
    ("page", page.to_string()),
    ("per_page", per_page.to_string()),
  ]
}

impl RemoteClient for GitLabClient {
  async fn list_projects(&self, page: u32, per_page: u32) -> Result<Vec<Project>> {
    let mut query = page_query(page, per_page);
    query.push(("min_access_level", MIN_ACCESS_LEVEL.to_string()));

    let projects: Vec<ApiProject> = self
      .get("/projects", &query)
      .await
      .map_err(|e| eyre!("Failed to list projects: {}", e))?;

    Ok(projects.into_iter().map(Project::from).collect())
  }

  async fn get_project(&self, project: &str) -> Result<Project> {
    let endpoint = format!("/projects/{}", encode_project(project));

    let api: ApiProject = self
      .get(&endpoint, &[])
      .await
      .map_err(|e| eyre!("Failed to get project {}: {}", project, e))?;

    Ok(api.into())
  }

  async fn list_pipelines(
    &self,
    project: &str,
    page: u32,
    per_page: u32,
    status: Option<&str>,
  ) -> Result<Vec<Pipeline>> {
    let endpoint = format!("/projects/{}/pipelines", encode_project(project));
    let mut query = page_query(page, per_page);
    if let Some(status) = status {
      query.push(("status", status.to_string()));
    }

    let pipelines: Vec<ApiPipeline> = self
      .get(&endpoint, &query)
      .await
      .map_err(|e| eyre!("Failed to list pipelines for {}: {}", project, e))?;

    Ok(pipelines.into_iter().map(Pipeline::from).collect())
  }

  async fn list_branches(&self, project: &str, page: u32, per_page: u32) -> Result<Vec<Branch>> {
    let endpoint = format!("/projects/{}/repository/branches", encode_project(project));

    let branches: Vec<ApiBranch> = self
      .get(&endpoint, &page_query(page, per_page))
      .await
      .map_err(|e| eyre!("Failed to list branches for {}: {}", project, e))?;

    Ok(branches.into_iter().map(Branch::from).collect())
  }

  async fn list_issues(&self, project: &str, page: u32, per_page: u32) -> Result<Vec<Issue>> {
    let endpoint = format!("/projects/{}/issues", encode_project(project));

    let issues: Vec<ApiIssue> = self
      .get(&endpoint, &page_query(page, per_page))
      .await
      .map_err(|e| eyre!("Failed to list issues for {}: {}", project, e))?;

    Ok(issues.into_iter().map(Issue::from).collect())
  }

  async fn create_pipeline(
    &self,
    project: &str,
    git_ref: &str,
    variables: &BTreeMap<String, String>,
  ) -> Result<Pipeline> {
    let endpoint = format!("/projects/{}/pipeline", encode_project(project));
    let body = ApiCreatePipeline::new(git_ref, variables);

    let api: ApiPipeline = self
      .post(&endpoint, Some(&body))
      .await
      .map_err(|e| eyre!("Failed to create pipeline on {}: {}", git_ref, e))?;

    Ok(api.into())
  }

  async fn cancel_pipeline(&self, project: &str, pipeline_id: u64) -> Result<Pipeline> {
    let endpoint = format!(
      "/projects/{}/pipelines/{}/cancel",
      encode_project(project),
      pipeline_id
    );

    let api: ApiPipeline = self
      .post::<_, ()>(&endpoint, None)
      .await
      .map_err(|e| eyre!("Failed to cancel pipeline {}: {}", pipeline_id, e))?;

    Ok(api.into())
  }

  async fn get_pipeline(&self, project: &str, pipeline_id: u64) -> Result<Pipeline> {
    let endpoint = format!(
      "/projects/{}/pipelines/{}",
      encode_project(project),
      pipeline_id
    );

    let api: ApiPipeline = self
      .get(&endpoint, &[])
      .await
      .map_err(|e| eyre!("Failed to get pipeline {}: {}", pipeline_id, e))?;

    Ok(api.into())
  }
}

/// Project ids go into the path verbatim; `group/project` paths must be
/// percent-encoded into a single segment.
fn encode_project(project: &str) -> String {
  url::form_urlencoded::byte_serialize(project.as_bytes()).collect()
}

/// Check response status and convert errors.
async fn check_response(response: Response) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let path = response.url().path().to_string();
  match status {
    StatusCode::UNAUTHORIZED => Err(eyre!(
      "Authentication failed: invalid or expired GitLab token"
    )),
    StatusCode::NOT_FOUND => Err(eyre!("Resource not found: {}", path)),
    StatusCode::TOO_MANY_REQUESTS => {
      let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
      Err(eyre!(
        "Rate limit exceeded, retry after {} seconds",
        retry_after
      ))
    }
    status => {
      let body = response.text().await.unwrap_or_default();
      Err(eyre!("HTTP {}: {}", status, error_message(&body)))
    }
  }
}

async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T> {
  response
    .json()
    .await
    .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))
}

/// GitLab reports errors as `{"message": ...}` or `{"error": ...}`, where
/// `message` may itself be an object of field errors.
fn error_message(body: &str) -> String {
  let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
    return body.trim().to_string();
  };

  let field = value.get("message").or_else(|| value.get("error"));
  match field {
    Some(serde_json::Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
    None => body.trim().to_string(),
  }
}
