use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub gitlab: GitLabConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub watch: WatchConfig,
  #[serde(default)]
  pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabConfig {
  /// Base URL of the GitLab instance, without the /api/v4 suffix
  #[serde(default = "default_gitlab_url")]
  pub url: String,
  /// Items requested per page when listing resources
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for GitLabConfig {
  fn default() -> Self {
    Self {
      url: default_gitlab_url(),
      page_size: default_page_size(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_gitlab_url() -> String {
  DEFAULT_GITLAB_URL.to_string()
}

fn default_page_size() -> u32 {
  100
}

fn default_timeout_secs() -> u64 {
  30
}

/// Cache lifetimes per resource kind, in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default = "default_projects_ttl")]
  pub projects_ttl_secs: u64,
  #[serde(default = "default_pipelines_ttl")]
  pub pipelines_ttl_secs: u64,
  #[serde(default = "default_branches_ttl")]
  pub branches_ttl_secs: u64,
  #[serde(default = "default_issues_ttl")]
  pub issues_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      projects_ttl_secs: default_projects_ttl(),
      pipelines_ttl_secs: default_pipelines_ttl(),
      branches_ttl_secs: default_branches_ttl(),
      issues_ttl_secs: default_issues_ttl(),
    }
  }
}

impl CacheConfig {
  pub fn projects_ttl(&self) -> Duration {
    Duration::from_secs(self.projects_ttl_secs)
  }

  pub fn pipelines_ttl(&self) -> Duration {
    Duration::from_secs(self.pipelines_ttl_secs)
  }

  pub fn branches_ttl(&self) -> Duration {
    Duration::from_secs(self.branches_ttl_secs)
  }

  pub fn issues_ttl(&self) -> Duration {
    Duration::from_secs(self.issues_ttl_secs)
  }
}

fn default_true() -> bool {
  true
}

fn default_projects_ttl() -> u64 {
  60 * 60
}

fn default_pipelines_ttl() -> u64 {
  10
}

fn default_branches_ttl() -> u64 {
  10
}

fn default_issues_ttl() -> u64 {
  30 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
  /// Delay between polls while a pipeline is pending or running
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,
  /// Delay before retrying after a failed status request
  #[serde(default = "default_error_backoff")]
  pub error_backoff_secs: u64,
}

impl Default for WatchConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: default_poll_interval(),
      error_backoff_secs: default_error_backoff(),
    }
  }
}

fn default_poll_interval() -> u64 {
  5
}

fn default_error_backoff() -> u64 {
  1
}

/// Where the watcher delivers its completion notice
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
  /// Bundle id of the launcher application
  #[serde(default = "default_app_bundle")]
  pub app_bundle_id: String,
  /// Bundle id of the workflow that owns the `notify` trigger
  #[serde(default = "default_workflow_bundle")]
  pub workflow_bundle_id: String,
  #[serde(default = "default_trigger")]
  pub trigger: String,
}

impl Default for NotifyConfig {
  fn default() -> Self {
    Self {
      app_bundle_id: default_app_bundle(),
      workflow_bundle_id: default_workflow_bundle(),
      trigger: default_trigger(),
    }
  }
}

fn default_app_bundle() -> String {
  "com.runningwithcrayons.Alfred".to_string()
}

fn default_workflow_bundle() -> String {
  "com.glaunch.gitlab".to_string()
}

fn default_trigger() -> String {
  "notify".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./glaunch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/glaunch/config.yaml
  ///
  /// Unlike an explicit path, a missing implicit file is not an error: every
  /// setting has a default and the launcher usually passes everything through
  /// the environment.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("GITLAB_URL") {
      if !url.trim().is_empty() {
        config.gitlab.url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("glaunch.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("glaunch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty YAML document deserializes to unit, not to an empty map
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the GitLab access token from environment variables.
  ///
  /// Checks GLAUNCH_GITLAB_TOKEN first, then GITLAB_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("GLAUNCH_GITLAB_TOKEN")
      .or_else(|_| std::env::var("GITLAB_TOKEN"))
      .map_err(|_| {
        eyre!(
          "GitLab token not found. Set GLAUNCH_GITLAB_TOKEN or GITLAB_TOKEN environment variable."
        )
      })
  }

  /// Directory holding the cache database and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("glaunch"))
  }
}
