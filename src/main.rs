mod cache;
mod commands;
mod config;
mod feedback;
mod gitlab;
mod job;
mod logging;
mod notify;
mod paginate;
mod watcher;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::cache::{CacheLayer, CacheStorage, NoopStorage, SqliteStorage};
use crate::commands::Commands;
use crate::config::Config;
use crate::feedback::{Feedback, Item};
use crate::gitlab::{CachedGitLabClient, GitLabClient};
use crate::job::JobHandle;
use crate::notify::LauncherNotifier;
use crate::watcher::Watcher;

#[derive(Parser, Debug)]
#[command(name = "glaunch")]
#[command(about = "Browse GitLab projects, pipelines, branches and issues from a quick launcher")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/glaunch/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Projects visible to the token
  Project {
    #[command(subcommand)]
    action: Option<ProjectAction>,
  },
  /// CI pipelines of a project
  Pipeline {
    #[command(subcommand)]
    action: PipelineAction,
  },
  /// Branches of a project
  Branch {
    #[command(subcommand)]
    action: ListAction,
  },
  /// Issues of a project
  Issue {
    #[command(subcommand)]
    action: ListAction,
  },
  /// Inspect or reset the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
  List {
    #[arg(long)]
    query: Option<String>,
  },
  /// Resolve one project by id or `group/project` path
  Show {
    #[arg(long)]
    project_id: String,
  },
}

#[derive(Subcommand, Debug)]
enum ListAction {
  List {
    #[arg(long)]
    project_id: String,
    #[arg(long)]
    query: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
enum PipelineAction {
  List {
    #[arg(long)]
    project_id: String,
    #[arg(long)]
    query: Option<String>,
  },
  /// Start a pipeline and watch it in the background
  Run {
    #[arg(long)]
    project_id: String,
    #[arg(long)]
    branch: String,
    /// Sets CI_BUILD_APP on the new pipeline
    #[arg(long)]
    app: Option<String>,
  },
  Cancel {
    #[arg(long)]
    project_id: String,
    #[arg(long)]
    pipeline_id: u64,
  },
  /// Poll a pipeline until it finishes, then notify (runs detached)
  Watch {
    #[arg(long)]
    project_id: String,
    #[arg(long)]
    pipeline_id: u64,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  List,
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let _log_guard = logging::init(&Config::data_dir()?.join("logs"))?;

  match run(&config, args).await {
    Ok(Some(feedback)) => {
      println!("{}", feedback.to_json());
      Ok(())
    }
    // The watcher has no audience on stdout
    Ok(None) => Ok(()),
    Err(e) => fail(e),
  }
}

async fn run(config: &Config, args: Args) -> Result<Option<Feedback>> {
  match args.command {
    Command::Project { action } => {
      let commands = connect(config)?;
      let feedback = match action {
        Some(ProjectAction::Show { project_id }) => commands.show_project(&project_id).await,
        Some(ProjectAction::List { query }) => commands.list_projects(query.as_deref()).await,
        None => commands.list_projects(None).await,
      };
      feedback.map(Some)
    }
    Command::Branch {
      action: ListAction::List { project_id, query },
    } => {
      let commands = connect(config)?;
      commands
        .list_branches(&project_id, query.as_deref())
        .await
        .map(Some)
    }
    Command::Issue {
      action: ListAction::List { project_id, query },
    } => {
      let commands = connect(config)?;
      commands
        .list_issues(&project_id, query.as_deref())
        .await
        .map(Some)
    }
    Command::Pipeline { action } => {
      run_pipeline_action(config, action, args.config.as_deref()).await
    }
    Command::Cache { action } => match action {
      CacheAction::List => {
        let storage = inspect_storage(config, SqliteStorage::open_at)?;
        commands::list_cache(&storage).map(Some)
      }
      CacheAction::Clear => {
        let storage = inspect_storage(config, SqliteStorage::open_or_reset_at)?;
        commands::clear_cache(&storage).map(Some)
      }
    },
  }
}

type AppCommands = Commands<GitLabClient, Box<dyn CacheStorage>>;

/// Storage for listings. A broken cache never blocks a listing.
fn listing_storage(config: &Config) -> Result<Box<dyn CacheStorage>> {
  if !config.cache.enabled {
    return Ok(Box::new(NoopStorage));
  }
  Ok(cache::open_or_bypass(&SqliteStorage::default_path()?))
}

/// Storage for the `cache` subcommand, which reports open errors itself.
fn inspect_storage(
  config: &Config,
  open: fn(&Path) -> Result<SqliteStorage>,
) -> Result<Box<dyn CacheStorage>> {
  if !config.cache.enabled {
    return Ok(Box::new(NoopStorage));
  }
  Ok(Box::new(open(&SqliteStorage::default_path()?)?))
}

fn connect(config: &Config) -> Result<AppCommands> {
  let client = GitLabClient::new(config)?;
  Ok(Commands::new(CachedGitLabClient::new(
    client,
    CacheLayer::new(listing_storage(config)?),
    config.cache.clone(),
    config.gitlab.page_size,
  )))
}

async fn run_pipeline_action(
  config: &Config,
  action: PipelineAction,
  config_path: Option<&Path>,
) -> Result<Option<Feedback>> {
  match action {
    PipelineAction::Watch {
      project_id,
      pipeline_id,
    } => {
      let handle = JobHandle::new(project_id, pipeline_id);
      let watcher = Watcher::new(
        GitLabClient::new(config)?,
        LauncherNotifier::new(config.notify.clone()),
        &config.watch,
      );
      let report = watcher.run(&handle).await;
      info!(?report, "watcher exiting");
      Ok(None)
    }
    PipelineAction::List { project_id, query } => {
      let commands = connect(config)?;
      commands
        .list_pipelines(&project_id, query.as_deref())
        .await
        .map(Some)
    }
    PipelineAction::Run {
      project_id,
      branch,
      app,
    } => {
      let commands = connect(config)?;
      let (mut feedback, handle) = commands
        .run_pipeline(&project_id, &branch, app.as_deref())
        .await;
      if let Some(handle) = handle {
        if let Err(e) = watcher::spawn_detached(&handle, config_path) {
          error!(%handle, error = %e, "could not start watcher");
          feedback.push(Item::new("Failure").subtitle(e.to_string()));
        }
      }
      Ok(Some(feedback))
    }
    PipelineAction::Cancel {
      project_id,
      pipeline_id,
    } => {
      let commands = connect(config)?;
      Ok(Some(commands.cancel_pipeline(&project_id, pipeline_id).await))
    }
  }
}

/// Show the error as a launcher row, then exit non-zero.
fn fail(e: color_eyre::Report) -> Result<()> {
  error!(error = %e, "command failed");
  println!("{}", Feedback::failure(e.to_string()).to_json());
  Err(e)
}
