//! Background watcher that follows a pipeline run until it finishes.
//!
//! The watcher runs in its own detached process (see [`spawn_detached`]) so it
//! outlives the launcher invocation that started the pipeline. It keeps no
//! state beyond a [`JobHandle`], polls the remote side directly, and exits
//! after delivering a single notification.
//!
//! There is no cancellation channel and no cap on transient-error retries;
//! an abandoned watcher is expected to be killed.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::gitlab::RemoteClient;
use crate::job::{JobHandle, JobStatus};
use crate::notify::Notifier;

/// Outcome of a completed watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchReport {
  pub handle: JobHandle,
  pub final_status: JobStatus,
  /// Status requests made, successful or not
  pub polls: usize,
  pub transient_errors: usize,
  /// Whether the notifier accepted the notice
  pub notified: bool,
}

pub struct Watcher<C: RemoteClient, N: Notifier> {
  client: C,
  notifier: N,
  poll_interval: Duration,
  error_backoff: Duration,
}

impl<C: RemoteClient, N: Notifier> Watcher<C, N> {
  pub fn new(client: C, notifier: N, config: &WatchConfig) -> Self {
    Self::with_intervals(
      client,
      notifier,
      Duration::from_secs(config.poll_interval_secs),
      Duration::from_secs(config.error_backoff_secs),
    )
  }

  pub fn with_intervals(
    client: C,
    notifier: N,
    poll_interval: Duration,
    error_backoff: Duration,
  ) -> Self {
    Self {
      client,
      notifier,
      poll_interval,
      error_backoff,
    }
  }

  /// Poll until the pipeline reaches a terminal status, then notify once.
  pub async fn run(&self, handle: &JobHandle) -> WatchReport {
    info!(%handle, "watching pipeline");

    let mut polls = 0;
    let mut transient_errors = 0;

    let final_status = loop {
      polls += 1;
      match self
        .client
        .get_pipeline(&handle.project_id, handle.pipeline_id)
        .await
      {
        Ok(pipeline) => {
          let status = pipeline.job_status();
          if status.is_terminal() {
            break status;
          }
          debug!(%handle, %status, "pipeline still in progress");
          tokio::time::sleep(self.poll_interval).await;
        }
        Err(e) => {
          transient_errors += 1;
          warn!(%handle, error = %e, "failed to get pipeline status, retrying");
          tokio::time::sleep(self.error_backoff).await;
        }
      }
    };

    info!(%handle, status = %final_status, polls, "pipeline finished");

    let notified = match self.notifier.notify(handle, &final_status).await {
      Ok(()) => true,
      Err(e) => {
        error!(%handle, error = %e, "notification failed");
        false
      }
    };

    WatchReport {
      handle: handle.clone(),
      final_status,
      polls,
      transient_errors,
      notified,
    }
  }
}

/// Start a watcher for `handle` in a new, detached `glaunch` process.
///
/// The child gets null stdio and, on Unix, its own process group, so it
/// survives the launcher tearing down the parent. Returns the child's pid.
pub fn spawn_detached(handle: &JobHandle, config_path: Option<&Path>) -> Result<u32> {
  let exe =
    std::env::current_exe().map_err(|e| eyre!("Failed to locate current executable: {}", e))?;

  let mut cmd = std::process::Command::new(exe);
  if let Some(path) = config_path {
    cmd.arg("--config").arg(path);
  }
  cmd
    .args(handle.to_watch_args())
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null());

  #[cfg(unix)]
  {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
  }

  // The child is never waited on; it is reparented once this process exits
  let child = cmd
    .spawn()
    .map_err(|e| eyre!("Failed to spawn watcher for {}: {}", handle, e))?;

  info!(%handle, pid = child.id(), "spawned background watcher");
  Ok(child.id())
}
