//! Completion notices delivered by the background watcher.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use tokio::process::Command;
use tracing::debug;

use crate::config::NotifyConfig;
use crate::job::{JobHandle, JobStatus};

/// Fire-and-forget sink for a pipeline's final status.
pub trait Notifier: Send + Sync {
  fn notify(
    &self,
    handle: &JobHandle,
    status: &JobStatus,
  ) -> impl Future<Output = Result<()>> + Send;
}

/// Runs the launcher workflow's external trigger through `osascript`.
///
/// The trigger receives `project:pipeline:status` as its argument and is
/// responsible for showing the alert.
pub struct LauncherNotifier {
  config: NotifyConfig,
}

impl LauncherNotifier {
  pub fn new(config: NotifyConfig) -> Self {
    Self { config }
  }

  fn script(&self, argument: &str) -> String {
    format!(
      "tell application id \"{}\" to run trigger \"{}\" in workflow \"{}\" with argument \"{}\"",
      escape_applescript(&self.config.app_bundle_id),
      escape_applescript(&self.config.trigger),
      escape_applescript(&self.config.workflow_bundle_id),
      escape_applescript(argument),
    )
  }
}

/// The argument handed to the launcher trigger.
pub fn trigger_argument(handle: &JobHandle, status: &JobStatus) -> String {
  format!("{}:{}", handle, status)
}

impl Notifier for LauncherNotifier {
  async fn notify(&self, handle: &JobHandle, status: &JobStatus) -> Result<()> {
    let script = self.script(&trigger_argument(handle, status));
    debug!(%script, "running launcher trigger");

    let output = Command::new("osascript")
      .arg("-e")
      .arg(&script)
      .output()
      .await
      .map_err(|e| eyre!("Failed to run osascript: {}", e))?;

    let combined = format!(
      "{}{}",
      String::from_utf8_lossy(&output.stdout),
      String::from_utf8_lossy(&output.stderr)
    )
    .replace('\n', "");

    // Dismissing the alert is not a failure
    if !output.status.success() && !combined.contains("User canceled.") {
      return Err(eyre!(
        "osascript exited with {}: {}",
        output.status,
        combined
      ));
    }

    Ok(())
  }
}

fn escape_applescript(s: &str) -> String {
  s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_trigger_argument() {
    let handle = JobHandle::new("42", 812);
    let status = JobStatus::from("success");
    assert_eq!(trigger_argument(&handle, &status), "42:812:success");
  }

  #[test]
  fn test_script_targets_configured_workflow() {
    let notifier = LauncherNotifier::new(NotifyConfig::default());
    let script = notifier.script("42:812:failed");
    assert_eq!(
      script,
      "tell application id \"com.runningwithcrayons.Alfred\" to run trigger \"notify\" \
       in workflow \"com.glaunch.gitlab\" with argument \"42:812:failed\""
    );
  }

  #[test]
  fn test_script_escapes_quotes() {
    let notifier = LauncherNotifier::new(NotifyConfig::default());
    let script = notifier.script(r#"a"b\c"#);
    assert!(script.ends_with(r#"with argument "a\"b\\c""#));
  }
}
