#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Asynchronous compile-and-run harness.
//!
//! A caller submits source text, gets a [`Submission`] handle back right
//! away, and polls it until the lifecycle reaches `Done`. Compilation and the
//! time-boxed run happen on a background task.

/// Key/value snapshots returned by the polling API.
pub mod snapshot;
/// Lifecycle lanes, result codes and the per-submission state machine.
pub mod status;
/// Submission handles and their lock-guarded state.
pub mod submission;
/// Workspace preparation.
pub mod workspace;
/// The background compile/run task.
mod worker;

use std::time::Duration;

use tokio::time::sleep;

pub use self::{
    snapshot::{DetailFlags, Snapshot},
    status::{Lifecycle, Phase, ResultCode},
    submission::{CompileOutcome, ExecutionOutcome, Submission, SubmissionState},
    workspace::Workspace,
};
use crate::{config, config::HarnessConfig, error::HarnessError, java::util::is_valid_entry_point};

/// Compiles and runs single-file Java programs in a workspace, one
/// submission at a time.
#[derive(Debug, Clone)]
pub struct ExecHarness {
    /// Budgets, toolchain and workspace for this harness.
    config:    HarnessConfig,
    /// The workspace every submission is written to.
    workspace: Workspace,
}

impl ExecHarness {
    /// Creates a harness; nothing touches the disk until the first submit.
    pub fn new(config: HarnessConfig) -> Self {
        let workspace = Workspace::new(config.workspace());
        Self { config, workspace }
    }

    /// This harness's configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// This harness's workspace.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Writes `source` to `<entry_point>.java` in the workspace and starts
    /// compiling and running it in the background with `stdin` as input.
    ///
    /// Returns as soon as the source is on disk. Only problems with the
    /// harness itself (empty source, unusable entry point, unwritable
    /// workspace) are errors; everything else shows up in the submission's
    /// status.
    ///
    /// Submissions to the same workspace must not overlap: preparing the
    /// workspace deletes the previous submission's classes.
    pub fn submit(
        &self,
        source: impl Into<String>,
        entry_point: impl Into<String>,
        stdin: impl Into<String>,
    ) -> Result<Submission, HarnessError> {
        let source = source.into();
        let entry_point = entry_point.into();
        if source.is_empty() {
            return Err(HarnessError::EmptySource);
        }
        if !is_valid_entry_point(&entry_point) {
            return Err(HarnessError::InvalidEntryPoint(entry_point));
        }

        self.workspace
            .prepare(&entry_point, &source, self.config.support_dir())?;
        let root = self
            .workspace
            .root()
            .canonicalize()
            .map_err(|e| HarnessError::workspace(self.workspace.root(), e))?;

        let submission = Submission::new(source, entry_point, stdin.into(), root);
        tracing::debug!(
            "[{}] submitted {} to {}",
            submission.id(),
            submission.entry_point(),
            submission.workspace().display()
        );

        let handle = config::runtime_handle()?;
        let worker = handle.spawn(worker::run(submission.clone(), self.config.clone()));
        let watched = submission.clone();
        handle.spawn(async move {
            if let Err(e) = worker.await {
                tracing::error!("[{}] worker stopped: {e}", watched.id());
                watched
                    .lock()
                    .abort(&format!("Internal error with the code checking system: {e}"));
            }
        });
        Ok(submission)
    }

    /// `error`, `status` and `result` of `submission`.
    pub fn poll_status(&self, submission: &Submission) -> Snapshot {
        submission.status()
    }

    /// Timing, codes and whichever optional fields `flags` asks for.
    pub fn poll_details(&self, submission: &Submission, flags: DetailFlags) -> Snapshot {
        submission.details(flags)
    }

    /// Sleep-polls `submission` until it is done and returns the final status.
    pub async fn wait(&self, submission: &Submission) -> Snapshot {
        self.wait_with(submission, crate::constants::DEFAULT_WAIT_INTERVAL, |_| {})
            .await
    }

    /// Like [`ExecHarness::wait`], calling `on_change` whenever the lifecycle
    /// lane changes.
    pub async fn wait_with(
        &self,
        submission: &Submission,
        interval: Duration,
        mut on_change: impl FnMut(Lifecycle),
    ) -> Snapshot {
        let mut last = None;
        loop {
            let status = self.poll_status(submission);
            let lifecycle = status.lifecycle();
            if lifecycle != last {
                if let Some(lane) = lifecycle {
                    on_change(lane);
                }
                last = lifecycle;
            }
            if status.is_done() {
                return status;
            }
            sleep(interval).await;
        }
    }
}

impl Default for ExecHarness {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}
