#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use anyhow::{Context, Result};
use bon::Builder;
use tokio::runtime::{Handle, Runtime};

use crate::constants::{
    DEFAULT_COMPILE_TIMEOUT, DEFAULT_OUTPUT_GRACE, DEFAULT_POLL_INTERVAL, DEFAULT_TIME_LIMIT,
    JAVA, JAVAC,
};

/// Workspace used when nothing else is configured.
const DEFAULT_WORKSPACE: &str = "build";

/// Configuration for one [`crate::harness::ExecHarness`].
///
/// Every harness owns its own copy, so harnesses with different budgets or
/// workspaces can coexist in one process (e.g. one per grading worker).
#[derive(Debug, Clone, Builder)]
pub struct HarnessConfig {
    /// Directory where sources are written, compiled and run.
    #[builder(into)]
    workspace:       PathBuf,
    /// Wall-clock budget for the run step.
    #[builder(default = DEFAULT_TIME_LIMIT)]
    time_limit:      Duration,
    /// Deadline for the compile step.
    #[builder(default = DEFAULT_COMPILE_TIMEOUT)]
    compile_timeout: Duration,
    /// Sleep between iterations of the run supervision loop.
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    poll_interval:   Duration,
    /// How long to keep draining output after the child is gone.
    #[builder(default = DEFAULT_OUTPUT_GRACE)]
    output_grace:    Duration,
    /// Compiler executable, looked up on PATH.
    #[builder(into, default = JAVAC.to_string())]
    compiler:        String,
    /// Runtime executable, looked up on PATH.
    #[builder(into, default = JAVA.to_string())]
    runtime:         String,
    /// Optional directory copied into the workspace the first time it is
    /// missing there (e.g. shim classes student code imports).
    #[builder(into)]
    support_dir:     Option<PathBuf>,
}

impl HarnessConfig {
    /// Creates a configuration with default budgets for `workspace`.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self::builder().workspace(workspace).build()
    }

    /// Builds a configuration from `AUTOMARK_*` environment variables, falling
    /// back to defaults for anything missing or unparsable.
    pub fn from_env() -> Self {
        let workspace = std::env::var("AUTOMARK_WORKSPACE")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());

        let support_dir = std::env::var("AUTOMARK_SUPPORT_DIR")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Self::builder()
            .workspace(workspace)
            .time_limit(read_secs_f64("AUTOMARK_TIME_LIMIT_SECS", DEFAULT_TIME_LIMIT))
            .compile_timeout(read_secs_f64(
                "AUTOMARK_COMPILE_TIMEOUT_SECS",
                DEFAULT_COMPILE_TIMEOUT,
            ))
            .poll_interval(read_millis("AUTOMARK_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL))
            .compiler(read_string("AUTOMARK_JAVAC", JAVAC))
            .runtime(read_string("AUTOMARK_JAVA", JAVA))
            .maybe_support_dir(support_dir)
            .build()
    }

    /// Returns a copy of this configuration with a different workspace.
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Returns a copy of this configuration with a different time limit.
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    /// Workspace directory.
    pub fn workspace(&self) -> &Path {
        self.workspace.as_path()
    }

    /// Wall-clock budget for the run step.
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Deadline for the compile step.
    pub fn compile_timeout(&self) -> Duration {
        self.compile_timeout
    }

    /// Sleep between supervision loop iterations.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Output drain grace period.
    pub fn output_grace(&self) -> Duration {
        self.output_grace
    }

    /// Compiler executable name.
    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    /// Runtime executable name.
    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// Support library directory, if any.
    pub fn support_dir(&self) -> Option<&Path> {
        self.support_dir.as_deref()
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORKSPACE)
    }
}

/// Runtime used for background workers when the caller is not already inside
/// a tokio runtime.
static FALLBACK_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Returns a handle to the ambient tokio runtime, or to a process-wide
/// multi-threaded runtime created on first use.
pub fn runtime_handle() -> Result<Handle> {
    if let Ok(handle) = Handle::try_current() {
        return Ok(handle);
    }
    if let Some(runtime) = FALLBACK_RUNTIME.get() {
        return Ok(runtime.handle().clone());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("automark-worker")
        .build()
        .context("Failed to start background runtime")?;
    Ok(FALLBACK_RUNTIME.get_or_init(|| runtime).handle().clone())
}

/// Parses an environment variable holding (fractional) seconds.
fn read_secs_f64(env: &str, default: Duration) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(default)
}

/// Parses an environment variable holding milliseconds.
fn read_millis(env: &str, default: Duration) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Reads a non-empty string from the environment.
fn read_string(env: &str, default: &str) -> String {
    std::env::var(env)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
