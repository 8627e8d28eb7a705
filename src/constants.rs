#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

/// Wall-clock budget for a single run of a submission.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_millis(3000);

/// Upper bound on how long javac may take before the compile is abandoned.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the supervising loop checks the child, its output queue and the
/// clock.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to keep collecting stdout/stderr after the child exits or is
/// killed.
pub const DEFAULT_OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Default interval between status polls in [`crate::harness::ExecHarness::wait`].
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(50);

/// Name of the Java compiler executable.
pub const JAVAC: &str = "javac";

/// Name of the Java runtime executable.
pub const JAVA: &str = "java";

/// Extension of generated source files.
pub const SOURCE_EXTENSION: &str = "java";

/// Extension of compiled artifacts.
pub const ARTIFACT_EXTENSION: &str = "class";

/// Extensions the workspace hygiene pass removes before each submission.
pub const MANAGED_EXTENSIONS: [&str; 2] = [SOURCE_EXTENSION, ARTIFACT_EXTENSION];

/// Value of the `error` key when nothing went wrong at the transport level.
pub const ERROR_OK: &str = "OK";

/// Format used for the `date` key of detail snapshots.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Keys used in status and detail snapshots.
pub mod keys {
    /// Transport-level error marker.
    pub const ERROR: &str = "error";
    /// Lifecycle lane.
    pub const STATUS: &str = "status";
    /// Fine-grained outcome.
    pub const RESULT: &str = "result";
    /// Elapsed execution time in seconds.
    pub const TIME: &str = "time";
    /// Submission creation date.
    pub const DATE: &str = "date";
    /// Memory used, never measured.
    pub const MEMORY: &str = "memory";
    /// Exit code or terminating signal of the run.
    pub const SIGNAL: &str = "signal";
    /// Whether the run was public, always false.
    pub const PUBLIC: &str = "public";
    /// Submitted source text.
    pub const SOURCE: &str = "source";
    /// Stdin payload.
    pub const INPUT: &str = "input";
    /// Captured stdout.
    pub const OUTPUT: &str = "output";
    /// Captured stderr.
    pub const STDERR: &str = "stderr";
    /// Captured compiler output.
    pub const CMPINFO: &str = "cmpinfo";
}
