#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use thiserror::Error;

/// Harness-level failures that propagate out of
/// [`crate::harness::ExecHarness::submit`].
///
/// Anything that is the fault of a single submission (bad source, crash,
/// timeout, missing toolchain) is recorded in its status instead.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The submitted source text was empty.
    #[error("Cannot submit empty source code")]
    EmptySource,
    /// The entry point name cannot be used as a Java class/file name.
    #[error("`{0}` is not a valid entry point name")]
    InvalidEntryPoint(String),
    /// The workspace could not be created, cleaned or written to.
    #[error("Workspace {path} is unusable: {source}")]
    Workspace {
        /// Path that failed.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Anything else.
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl HarnessError {
    /// Wraps an I/O error with the path it happened on.
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Workspace {
            path: path.into(),
            source,
        }
    }
}
