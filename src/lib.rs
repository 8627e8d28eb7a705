//! # automark
//!
//! Compiles and runs single-file Java submissions out of process, with a
//! wall-clock budget, behind a polling API shaped like a remote judging
//! service: submit, poll the status until it is done, then fetch details.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Per-harness configuration
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// Harness-level errors
pub mod error;
/// The compile-and-run harness and its polling API
pub mod harness;
/// javac/java specifics: command lines, diagnostics, parsers
pub mod java;
/// Subprocess plumbing
pub mod process;
/// Shared small types
pub mod types;
/// Utility functions for convenience
pub mod util;

pub use config::HarnessConfig;
pub use error::HarnessError;
pub use harness::{
    DetailFlags, ExecHarness, Lifecycle, ResultCode, Snapshot, Submission, Workspace,
};
pub use util::is_toolchain_available;
