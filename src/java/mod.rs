#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// javac diagnostics and stack-trace helpers.
pub mod diagnostics;
/// Parsers for javac output and java stack traces.
pub mod parsers;
/// javac/java command lines and naming rules.
pub mod util;

pub use diagnostics::{DiagnosticSeverity, JavacDiagnostic, parse_javac_output, parse_stack_trace};
