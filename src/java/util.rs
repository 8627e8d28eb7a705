use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::constants::SOURCE_EXTENSION;

/// Returns true if `name` can be used as a top-level Java class name and hence
/// as the stem of the generated source file.
pub fn is_valid_entry_point(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Path of the generated source file for `entry_point` inside `workspace`.
pub fn source_path(workspace: &Path, entry_point: &str) -> PathBuf {
    workspace.join(format!("{entry_point}.{SOURCE_EXTENSION}"))
}

/// Arguments for compiling `source` into `workspace`.
pub fn javac_args(workspace: &Path, source: &Path) -> Vec<OsString> {
    vec![
        "-d".into(),
        workspace.as_os_str().to_owned(),
        "--source-path".into(),
        workspace.as_os_str().to_owned(),
        "-Xdiags:verbose".into(),
        source.as_os_str().to_owned(),
    ]
}

/// Arguments for running `entry_point` with `workspace` as the class path.
pub fn java_args(workspace: &Path, entry_point: &str) -> Vec<OsString> {
    vec![
        "--class-path".into(),
        workspace.as_os_str().to_owned(),
        entry_point.into(),
    ]
}
