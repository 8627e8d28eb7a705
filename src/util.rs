#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{Pattern, glob};
use which::which;

/// Returns true if `executable` can be found on PATH (or, if it contains a
/// path separator, exists and is executable).
pub fn is_toolchain_available(executable: &str) -> bool {
    which(executable).is_ok()
}

/// Resolves `executable` on PATH.
pub fn resolve_executable(executable: &str) -> Result<PathBuf> {
    which(executable).with_context(|| format!("Cannot find `{executable}` on path"))
}

/// A glob utility function to find paths to files with certain extension
///
/// * `extension`: the file extension to find paths for
/// * `search_depth`: how many folders deep to search for, 0 for `root_dir`
///   only
/// * `root_dir`: the root directory where search starts; glob metacharacters
///   in it are matched literally
pub fn find_files(extension: &str, search_depth: i8, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let root = root_dir
        .to_str()
        .context("Could not convert root_dir to string")?;
    let mut pattern = PathBuf::from(Pattern::escape(root));

    for _ in 0..search_depth {
        pattern.push("**");
    }

    pattern.push(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert pattern to string")?
        .to_string();

    Ok(glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect())
}

/// Lossily decodes captured process output.
pub fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_not_available() {
        assert!(!is_toolchain_available("automark-no-such-compiler-3f9a"));
    }

    #[cfg(unix)]
    #[test]
    fn shell_is_available() {
        assert!(is_toolchain_available("sh"));
    }

    #[test]
    fn find_files_only_matches_extension_at_depth_zero() {
        let root = std::env::temp_dir().join(format!("automark-util-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("A.class"), b"").unwrap();
        std::fs::write(root.join("A.java"), b"").unwrap();
        std::fs::write(root.join("nested/B.class"), b"").unwrap();

        let found = find_files("class", 0, &root).unwrap();
        assert_eq!(found, vec![root.join("A.class")]);

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn find_files_treats_brackets_in_root_literally() {
        let base = std::env::temp_dir().join(format!("automark-util-{}", uuid::Uuid::new_v4()));
        for name in ["grader[1]", "a[b"] {
            let root = base.join(name);
            std::fs::create_dir_all(&root).unwrap();
            std::fs::write(root.join("Old.class"), b"").unwrap();

            let found = find_files("class", 0, &root).unwrap();
            assert_eq!(found, vec![root.join("Old.class")], "{name}");
        }
        let _ = std::fs::remove_dir_all(base);
    }
}
