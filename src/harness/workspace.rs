use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use walkdir::WalkDir;

use crate::{constants::MANAGED_EXTENSIONS, error::HarnessError, java::util::source_path, util};

/// A directory sources are written to, compiled in and run from.
///
/// One workspace serves one submission at a time: preparing it for a new
/// submission deletes the previous submission's sources and classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Directory backing this workspace.
    root: PathBuf,
}

impl Workspace {
    /// Wraps `root`; nothing is touched on disk until [`Workspace::prepare`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory backing this workspace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory if needed.
    pub fn ensure(&self) -> Result<(), HarnessError> {
        fs::create_dir_all(&self.root).map_err(|e| HarnessError::workspace(&self.root, e))
    }

    /// Removes `*.java` and `*.class` files directly under the workspace and
    /// returns what was removed. Support library subtrees are left alone.
    pub fn clean(&self) -> Result<Vec<PathBuf>, HarnessError> {
        let mut removed = Vec::new();
        for extension in MANAGED_EXTENSIONS {
            for path in util::find_files(extension, 0, &self.root)? {
                if !path.is_file() {
                    continue;
                }
                fs::remove_file(&path).map_err(|e| HarnessError::workspace(&path, e))?;
                removed.push(path);
            }
        }
        if !removed.is_empty() {
            tracing::debug!(
                "Removed {} stale file(s) from {}",
                removed.len(),
                self.root.display()
            );
        }
        Ok(removed)
    }

    /// Copies `support_dir` into the workspace under its own name unless a
    /// directory of that name is already there. Returns whether a copy was
    /// made.
    pub fn install_support(&self, support_dir: &Path) -> Result<bool, HarnessError> {
        let Some(name) = support_dir.file_name() else {
            return Ok(false);
        };
        let target = self.root.join(name);
        if target.exists() {
            return Ok(false);
        }
        copy_tree(support_dir, &target)?;
        tracing::debug!(
            "Copied support library {} into {}",
            support_dir.display(),
            target.display()
        );
        Ok(true)
    }

    /// Writes `source` to `<entry_point>.java` and returns its path.
    pub fn write_source(&self, entry_point: &str, source: &str) -> Result<PathBuf, HarnessError> {
        let path = source_path(&self.root, entry_point);
        fs::write(&path, source).map_err(|e| HarnessError::workspace(&path, e))?;
        Ok(path)
    }

    /// Gets the workspace ready for a new submission: create, clean, install
    /// support files, write the source.
    pub fn prepare(
        &self,
        entry_point: &str,
        source: &str,
        support_dir: Option<&Path>,
    ) -> Result<PathBuf, HarnessError> {
        self.ensure()?;
        self.clean()?;
        if let Some(dir) = support_dir {
            self.install_support(dir)?;
        }
        self.write_source(entry_point, source)
    }
}

/// Recursively copies the directory `from` to `to`.
fn copy_tree(from: &Path, to: &Path) -> Result<(), HarnessError> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            HarnessError::workspace(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .context("walked outside the support directory")?;
        let dst = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dst).map_err(|e| HarnessError::workspace(&dst, e))?;
        } else {
            fs::copy(entry.path(), &dst).map_err(|e| HarnessError::workspace(&dst, e))?;
        }
    }
    Ok(())
}
