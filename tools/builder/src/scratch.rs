//! Scoped temporaries.
//!
//! [`Scratch`] holds intermediate files (manifests, test archives, the
//! generated main source) for one invocation. [`StagedOutput`] gives the
//! tool a private place next to the requested output so the result can be
//! published with a single rename. Both are removed on drop, so a failing
//! action leaves nothing behind.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::BuildError;
use crate::verbose::vprintln;

/// Per-invocation scratch directory.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> Result<Self, BuildError> {
        let dir = tempfile::Builder::new()
            .prefix("builder-")
            .tempdir()
            .map_err(|e| BuildError::io(std::env::temp_dir(), e))?;
        vprintln!("  scratch: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the scratch directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Remove the directory now, reporting failures that drop would swallow.
    pub fn close(self) -> Result<(), BuildError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| BuildError::io(path, e))
    }
}

/// An output file staged in a hidden sibling directory of its destination.
pub struct StagedOutput {
    dir: TempDir,
    staged: PathBuf,
    dest: PathBuf,
}

impl StagedOutput {
    pub fn new(dest: &Path) -> Result<Self, BuildError> {
        let Some(file_name) = dest.file_name() else {
            return Err(BuildError::Usage(format!(
                "output path {} does not name a file",
                dest.display()
            )));
        };
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let dir = tempfile::Builder::new()
            .prefix(".builder-")
            .tempdir_in(parent)
            .map_err(|e| BuildError::io(parent, e))?;
        let staged = dir.path().join(file_name);
        Ok(Self {
            dir,
            staged,
            dest: dest.to_path_buf(),
        })
    }

    /// Where the tool should write its output.
    pub fn path(&self) -> &Path {
        &self.staged
    }

    /// Move the staged file to its destination.
    pub fn publish(self) -> Result<PathBuf, BuildError> {
        fs::rename(&self.staged, &self.dest).map_err(|e| BuildError::io(&self.staged, e))?;
        let dir = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| BuildError::io(dir, e))?;
        vprintln!("  wrote {}", self.dest.display());
        Ok(self.dest)
    }
}

/// End a successful action: remove the scratch directory, then publish.
///
/// Cleanup runs first so a reported failure never leaves a fresh artifact
/// at the destination.
pub fn finish(scratch: Scratch, staged: StagedOutput) -> Result<PathBuf, BuildError> {
    scratch.close()?;
    staged.publish()
}
