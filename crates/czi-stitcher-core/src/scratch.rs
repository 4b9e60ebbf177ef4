use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, StitcherError};

/// A directory for intermediate files.
///
/// Nothing is created on construction and nothing is deleted on drop; the
/// owner decides when to [`create`](Self::create), [`purge`](Self::purge) or
/// [`remove`](Self::remove) it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Use exactly `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use a randomly named child of `parent`: eight uppercase hex characters.
    pub fn within(parent: impl AsRef<Path>) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        Self {
            path: parent.as_ref().join(&id[..8]),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory. Fails if anything already exists at the path.
    pub fn create(&self) -> Result<()> {
        debug!(path = %self.path.display(), "Creating scratch directory");
        fs::create_dir(&self.path).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                StitcherError::Usage(format!(
                    "cannot create '{}': it already exists; remove it first or pass a parent directory",
                    self.path.display()
                ))
            } else {
                StitcherError::Io(e)
            }
        })
    }

    /// Create the directory and its parents unless it already exists.
    pub fn ensure(&self) -> Result<()> {
        if !self.path.is_dir() {
            debug!(path = %self.path.display(), "Creating scratch directory");
            fs::create_dir_all(&self.path)?;
        }
        Ok(())
    }

    /// Delete every file and sub-directory, keeping the directory itself.
    pub fn purge(&self) -> Result<()> {
        if !self.path.is_dir() {
            return Err(StitcherError::NotFound(self.path.clone()));
        }
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        debug!(path = %self.path.display(), "Purged scratch directory");
        Ok(())
    }

    /// Purge, then delete the directory itself.
    pub fn remove(self) -> Result<()> {
        self.purge()?;
        fs::remove_dir(&self.path)?;
        debug!(path = %self.path.display(), "Removed scratch directory");
        Ok(())
    }
}
