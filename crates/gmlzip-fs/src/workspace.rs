use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{Error, Result};

/// Scratch directory used to materialize an archive for in-place editing.
///
/// The directory and everything in it are removed on drop.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a workspace under `parent`, or under the system temp directory.
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("gmlzip-stage-");

        let dir = match parent {
            Some(parent) => {
                if !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| Error::Create {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
                }
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::Create {
            path: parent.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            source: e,
        })?;

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Create (or truncate) a file inside the workspace, creating parent directories.
    pub fn create_file(&self, relative: &Path) -> Result<File> {
        let full_path = self.resolve(relative);
        if let Some(parent) = full_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Create {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        File::create(&full_path).map_err(|e| Error::Create {
            path: full_path,
            source: e,
        })
    }

    pub fn open(&self, relative: &Path) -> Result<File> {
        let full_path = self.resolve(relative);
        File::open(&full_path).map_err(|e| Error::Read {
            path: full_path,
            source: e,
        })
    }

    pub fn remove(&self, relative: &Path) -> Result<()> {
        let full_path = self.resolve(relative);
        std::fs::remove_file(&full_path).map_err(|e| Error::Remove {
            path: full_path,
            source: e,
        })
    }

    /// Remove the workspace now, reporting any cleanup failure.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| Error::Remove { path, source: e })
    }
}
