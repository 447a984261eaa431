use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Output file that only appears at its destination once committed.
///
/// Content is written to a hidden temporary file in the destination's
/// directory and renamed over the destination by [`AtomicFile::commit`].
/// Dropping an uncommitted file deletes the temporary, so an aborted run
/// never leaves a partial destination behind.
pub struct AtomicFile {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl AtomicFile {
    /// Create the temporary output for `destination`, creating missing
    /// parent directories.
    pub fn create(destination: impl AsRef<Path>) -> Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        let parent = match destination.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => return Err(Error::NoParent { path: destination }),
        };

        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|e| Error::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;

        Ok(Self { temp, destination })
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Flush to disk and rename over the destination.
    pub fn commit(self) -> Result<()> {
        self.temp.as_file().sync_all().map_err(|e| Error::Write {
            path: self.temp.path().to_path_buf(),
            source: e,
        })?;

        let destination = self.destination;
        self.temp.persist(&destination).map_err(|e| Error::Commit {
            path: destination.clone(),
            source: e.error,
        })?;

        Ok(())
    }

    /// Discard the output. Equivalent to dropping, but reports removal errors.
    pub fn abort(self) -> Result<()> {
        let path = self.temp.path().to_path_buf();
        self.temp
            .close()
            .map_err(|e| Error::Remove { path, source: e })
    }
}
