use std::io;
use std::path::{Path, PathBuf};

use crate::report::MatchManifest;
use crate::scan::ScanError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid source archive '{path}': {reason}")]
    SourceFormat { path: PathBuf, reason: String },

    #[error("malformed records in '{entry}': {source}")]
    MalformedRecord { entry: String, source: ScanError },

    #[error("no records matched the filter specification ({} files checked)", .manifest.len())]
    NoMatch { manifest: MatchManifest },

    #[error("invalid filter specification: {reason}")]
    InvalidSpec { reason: String },

    #[error("invalid record markers: {source}")]
    InvalidMarker { source: regex::Error },

    #[error("failed to write destination archive: {source}")]
    Archive { source: zip::result::ZipError },

    #[error(transparent)]
    Fs(#[from] gmlzip_fs::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Attach entry context to a scanner failure.
    ///
    /// Nesting and termination violations are structural; undecodable text
    /// means the member is not a readable document at all.
    pub(crate) fn from_scan(archive: &Path, entry: &str, err: ScanError) -> Self {
        match err {
            ScanError::Io(e) => Self::Io(e),
            err if err.is_structural() => Self::MalformedRecord {
                entry: entry.to_owned(),
                source: err,
            },
            err => Self::SourceFormat {
                path: archive.to_path_buf(),
                reason: format!("'{entry}': {err}"),
            },
        }
    }

    /// As [`Error::from_scan`], for a scanner reading straight from the
    /// source archive, where a failed read means a corrupt member.
    pub(crate) fn from_member_scan(archive: &Path, entry: &str, err: ScanError) -> Self {
        match err {
            ScanError::Io(e) => Self::unreadable(archive, entry, e),
            err => Self::from_scan(archive, entry, err),
        }
    }

    pub(crate) fn unreadable(archive: &Path, entry: &str, err: io::Error) -> Self {
        Self::SourceFormat {
            path: archive.to_path_buf(),
            reason: format!("cannot read '{entry}': {err}"),
        }
    }

    pub(crate) fn archive(source: zip::result::ZipError) -> Self {
        Self::Archive { source }
    }

    pub fn manifest(&self) -> Option<&MatchManifest> {
        match self {
            Self::NoMatch { manifest } => Some(manifest),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
