use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::{ContentRoot, RetentionPolicy};
use crate::scan::RecordMarkers;
use crate::spec::{FilterSpec, Selector};

/// How archive members move from source to destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Entry to entry, nothing staged on disk.
    #[default]
    Streaming,
    /// Extract to a scratch directory, edit in place, re-archive.
    Staged,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "streaming" => Ok(Self::Streaming),
            "staged" => Ok(Self::Staged),
            other => Err(format!("unknown backend '{other}', expected 'streaming' or 'staged'")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Streaming => "streaming",
            Self::Staged => "staged",
        })
    }
}

/// Settings for one repackaging run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepackOptions {
    pub content_root: ContentRoot,
    pub markers: RecordMarkers,
    pub retention: RetentionPolicy,
    pub backend: BackendKind,
    /// Parent directory for the staged backend's workspace.
    pub scratch_dir: Option<PathBuf>,
}

impl RepackOptions {
    pub fn content_root(mut self, root: impl AsRef<str>) -> Self {
        self.content_root = ContentRoot::new(root);
        self
    }

    pub fn markers(mut self, markers: RecordMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn strip_unmentioned_companions(mut self, strip: bool) -> Self {
        self.retention.strip_unmentioned_companions = strip;
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Build a [`FilterSpec`] rooted at this run's content root.
    pub fn filter_spec<I, K>(&self, entries: I) -> Result<FilterSpec>
    where
        I: IntoIterator<Item = (K, Selector)>,
        K: AsRef<str>,
    {
        FilterSpec::from_entries(self.content_root.clone(), entries)
    }
}
