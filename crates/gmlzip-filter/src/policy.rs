use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::spec::{FilterSpec, Selector};

/// Top-level archive directory holding record-bearing documents and their companions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContentRoot(String);

impl Default for ContentRoot {
    fn default() -> Self {
        Self::new("udx")
    }
}

impl From<String> for ContentRoot {
    fn from(dir: String) -> Self {
        Self::new(dir)
    }
}

impl From<ContentRoot> for String {
    fn from(root: ContentRoot) -> Self {
        root.0
    }
}

impl ContentRoot {
    pub fn new(dir: impl AsRef<str>) -> Self {
        Self(clean_path(dir.as_ref()).trim_end_matches('/').to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `path` (already cleaned) lies inside the subtree.
    ///
    /// An empty root contains everything.
    pub fn contains(&self, path: &str) -> bool {
        self.0.is_empty()
            || path
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Root a filter key: bare relative keys are joined under the subtree,
    /// already-rooted keys are left alone.
    pub fn root_path(&self, key: &str) -> String {
        let cleaned = clean_path(key);
        if self.contains(&cleaned) {
            cleaned
        } else {
            format!("{}/{}", self.0, cleaned)
        }
    }
}

/// Canonical archive path: forward slashes, no leading `/` or `./`.
pub fn clean_path(path: &str) -> String {
    let mut path = path.replace('\\', "/");
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_owned();
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_owned();
        } else {
            break;
        }
    }
    path
}

/// What to do with unmentioned files inside the content subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Strip companion (non record-bearing) files absent from the filter spec.
    /// Record-bearing files absent from the spec are stripped regardless.
    pub strip_unmentioned_companions: bool,
    /// Extensions of record-bearing documents, compared case-insensitively.
    pub record_extensions: Vec<String>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            strip_unmentioned_companions: true,
            record_extensions: vec!["gml".to_owned()],
        }
    }
}

impl RetentionPolicy {
    pub fn strip_unmentioned_companions(mut self, strip: bool) -> Self {
        self.strip_unmentioned_companions = strip;
        self
    }

    pub fn record_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_record_bearing(&self, path: &str) -> bool {
        let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.record_extensions
            .iter()
            .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action<'a> {
    FilterRecords(&'a Selector),
    PassAll,
    Strip,
}

/// Decide the fate of one archive member.
pub fn classify<'a>(path: &str, spec: &'a FilterSpec, retention: &RetentionPolicy) -> Action<'a> {
    let path = clean_path(path);

    if let Some(selector) = spec.get_rooted(&path) {
        return match selector {
            Selector::All => Action::PassAll,
            Selector::ByIds(_) => Action::FilterRecords(selector),
        };
    }

    if !spec.root().contains(&path) {
        return Action::PassAll;
    }

    if retention.is_record_bearing(&path) || retention.strip_unmentioned_companions {
        Action::Strip
    } else {
        Action::PassAll
    }
}
