use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::policy::ContentRoot;

const ALL_TOKEN: &str = "all";

/// Which records of one document to keep.
///
/// Declared as either the literal `"all"` or a list of identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSelector")]
pub enum Selector {
    All,
    ByIds(BTreeSet<String>),
}

impl Selector {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ByIds(ids.into_iter().map(Into::into).collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Token(String),
    Ids(Vec<String>),
}

impl TryFrom<RawSelector> for Selector {
    type Error = String;

    fn try_from(raw: RawSelector) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawSelector::Token(token) if token == ALL_TOKEN => Ok(Self::All),
            RawSelector::Token(token) => Err(format!(
                "expected \"{ALL_TOKEN}\" or a list of identifiers, found \"{token}\""
            )),
            RawSelector::Ids(ids) => Ok(Self::ids(ids)),
        }
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str(ALL_TOKEN),
            Self::ByIds(ids) => serializer.collect_seq(ids),
        }
    }
}

/// Per-document selectors, keyed by rooted archive path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSpec {
    root: ContentRoot,
    entries: BTreeMap<String, Selector>,
}

impl FilterSpec {
    pub fn new(root: ContentRoot) -> Self {
        Self {
            root,
            entries: BTreeMap::new(),
        }
    }

    /// Build a spec from `(path, selector)` pairs.
    ///
    /// Keys may be bare (relative to the content root) or already rooted;
    /// two keys resolving to the same rooted path are rejected.
    pub fn from_entries<I, K>(root: ContentRoot, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Selector)>,
        K: AsRef<str>,
    {
        let mut spec = Self::new(root);
        for (path, selector) in entries {
            spec.insert(path.as_ref(), selector)?;
        }
        Ok(spec)
    }

    pub fn insert(&mut self, path: &str, selector: Selector) -> Result<()> {
        let rooted = self.root.root_path(path);
        if rooted.is_empty() || rooted.ends_with('/') {
            return Err(Error::InvalidSpec {
                reason: format!("'{path}' does not name a file"),
            });
        }
        if self.entries.contains_key(&rooted) {
            return Err(Error::InvalidSpec {
                reason: format!("'{path}' resolves to '{rooted}', which is already declared"),
            });
        }
        self.entries.insert(rooted, selector);
        Ok(())
    }

    pub fn root(&self) -> &ContentRoot {
        &self.root
    }

    /// Look up a key in either bare or rooted form.
    pub fn get(&self, path: &str) -> Option<&Selector> {
        self.entries.get(&self.root.root_path(path))
    }

    /// Look up an archive path without rooting it first.
    pub(crate) fn get_rooted(&self, path: &str) -> Option<&Selector> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selector)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
