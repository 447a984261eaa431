use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::FilterOutcome;
use crate::spec::FilterSpec;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    AllKept,
    Matched(BTreeSet<String>),
    NoneMatched,
}

impl FileOutcome {
    pub fn from_matches(matched: BTreeSet<String>) -> Self {
        if matched.is_empty() {
            Self::NoneMatched
        } else {
            Self::Matched(matched)
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoneMatched)
    }
}

/// `"all"` or the list of matched identifiers (empty when nothing matched).
impl Serialize for FileOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::AllKept => serializer.serialize_str("all"),
            Self::Matched(ids) => serializer.collect_seq(ids),
            Self::NoneMatched => serializer.collect_seq(std::iter::empty::<&str>()),
        }
    }
}

/// Outcome per processed, spec-mentioned document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MatchManifest {
    files: BTreeMap<String, FileOutcome>,
}

impl MatchManifest {
    pub fn get(&self, path: &str) -> Option<&FileOutcome> {
        self.files.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileOutcome)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True when at least one file was kept whole or matched an identifier.
    pub fn has_matches(&self) -> bool {
        self.files.values().any(FileOutcome::is_match)
    }

    /// Union of matched identifiers across all files.
    pub fn matched_ids(&self) -> BTreeSet<&str> {
        self.files
            .values()
            .filter_map(|o| match o {
                FileOutcome::Matched(ids) => Some(ids),
                _ => None,
            })
            .flatten()
            .map(String::as_str)
            .collect()
    }

    pub fn summary(&self) -> Vec<FileSummary> {
        self.files
            .iter()
            .map(|(path, outcome)| FileSummary {
                path: path.clone(),
                matched: match outcome {
                    FileOutcome::AllKept => None,
                    FileOutcome::Matched(ids) => Some(ids.len()),
                    FileOutcome::NoneMatched => Some(0),
                },
            })
            .collect()
    }

    fn insert(&mut self, path: &str, outcome: FileOutcome) {
        self.files.insert(path.to_owned(), outcome);
    }
}

/// One line of the run summary. `matched: None` means every record was kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub matched: Option<usize>,
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.matched {
            None => write!(f, "{}: all", self.path),
            Some(n) => write!(f, "{}: {n} matched", self.path),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EntryCounts {
    pub filtered: usize,
    pub passed: usize,
    pub stripped: usize,
    pub omitted: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub manifest: MatchManifest,
    /// Spec paths with no member in the source archive.
    pub missing: Vec<String>,
    pub entries: EntryCounts,
}

/// Collects per-entry outcomes during one run.
pub struct OutcomeReporter<'s> {
    spec: &'s FilterSpec,
    manifest: MatchManifest,
    counts: EntryCounts,
}

impl<'s> OutcomeReporter<'s> {
    pub fn new(spec: &'s FilterSpec) -> Self {
        Self {
            spec,
            manifest: MatchManifest::default(),
            counts: EntryCounts::default(),
        }
    }

    pub fn record(&mut self, path: &str, outcome: FileOutcome) {
        self.manifest.insert(path, outcome);
    }

    /// Copied unchanged, either as a kept-whole document or an unmentioned file.
    pub fn passed(&mut self, path: &str) {
        self.counts.passed += 1;
        if self.spec.get_rooted(path).is_some() {
            info!(entry = path, "keeping all records");
            self.record(path, FileOutcome::AllKept);
        } else {
            debug!(entry = path, "passing through");
        }
    }

    pub fn stripped(&mut self, path: &str) {
        self.counts.stripped += 1;
        debug!(entry = path, "stripping unmentioned entry");
    }

    /// Record a filtered document; returns whether it belongs in the output.
    pub fn filtered(&mut self, path: &str, outcome: FilterOutcome) -> bool {
        let keep = !outcome.matched.is_empty();
        if keep {
            self.counts.filtered += 1;
            info!(
                entry = path,
                matched = outcome.matched.len(),
                kept = outcome.kept,
                dropped = outcome.dropped,
                "filtered records"
            );
        } else {
            self.counts.omitted += 1;
            warn!(entry = path, dropped = outcome.dropped, "no matching records, omitting entry");
        }
        self.record(path, FileOutcome::from_matches(outcome.matched));
        keep
    }

    /// Validate the run. Fails with [`Error::NoMatch`] when nothing was kept.
    pub fn finish(self) -> Result<RunReport> {
        let missing: Vec<String> = self
            .spec
            .paths()
            .filter(|p| self.manifest.get(p).is_none())
            .map(str::to_owned)
            .collect();

        for path in &missing {
            warn!(entry = path.as_str(), "filter path not present in source archive");
        }

        if !self.manifest.has_matches() {
            return Err(Error::NoMatch {
                manifest: self.manifest,
            });
        }

        Ok(RunReport {
            manifest: self.manifest,
            missing,
            entries: self.counts,
        })
    }
}
