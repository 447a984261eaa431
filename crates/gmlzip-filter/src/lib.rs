//! Record-level filtering of zip-packaged CityGML datasets.
//!
//! # Architecture
//!
//! - `scan.rs` - Record boundary scanner (line-oriented state machine)
//! - `record.rs` - Keep/drop decisions and the kept-bytes driver
//! - `spec.rs` - Filter specification and selectors
//! - `policy.rs` - Per-entry action, content root, retention
//! - `backend/` - Streaming and staged repackaging strategies
//! - `repack.rs` - Run driver with atomic destination
//! - `report.rs` - Match manifest and run summary
//! - `inspect.rs` - Record listing for authoring specs

pub use backend::{ArchiveBackend, FilterPlan, StagedBackend, StreamingBackend};
pub use error::{Error, Result};
pub use inspect::{DocumentRecords, RecordSummary, inspect};
pub use options::{BackendKind, RepackOptions};
pub use policy::{Action, ContentRoot, RetentionPolicy, classify, clean_path};
pub use record::{Decision, FilterError, FilterOutcome, RecordFilter, filter_records};
pub use repack::{Repackager, repackage};
pub use report::{EntryCounts, FileOutcome, FileSummary, MatchManifest, OutcomeReporter, RunReport};
pub use scan::{BoundaryScanner, MarkerSet, RecordMarkers, RecordSpan, ScanError, Segment};
pub use spec::{FilterSpec, Selector};

pub mod backend;
pub mod entry;
mod error;
mod inspect;
pub mod options;
pub mod policy;
pub mod record;
mod repack;
pub mod report;
pub mod scan;
pub mod spec;
