//! Source-to-destination strategies.
//!
//! Both backends walk the source in stored order and apply the same policy and
//! record filter; they differ only in where bytes live in between. Decompressed
//! output and the manifest are identical across backends.

use std::io::{self, BufRead, Read, Seek, Write};
use std::path::Path;

use zip::{ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::options::BackendKind;
use crate::policy::{Action, RetentionPolicy, classify};
use crate::record::{FilterError, FilterOutcome, filter_records};
use crate::report::OutcomeReporter;
use crate::scan::MarkerSet;
use crate::spec::{FilterSpec, Selector};

mod staged;
mod streaming;

pub use staged::StagedBackend;
pub use streaming::StreamingBackend;

/// Everything a backend needs to decide and filter, fixed for one run.
pub struct FilterPlan<'a> {
    pub source: &'a Path,
    pub spec: &'a FilterSpec,
    pub retention: &'a RetentionPolicy,
    pub markers: &'a MarkerSet,
}

impl<'a> FilterPlan<'a> {
    pub fn classify(&self, path: &str) -> Action<'a> {
        classify(path, self.spec, self.retention)
    }

    pub(crate) fn source_error(&self, reason: impl Into<String>) -> Error {
        Error::SourceFormat {
            path: self.source.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Filter a document already copied out of the source archive.
    pub(crate) fn filter<R: BufRead, W: Write + ?Sized>(
        &self,
        entry: &str,
        reader: R,
        writer: &mut W,
        selector: &Selector,
    ) -> Result<FilterOutcome> {
        filter_records(reader, writer, self.markers, selector).map_err(|e| match e {
            FilterError::Scan(e) => Error::from_scan(self.source, entry, e),
            FilterError::Write(e) => Error::Io(e),
        })
    }

    /// Filter a document read straight from a source archive member.
    pub(crate) fn filter_member<R: BufRead, W: Write + ?Sized>(
        &self,
        entry: &str,
        reader: R,
        writer: &mut W,
        selector: &Selector,
    ) -> Result<FilterOutcome> {
        filter_records(reader, writer, self.markers, selector).map_err(|e| match e {
            FilterError::Scan(e) => Error::from_member_scan(self.source, entry, e),
            FilterError::Write(e) => Error::Io(e),
        })
    }

    /// Copy a source archive member into `writer`. Read failures (bad CRC,
    /// truncated data) are source errors; write failures are I/O errors.
    pub(crate) fn copy_member<R: Read, W: Write + ?Sized>(
        &self,
        entry: &str,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64> {
        let mut buf = [0u8; 64 * 1024];
        let mut copied = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(copied),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::unreadable(self.source, entry, e)),
            };
            writer.write_all(&buf[..n])?;
            copied += n as u64;
        }
    }
}

/// Moves members of `source` into `sink` according to `plan`.
pub trait ArchiveBackend {
    fn kind(&self) -> BackendKind;

    fn repackage<R, W>(
        &self,
        source: &mut ZipArchive<R>,
        sink: &mut ZipWriter<W>,
        plan: &FilterPlan<'_>,
        reporter: &mut OutcomeReporter<'_>,
    ) -> Result<()>
    where
        R: Read + Seek,
        W: Write + Seek;
}
