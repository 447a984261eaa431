use std::io::{BufReader, Read, Seek, Write};

use zip::{ZipArchive, ZipWriter};

use super::{ArchiveBackend, FilterPlan};
use crate::entry::EntryMeta;
use crate::error::{Error, Result};
use crate::options::BackendKind;
use crate::policy::{Action, clean_path};
use crate::report::OutcomeReporter;

/// Entry-to-entry repackaging; passthrough members are raw-copied without
/// recompression and filtered members are streamed straight into the sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamingBackend;

impl ArchiveBackend for StreamingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Streaming
    }

    fn repackage<R, W>(
        &self,
        source: &mut ZipArchive<R>,
        sink: &mut ZipWriter<W>,
        plan: &FilterPlan<'_>,
        reporter: &mut OutcomeReporter<'_>,
    ) -> Result<()>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        for index in 0..source.len() {
            let file = source
                .by_index(index)
                .map_err(|e| plan.source_error(format!("cannot read entry #{index}: {e}")))?;
            if file.is_dir() {
                continue;
            }

            let path = clean_path(file.name());
            match plan.classify(&path) {
                Action::Strip => reporter.stripped(&path),
                Action::PassAll => {
                    sink.raw_copy_file(file).map_err(Error::archive)?;
                    reporter.passed(&path);
                }
                Action::FilterRecords(selector) => {
                    let meta = EntryMeta::from_zip(&file);
                    sink.start_file(meta.name.as_str(), meta.write_options())
                        .map_err(Error::archive)?;

                    let outcome = plan.filter_member(&path, BufReader::new(file), sink, selector)?;
                    if !reporter.filtered(&path, outcome) {
                        sink.abort_file().map_err(Error::archive)?;
                    }
                }
            }
        }
        Ok(())
    }
}
