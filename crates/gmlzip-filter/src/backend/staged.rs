use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::PathBuf;

use gmlzip_fs::{AtomicFile, Workspace};
use tracing::debug;
use zip::{ZipArchive, ZipWriter};

use super::{ArchiveBackend, FilterPlan};
use crate::entry::EntryMeta;
use crate::error::{Error, Result};
use crate::options::BackendKind;
use crate::policy::{Action, clean_path};
use crate::report::OutcomeReporter;
use crate::spec::Selector;

/// Materialize the archive in a scratch workspace, edit it in place, then
/// re-archive the survivors in the original entry order.
#[derive(Clone, Debug, Default)]
pub struct StagedBackend {
    scratch_dir: Option<PathBuf>,
}

struct StagedEntry {
    path: String,
    relative: PathBuf,
    meta: EntryMeta,
    keep: bool,
}

impl StagedBackend {
    pub fn new(scratch_dir: Option<PathBuf>) -> Self {
        Self { scratch_dir }
    }

    fn extract<R: Read + Seek>(
        &self,
        source: &mut ZipArchive<R>,
        workspace: &Workspace,
        plan: &FilterPlan<'_>,
    ) -> Result<Vec<StagedEntry>> {
        let mut staged = Vec::with_capacity(source.len());

        for index in 0..source.len() {
            let mut file = source
                .by_index(index)
                .map_err(|e| plan.source_error(format!("cannot read entry #{index}: {e}")))?;
            if file.is_dir() {
                continue;
            }

            if file.enclosed_name().is_none() {
                return Err(plan.source_error(format!("entry '{}' has an unsafe path", file.name())));
            }
            let meta = EntryMeta::from_zip(&file);
            let path = clean_path(&meta.name);

            // Names that clean to the same path stay distinct on disk.
            let relative = PathBuf::from(format!("{index:08}"));
            let mut out = BufWriter::new(workspace.create_file(&relative)?);
            plan.copy_member(&path, &mut file, &mut out)?;
            out.flush()?;

            staged.push(StagedEntry {
                path,
                relative,
                meta,
                keep: true,
            });
        }

        debug!(entries = staged.len(), root = %workspace.path().display(), "staged archive");
        Ok(staged)
    }

    fn filter_in_place(
        &self,
        workspace: &Workspace,
        entry: &StagedEntry,
        plan: &FilterPlan<'_>,
        selector: &Selector,
        reporter: &mut OutcomeReporter<'_>,
    ) -> Result<bool> {
        let target = workspace.resolve(&entry.relative);
        let mut output = AtomicFile::create(&target)?;
        let outcome = {
            let input = BufReader::new(workspace.open(&entry.relative)?);
            let mut writer = BufWriter::new(output.file_mut());
            let outcome = plan.filter(&entry.path, input, &mut writer, selector)?;
            writer.flush()?;
            outcome
        };

        let keep = reporter.filtered(&entry.path, outcome);
        if keep {
            output.commit()?;
        } else {
            output.abort()?;
            workspace.remove(&entry.relative)?;
        }
        Ok(keep)
    }
}

/// Every document selected by id must have been staged; a whole-file
/// selection of an absent path is only reported.
fn require_selected(staged: &[StagedEntry], plan: &FilterPlan<'_>) -> Result<()> {
    for (path, selector) in plan.spec.iter() {
        if matches!(selector, Selector::All) {
            continue;
        }
        if !staged.iter().any(|e| e.path == path) {
            return Err(plan.source_error(format!("selected document '{path}' is not in the archive")));
        }
    }
    Ok(())
}

impl ArchiveBackend for StagedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Staged
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
        let workspace = Workspace::new(self.scratch_dir.as_deref())?;
        let mut staged = self.extract(source, &workspace, plan)?;
        require_selected(&staged, plan)?;

        for entry in &mut staged {
            match plan.classify(&entry.path) {
                Action::Strip => {
                    workspace.remove(&entry.relative)?;
                    entry.keep = false;
                    reporter.stripped(&entry.path);
                }
                Action::PassAll => reporter.passed(&entry.path),
                Action::FilterRecords(selector) => {
                    entry.keep = self.filter_in_place(&workspace, entry, plan, selector, reporter)?;
                }
            }
        }

        for entry in staged.iter().filter(|e| e.keep) {
            sink.start_file(entry.meta.name.as_str(), entry.meta.write_options())
                .map_err(Error::archive)?;
            let mut file = workspace.open(&entry.relative)?;
            io::copy(&mut file, sink)?;
        }

        workspace.close()?;
        Ok(())
    }
}
