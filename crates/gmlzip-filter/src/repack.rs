use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use gmlzip_fs::AtomicFile;
use tracing::{debug, info, warn};
use zip::{ZipArchive, ZipWriter};

use crate::backend::{ArchiveBackend, FilterPlan, StagedBackend, StreamingBackend};
use crate::error::{Error, Result};
use crate::options::{BackendKind, RepackOptions};
use crate::report::{OutcomeReporter, RunReport};
use crate::spec::FilterSpec;

/// Drives one filtering run from a source archive to a destination archive.
#[derive(Clone, Debug)]
pub struct Repackager {
    spec: FilterSpec,
    options: RepackOptions,
}

impl Repackager {
    pub fn new(spec: FilterSpec, options: RepackOptions) -> Self {
        if spec.root() != &options.content_root {
            warn!(
                spec_root = spec.root().as_str(),
                options_root = options.content_root.as_str(),
                "filter spec and options disagree on the content root; using the spec's"
            );
        }
        Self { spec, options }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn options(&self) -> &RepackOptions {
        &self.options
    }

    /// Filter `source` into `destination`.
    ///
    /// The destination only appears once every entry has been written and at
    /// least one record matched. On any error, including [`Error::NoMatch`],
    /// nothing is left at `destination`.
    pub fn run(&self, source: &Path, destination: &Path) -> Result<RunReport> {
        let markers = self
            .options
            .markers
            .compile()
            .map_err(|source| Error::InvalidMarker { source })?;

        let file = File::open(source).map_err(|e| Error::SourceFormat {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| Error::SourceFormat {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!(
            source = %source.display(),
            destination = %destination.display(),
            entries = archive.len(),
            backend = %self.options.backend,
            "repackaging archive"
        );

        let plan = FilterPlan {
            source,
            spec: &self.spec,
            retention: &self.options.retention,
            markers: &markers,
        };
        let mut reporter = OutcomeReporter::new(&self.spec);

        let mut output = AtomicFile::create(destination)?;
        debug!(temp = %output.temp_path().display(), "writing temporary archive");
        {
            let mut sink = ZipWriter::new(BufWriter::new(output.file_mut()));
            match self.options.backend {
                BackendKind::Streaming => {
                    self.drive(&StreamingBackend, &mut archive, &mut sink, &plan, &mut reporter)?
                }
                BackendKind::Staged => {
                    let backend = StagedBackend::new(self.options.scratch_dir.clone());
                    self.drive(&backend, &mut archive, &mut sink, &plan, &mut reporter)?
                }
            }
            let mut buffered = sink.finish().map_err(Error::archive)?;
            buffered.flush()?;
        }

        let report = reporter.finish()?;
        info!(
            destination = %output.destination().display(),
            files = report.manifest.len(),
            filtered = report.entries.filtered,
            passed = report.entries.passed,
            stripped = report.entries.stripped,
            omitted = report.entries.omitted,
            "committing filtered archive"
        );
        output.commit()?;
        Ok(report)
    }

    fn drive<B, R, W>(
        &self,
        backend: &B,
        archive: &mut ZipArchive<R>,
        sink: &mut ZipWriter<W>,
        plan: &FilterPlan<'_>,
        reporter: &mut OutcomeReporter<'_>,
    ) -> Result<()>
    where
        B: ArchiveBackend,
        R: Read + Seek,
        W: Write + Seek,
    {
        debug!(backend = %backend.kind(), "starting backend");
        backend.repackage(archive, sink, plan, reporter)
    }
}

/// Filter `source` into `destination` in one call.
pub fn repackage(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    spec: FilterSpec,
    options: RepackOptions,
) -> Result<RunReport> {
    Repackager::new(spec, options).run(source.as_ref(), destination.as_ref())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::policy::ContentRoot;
    use crate::scan::RecordMarkers;
    use crate::spec::Selector;

    const DOC: &str = "<core:CityModel>\n\
<core:cityObjectMember>\n<bldg:Building gml:id=\"b1\"/>\n</core:cityObjectMember>\n\
<core:cityObjectMember>\n<bldg:Building gml:id=\"b2\"/>\n</core:cityObjectMember>\n\
</core:CityModel>\n";

    fn write_source(path: &Path) {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("udx/bldg/a.gml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(DOC.as_bytes()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        std::fs::write(path, bytes).unwrap();
    }

    fn spec(selector: Selector) -> FilterSpec {
        FilterSpec::from_entries(ContentRoot::default(), [("bldg/a.gml", selector)]).unwrap()
    }

    #[test]
    fn runs_and_commits() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.zip");
        let dest = dir.path().join("out/filtered.zip");
        write_source(&source);

        let report = repackage(&source, &dest, spec(Selector::ids(["b2"])), RepackOptions::default())
            .unwrap();
        assert!(dest.exists());
        assert_eq!(report.entries.filtered, 1);
        assert!(report.manifest.has_matches());
    }

    #[test]
    fn no_match_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.zip");
        let dest = dir.path().join("filtered.zip");
        write_source(&source);

        let err = repackage(&source, &dest, spec(Selector::ids(["b404"])), RepackOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::NoMatch { .. }));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn custom_markers() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.zip");
        let dest = dir.path().join("out.zip");
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("udx/bldg/a.gml", SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(b"<m:member><f id=\"x\"/></m:member>\n<m:member><f id=\"y\"/></m:member>\n")
            .unwrap();
        std::fs::write(&source, writer.finish().unwrap().into_inner()).unwrap();

        let options = RepackOptions::default().markers(RecordMarkers::new("member", "id"));
        let report = repackage(&source, &dest, spec(Selector::ids(["y"])), options).unwrap();
        assert_eq!(report.manifest.matched_ids().into_iter().collect::<Vec<_>>(), ["y"]);
    }

    #[test]
    fn missing_source_is_source_format() {
        let dir = tempdir().unwrap();
        let err = repackage(
            dir.path().join("absent.zip"),
            dir.path().join("out.zip"),
            spec(Selector::All),
            RepackOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SourceFormat { .. }));
    }
}
