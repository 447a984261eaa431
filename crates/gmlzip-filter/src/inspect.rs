use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::options::RepackOptions;
use crate::policy::clean_path;
use crate::scan::{BoundaryScanner, Segment};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub line: usize,
    pub identifier: Option<String>,
}

/// Records found in one record-bearing member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentRecords {
    pub path: String,
    pub records: Vec<RecordSummary>,
}

impl DocumentRecords {
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| r.identifier.as_deref())
    }
}

/// List the records of every record-bearing member under the content root,
/// in archive order. Useful for writing filter specifications.
pub fn inspect(source: impl AsRef<Path>, options: &RepackOptions) -> Result<Vec<DocumentRecords>> {
    let source = source.as_ref();
    let source_error = |reason: String| Error::SourceFormat {
        path: source.to_path_buf(),
        reason,
    };

    let markers = options
        .markers
        .compile()
        .map_err(|source| Error::InvalidMarker { source })?;
    let file = File::open(source).map_err(|e| source_error(e.to_string()))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| source_error(e.to_string()))?;

    let mut documents = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| source_error(format!("cannot read entry #{index}: {e}")))?;
        if entry.is_dir() {
            continue;
        }

        let path = clean_path(entry.name());
        if !options.content_root.contains(&path) || !options.retention.is_record_bearing(&path) {
            continue;
        }

        let mut records = Vec::new();
        for segment in BoundaryScanner::new(BufReader::new(entry), &markers) {
            let segment = segment.map_err(|e| Error::from_member_scan(source, &path, e))?;
            if let Segment::Record(span) = segment {
                records.push(RecordSummary {
                    line: span.start_line,
                    identifier: span.identifier,
                });
            }
        }

        debug!(entry = path.as_str(), records = records.len(), "inspected");
        documents.push(DocumentRecords { path, records });
    }

    Ok(documents)
}
