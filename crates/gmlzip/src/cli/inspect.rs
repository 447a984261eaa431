use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use gmlzip_filter::{DocumentRecords, RepackOptions, inspect};

/// List the feature records of each document under the content root.
#[derive(Debug, clap::Args)]
pub struct Inspect {
    /// Source archive.
    pub source: PathBuf,

    /// Archive directory holding the documents.
    #[arg(long, value_name = "DIR")]
    pub content_root: Option<String>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl Inspect {
    pub fn run(self, mut options: RepackOptions) -> anyhow::Result<()> {
        if let Some(root) = &self.content_root {
            options = options.content_root(root);
        }

        let documents = inspect(&self.source, &options)
            .with_context(|| format!("failed to inspect '{}'", self.source.display()))?;

        let mut out = io::stdout().lock();
        if self.json {
            serde_json::to_writer_pretty(&mut out, &documents)?;
            writeln!(out)?;
        } else {
            write_text(&mut out, &documents)?;
        }
        Ok(())
    }
}

fn write_text(out: &mut impl Write, documents: &[DocumentRecords]) -> io::Result<()> {
    for doc in documents {
        writeln!(out, "{} ({} records)", doc.path, doc.records.len())?;
        for record in &doc.records {
            match &record.identifier {
                Some(id) => writeln!(out, "  {id}")?,
                None => writeln!(out, "  <no id> at line {}", record.line)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use gmlzip_filter::RecordSummary;

    use super::*;

    #[test]
    fn text_listing() {
        let documents = vec![DocumentRecords {
            path: "udx/bldg/a.gml".to_owned(),
            records: vec![
                RecordSummary { line: 3, identifier: Some("b1".to_owned()) },
                RecordSummary { line: 9, identifier: None },
            ],
        }];

        let mut out = Vec::new();
        write_text(&mut out, &documents).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "udx/bldg/a.gml (2 records)\n  b1\n  <no id> at line 9\n"
        );
    }
}
