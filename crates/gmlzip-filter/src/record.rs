use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};

use crate::scan::{BoundaryScanner, MarkerSet, RecordSpan, ScanError, Segment};
use crate::spec::Selector;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Drop,
}

/// Per-document keep/drop decisions against one [`Selector`].
pub struct RecordFilter<'s> {
    selector: &'s Selector,
    matched: BTreeSet<String>,
    kept: usize,
    dropped: usize,
}

impl<'s> RecordFilter<'s> {
    pub fn new(selector: &'s Selector) -> Self {
        Self {
            selector,
            matched: BTreeSet::new(),
            kept: 0,
            dropped: 0,
        }
    }

    pub fn decide(&mut self, span: &RecordSpan) -> Decision {
        let keep = match self.selector {
            Selector::All => true,
            Selector::ByIds(ids) => match span.identifier.as_deref() {
                Some(id) if ids.contains(id) => {
                    self.matched.insert(id.to_owned());
                    true
                }
                _ => false,
            },
        };

        if keep {
            self.kept += 1;
            Decision::Keep
        } else {
            self.dropped += 1;
            Decision::Drop
        }
    }

    pub fn finish(self) -> FilterOutcome {
        FilterOutcome {
            matched: self.matched,
            kept: self.kept,
            dropped: self.dropped,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Distinct identifiers of kept records; empty under [`Selector::All`].
    pub matched: BTreeSet<String>,
    pub kept: usize,
    pub dropped: usize,
}

/// Failure while filtering one document.
///
/// Reading and writing are told apart: the reader is the archive member, the
/// writer is the output.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("failed to write filtered output")]
    Write(#[source] io::Error),
}

/// Stream `reader` into `writer`, dropping records the selector rejects.
///
/// Text outside records is copied unchanged whatever the outcome.
pub fn filter_records<R, W>(
    reader: R,
    writer: &mut W,
    markers: &MarkerSet,
    selector: &Selector,
) -> Result<FilterOutcome, FilterError>
where
    R: BufRead,
    W: Write + ?Sized,
{
    let mut filter = RecordFilter::new(selector);

    for segment in BoundaryScanner::new(reader, markers) {
        let text = match segment? {
            Segment::Text(text) => text,
            Segment::Record(span) => match filter.decide(&span) {
                Decision::Keep => span.text,
                Decision::Drop => continue,
            },
        };
        writer.write_all(text.as_bytes()).map_err(FilterError::Write)?;
    }

    Ok(filter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::RecordMarkers;

    const HEADER: &str = "<?xml version=\"1.0\"?>\n<core:CityModel>\n";
    const FOOTER: &str = "</core:CityModel>\n";

    fn member(id: &str) -> String {
        format!(
            "<core:cityObjectMember>\n<bldg:Building gml:id=\"{id}\">\n</bldg:Building>\n</core:cityObjectMember>\n"
        )
    }

    fn document(ids: &[&str]) -> String {
        let mut doc = HEADER.to_owned();
        for id in ids {
            doc.push_str(&member(id));
        }
        doc.push_str(FOOTER);
        doc
    }

    fn run(doc: &str, selector: &Selector) -> (String, FilterOutcome) {
        let markers = RecordMarkers::default().compile().unwrap();
        let mut out = Vec::new();
        let outcome = filter_records(doc.as_bytes(), &mut out, &markers, selector).unwrap();
        (String::from_utf8(out).unwrap(), outcome)
    }

    fn span(id: Option<&str>) -> RecordSpan {
        RecordSpan {
            start_line: 1,
            end_line: 1,
            start_offset: 0,
            end_offset: 0,
            identifier: id.map(str::to_owned),
            text: String::new(),
        }
    }

    #[test]
    fn all_keeps_everything() {
        let selector = Selector::All;
        let mut filter = RecordFilter::new(&selector);
        assert_eq!(filter.decide(&span(Some("a"))), Decision::Keep);
        assert_eq!(filter.decide(&span(None)), Decision::Keep);

        let outcome = filter.finish();
        assert!(outcome.matched.is_empty());
        assert_eq!((outcome.kept, outcome.dropped), (2, 0));
    }

    #[test]
    fn by_ids_requires_present_member_identifier() {
        let selector = Selector::ids(["a"]);
        let mut filter = RecordFilter::new(&selector);
        assert_eq!(filter.decide(&span(Some("a"))), Decision::Keep);
        assert_eq!(filter.decide(&span(Some("b"))), Decision::Drop);
        assert_eq!(filter.decide(&span(None)), Decision::Drop);

        let outcome = filter.finish();
        assert_eq!(outcome.matched, BTreeSet::from(["a".to_owned()]));
        assert_eq!((outcome.kept, outcome.dropped), (1, 2));
    }

    #[test]
    fn keeps_subset_in_document_order() {
        let doc = document(&["id-1", "id-2", "id-3", "id-4"]);
        let (out, outcome) = run(&doc, &Selector::ids(["id-4", "id-2"]));

        assert_eq!(out, format!("{HEADER}{}{}{FOOTER}", member("id-2"), member("id-4")));
        assert_eq!(outcome.kept, 2);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(outcome.matched.len(), 2);
    }

    #[test]
    fn no_match_keeps_only_surrounding_text() {
        let doc = document(&["id-1", "id-2"]);
        let (out, outcome) = run(&doc, &Selector::ids(["id-404"]));
        assert_eq!(out, format!("{HEADER}{FOOTER}"));
        assert!(outcome.matched.is_empty());
    }

    #[test]
    fn duplicate_identifiers_are_both_kept() {
        let doc = document(&["dup", "other", "dup"]);
        let (out, outcome) = run(&doc, &Selector::ids(["dup"]));
        assert_eq!(out.matches("gml:id=\"dup\"").count(), 2);
        assert_eq!(outcome.kept, 2);
        assert_eq!(outcome.matched.len(), 1);
    }

    #[test]
    fn refiltering_is_idempotent() {
        let doc = document(&["id-1", "id-2", "id-3"]);
        let selector = Selector::ids(["id-1", "id-3"]);
        let (once, _) = run(&doc, &selector);
        let (twice, outcome) = run(&once, &selector);
        assert_eq!(once, twice);
        assert_eq!(outcome.dropped, 0);
    }

    #[test]
    fn all_is_identity() {
        let doc = document(&["id-1", "id-2"]);
        let (out, outcome) = run(&doc, &Selector::All);
        assert_eq!(out, doc);
        assert_eq!(outcome.kept, 2);
    }

    #[test]
    fn malformed_input_propagates() {
        let markers = RecordMarkers::default().compile().unwrap();
        let doc = "<core:cityObjectMember>\n<x gml:id=\"a\"/>\n";
        let mut out = Vec::new();
        let err = filter_records(doc.as_bytes(), &mut out, &markers, &Selector::All).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Scan(ScanError::UnterminatedRecord { open_line: 1 })
        ));
    }

    #[test]
    fn records_sharing_lines_with_other_markup() {
        let doc = "<core:CityModel><core:cityObjectMember><b gml:id=\"a\"/></core:cityObjectMember><core:cityObjectMember>\n\
<b gml:id=\"b\"/>\n\
</core:cityObjectMember></core:CityModel>\n";

        let (out, outcome) = run(doc, &Selector::ids(["b"]));
        assert_eq!(
            out,
            "<core:CityModel><core:cityObjectMember>\n<b gml:id=\"b\"/>\n</core:cityObjectMember></core:CityModel>\n"
        );
        assert_eq!((outcome.kept, outcome.dropped), (1, 1));

        let (out, _) = run(doc, &Selector::ids(["a"]));
        assert_eq!(
            out,
            "<core:CityModel><core:cityObjectMember><b gml:id=\"a\"/></core:cityObjectMember></core:CityModel>\n"
        );
    }

    #[test]
    fn write_failure_is_not_a_scan_error() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let markers = RecordMarkers::default().compile().unwrap();
        let doc = document(&["id-1"]);
        let err = filter_records(doc.as_bytes(), &mut Broken, &markers, &Selector::All).unwrap_err();
        assert!(matches!(err, FilterError::Write(_)));
    }
}
