//! Record boundary scanner.
//!
//! Records are found by their structural markers only: an open tag and a close
//! tag with a fixed local name, each optionally namespace-prefixed. Nothing else
//! in the document is parsed. At most one record is buffered at a time; text
//! outside records is yielded as soon as its line is read. Markers may share a
//! line with other markup; the surrounding text stays outside the record.

use std::collections::VecDeque;
use std::io::{self, BufRead};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Namespace alias in front of a tag name, e.g. `core:`.
const PREFIX: &str = r"(?:[A-Za-z_][\w.\-]*:)?";

/// Names of the record element and its identifier attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordMarkers {
    pub record_tag: String,
    pub id_attribute: String,
}

impl Default for RecordMarkers {
    fn default() -> Self {
        Self {
            record_tag: "cityObjectMember".to_owned(),
            id_attribute: "gml:id".to_owned(),
        }
    }
}

impl RecordMarkers {
    pub fn new(record_tag: impl Into<String>, id_attribute: impl Into<String>) -> Self {
        Self {
            record_tag: record_tag.into(),
            id_attribute: id_attribute.into(),
        }
    }

    pub fn compile(&self) -> Result<MarkerSet, regex::Error> {
        let tag = regex::escape(&self.record_tag);
        let attr = regex::escape(&self.id_attribute);

        Ok(MarkerSet {
            open: Regex::new(&format!(r"<{PREFIX}{tag}(?:\s[^>]*)?/?>"))?,
            close: Regex::new(&format!(r"</{PREFIX}{tag}\s*>"))?,
            identifier: Regex::new(&format!(r#"(?:^|[^\w:.\-]){attr}="([^"]+)""#))?,
        })
    }
}

/// Compiled [`RecordMarkers`].
#[derive(Clone, Debug)]
pub struct MarkerSet {
    open: Regex,
    close: Regex,
    identifier: Regex,
}

struct OpenMarker {
    start: usize,
    end: usize,
    self_closing: bool,
}

struct CloseMarker {
    start: usize,
    end: usize,
}

impl MarkerSet {
    fn find_open(&self, text: &str) -> Option<OpenMarker> {
        self.open.find(text).map(|m| OpenMarker {
            start: m.start(),
            end: m.end(),
            self_closing: m.as_str().ends_with("/>"),
        })
    }

    fn find_close(&self, text: &str) -> Option<CloseMarker> {
        self.close.find(text).map(|m| CloseMarker {
            start: m.start(),
            end: m.end(),
        })
    }

    /// First identifier declared in `text`.
    pub fn identifier<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.identifier
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// One complete record, open marker through close marker.
///
/// Whitespace between a line start and the open marker, and between the close
/// marker and the line end (terminator included), belongs to the span, so
/// dropping a record leaves no blank line behind. Other text sharing those
/// lines is emitted as [`Segment::Text`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSpan {
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    /// Byte offsets of `text` in the document; `end_offset` is exclusive.
    pub start_offset: u64,
    pub end_offset: u64,
    pub identifier: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Text outside any record: a whole line, or the part of a line around
    /// a record's markers.
    Text(String),
    Record(RecordSpan),
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("record opened at line {line} while the record opened at line {open_line} is unclosed")]
    NestedRecord { line: usize, open_line: usize },

    #[error("record opened at line {open_line} is never closed")]
    UnterminatedRecord { open_line: usize },

    #[error("line {line} is not valid UTF-8")]
    Encoding { line: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ScanError {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NestedRecord { .. } | Self::UnterminatedRecord { .. }
        )
    }
}

struct PendingRecord {
    start_line: usize,
    start_offset: u64,
    text: String,
}

impl PendingRecord {
    fn finish(self, end_line: usize, end_offset: u64, identifier: Option<String>) -> RecordSpan {
        RecordSpan {
            start_line: self.start_line,
            end_line,
            start_offset: self.start_offset,
            end_offset,
            identifier,
            text: self.text,
        }
    }
}

enum ScanState {
    Outside,
    Unidentified(PendingRecord),
    Identified(PendingRecord, String),
    Done,
}

impl ScanState {
    fn inside(pending: PendingRecord, identifier: Option<String>) -> Self {
        match identifier {
            Some(id) => Self::Identified(pending, id),
            None => Self::Unidentified(pending),
        }
    }
}

struct Line {
    text: String,
    start: u64,
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Forward-only iterator of [`Segment`]s over a document.
///
/// A line may hold several segments; they are queued and handed out in
/// document order. The iterator is fused after the first error.
pub struct BoundaryScanner<'m, R> {
    reader: R,
    markers: &'m MarkerSet,
    state: ScanState,
    ready: VecDeque<Segment>,
    line_no: usize,
    offset: u64,
}

impl<'m, R: BufRead> BoundaryScanner<'m, R> {
    pub fn new(reader: R, markers: &'m MarkerSet) -> Self {
        Self {
            reader,
            markers,
            state: ScanState::Outside,
            ready: VecDeque::new(),
            line_no: 0,
            offset: 0,
        }
    }

    fn read_line(&mut self) -> Result<Option<Line>, ScanError> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }

        self.line_no += 1;
        let start = self.offset;
        self.offset += n as u64;

        let text = String::from_utf8(buf).map_err(|_| ScanError::Encoding { line: self.line_no })?;
        Ok(Some(Line { text, start }))
    }

    /// Split one line into segments, advancing the state machine.
    fn step(&mut self, line: &Line) -> Result<(), ScanError> {
        let mut pos = 0;

        while pos < line.text.len() {
            pos = match std::mem::replace(&mut self.state, ScanState::Outside) {
                ScanState::Outside => self.outside(line, pos),
                ScanState::Unidentified(pending) => self.inside(line, pos, pending, None)?,
                ScanState::Identified(pending, id) => self.inside(line, pos, pending, Some(id))?,
                ScanState::Done => {
                    self.state = ScanState::Done;
                    break;
                }
            };
        }
        Ok(())
    }

    fn outside(&mut self, line: &Line, pos: usize) -> usize {
        let rest = &line.text[pos..];
        let Some(open) = self.markers.find_open(rest) else {
            self.ready.push_back(Segment::Text(rest.to_owned()));
            return line.text.len();
        };

        let lead = &rest[..open.start];
        let start = if is_blank(lead) {
            pos
        } else {
            self.ready.push_back(Segment::Text(lead.to_owned()));
            pos + open.start
        };
        let open_end = pos + open.end;

        let pending = PendingRecord {
            start_line: self.line_no,
            start_offset: line.start + start as u64,
            text: line.text[start..open_end].to_owned(),
        };

        if open.self_closing {
            self.close(line, open_end, pending, None)
        } else {
            self.state = ScanState::Unidentified(pending);
            open_end
        }
    }

    fn inside(
        &mut self,
        line: &Line,
        pos: usize,
        mut pending: PendingRecord,
        identifier: Option<String>,
    ) -> Result<usize, ScanError> {
        let rest = &line.text[pos..];
        let close = self.markers.find_close(rest);
        let body = &rest[..close.as_ref().map_or(rest.len(), |c| c.start)];

        if self.markers.find_open(body).is_some() {
            return Err(ScanError::NestedRecord {
                line: self.line_no,
                open_line: pending.start_line,
            });
        }

        let identifier = identifier.or_else(|| self.markers.identifier(body).map(str::to_owned));
        match close {
            Some(close) => {
                pending.text.push_str(&rest[..close.end]);
                Ok(self.close(line, pos + close.end, pending, identifier))
            }
            None => {
                pending.text.push_str(rest);
                self.state = ScanState::inside(pending, identifier);
                Ok(line.text.len())
            }
        }
    }

    /// Emit the record whose close marker ends at `end`, taking a blank
    /// remainder of the line with it. Returns where scanning resumes.
    fn close(
        &mut self,
        line: &Line,
        end: usize,
        mut pending: PendingRecord,
        identifier: Option<String>,
    ) -> usize {
        let tail = &line.text[end..];
        let end = if is_blank(tail) {
            pending.text.push_str(tail);
            line.text.len()
        } else {
            end
        };

        let span = pending.finish(self.line_no, line.start + end as u64, identifier);
        self.ready.push_back(Segment::Record(span));
        end
    }
}

impl<R: BufRead> Iterator for BoundaryScanner<'_, R> {
    type Item = Result<Segment, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(segment) = self.ready.pop_front() {
                return Some(Ok(segment));
            }
            if matches!(self.state, ScanState::Done) {
                return None;
            }

            let line = match self.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    return match std::mem::replace(&mut self.state, ScanState::Done) {
                        ScanState::Unidentified(pending) | ScanState::Identified(pending, _) => {
                            Some(Err(ScanError::UnterminatedRecord {
                                open_line: pending.start_line,
                            }))
                        }
                        _ => None,
                    };
                }
                Err(e) => {
                    self.state = ScanState::Done;
                    return Some(Err(e));
                }
            };

            if let Err(e) = self.step(&line) {
                self.state = ScanState::Done;
                self.ready.clear();
                return Some(Err(e));
            }
        }
    }
}
