use std::sync::Arc;

use lsp_types::{Position, Range};
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use url::Url;
use weft_language_core::{CodeInformation, Snapshot, SourceMap};
use weft_source_map::{Mapping, translate_offset};

/// URI scheme under which virtual documents are addressed. The code id and
/// the owning script's URI are both percent-encoded into the path, so the
/// mapping is reversible.
const VIRTUAL_SCHEME: &str = "embedded-content";

pub fn virtual_document_uri(source_id: &Url, code_id: &str) -> Url {
    let code = utf8_percent_encode(code_id, NON_ALPHANUMERIC);
    let source = utf8_percent_encode(source_id.as_str(), NON_ALPHANUMERIC);
    Url::parse(&format!("{VIRTUAL_SCHEME}:/{code}/{source}"))
        .expect("percent-encoded virtual uri is well-formed")
}

pub fn parse_virtual_document_uri(uri: &Url) -> Option<(Url, String)> {
    if uri.scheme() != VIRTUAL_SCHEME {
        return None;
    }
    let path = uri.path().strip_prefix('/')?;
    let (code, source) = path.split_once('/')?;
    let code_id = percent_decode_str(code).decode_utf8().ok()?.into_owned();
    let source = percent_decode_str(source).decode_utf8().ok()?;
    let source_id = Url::parse(&source).ok()?;
    Some((source_id, code_id))
}

/// Line-start offset table over one snapshot, for position/offset conversion.
/// Columns count bytes; the UTF-16 column convention of the wire protocol is
/// the transport layer's concern.
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        Self {
            line_starts,
            len: text.len(),
        }
    }

    pub fn offset_at(&self, position: Position) -> usize {
        let line = (position.line as usize).min(self.line_starts.len() - 1);
        (self.line_starts[line] + position.character as usize).min(self.len)
    }

    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        Position::new(line as u32, (offset - self.line_starts[line]) as u32)
    }
}

/// A document as analysis providers see it: a source script or one virtual
/// code, with its snapshot and a shared line index.
#[derive(Clone)]
pub struct ServiceDocument {
    pub uri: Url,
    pub language_id: String,
    snapshot: Snapshot,
    line_index: Arc<LineIndex>,
}

impl ServiceDocument {
    pub(crate) fn from_parts(
        uri: Url,
        language_id: String,
        snapshot: Snapshot,
        line_index: Arc<LineIndex>,
    ) -> Self {
        Self {
            uri,
            language_id,
            snapshot,
            line_index,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn text(&self) -> &str {
        self.snapshot.text()
    }

    pub fn offset_at(&self, position: Position) -> usize {
        self.line_index.offset_at(position)
    }

    pub fn position_at(&self, offset: usize) -> Position {
        self.line_index.position_at(offset)
    }
}

/// One source-document/virtual-document pair and the source map between
/// them, with position-level translation helpers.
#[derive(Clone)]
pub struct DocumentMap {
    pub source_document: ServiceDocument,
    pub virtual_document: ServiceDocument,
    pub map: Arc<SourceMap<CodeInformation>>,
}

impl DocumentMap {
    pub fn to_generated_positions<F>(&self, position: Position, filter: F) -> Vec<Position>
    where
        F: Fn(&CodeInformation) -> bool,
    {
        let offset = self.source_document.offset_at(position);
        self.map
            .to_generated_offsets(offset, filter)
            .map(|(generated, _)| self.virtual_document.position_at(generated))
            .collect()
    }

    pub fn to_generated_position<F>(&self, position: Position, filter: F) -> Option<Position>
    where
        F: Fn(&CodeInformation) -> bool,
    {
        self.to_generated_positions(position, filter).into_iter().next()
    }

    pub fn to_source_positions<F>(&self, position: Position, filter: F) -> Vec<Position>
    where
        F: Fn(&CodeInformation) -> bool,
    {
        let offset = self.virtual_document.offset_at(position);
        self.map
            .to_source_offsets(offset, filter)
            .map(|(source, _)| self.source_document.position_at(source))
            .collect()
    }

    /// Source ranges for a generated range. Both ends must translate through
    /// the *same* mapping for a range to be yielded.
    pub fn to_source_ranges<F>(&self, range: Range, filter: F) -> Vec<Range>
    where
        F: Fn(&CodeInformation) -> bool,
    {
        let start = self.virtual_document.offset_at(range.start);
        let end = self.virtual_document.offset_at(range.end);
        self.map
            .to_source_offsets(start, filter)
            .filter_map(|(source_start, mapping)| {
                let source_end = translate_in_mapping_backward(mapping, end)?;
                Some(Range::new(
                    self.source_document.position_at(source_start),
                    self.source_document.position_at(source_end),
                ))
            })
            .collect()
    }

    pub fn to_source_range<F>(&self, range: Range, filter: F) -> Option<Range>
    where
        F: Fn(&CodeInformation) -> bool,
    {
        self.to_source_ranges(range, filter).into_iter().next()
    }

    /// When several source ranges bracket the query point, prefer the one
    /// that contains `anchor` over the first occurring one.
    pub fn to_source_range_prefer_surrounding<F>(
        &self,
        range: Range,
        anchor: Position,
        filter: F,
    ) -> Option<Range>
    where
        F: Fn(&CodeInformation) -> bool,
    {
        let mut first = None;
        for candidate in self.to_source_ranges(range, filter) {
            if candidate.start <= anchor && anchor <= candidate.end {
                return Some(candidate);
            }
            first.get_or_insert(candidate);
        }
        first
    }

    /// Generated ranges for a source range; same per-mapping pairing as
    /// [`to_source_ranges`](Self::to_source_ranges).
    pub fn to_generated_range<F>(&self, range: Range, filter: F) -> Option<Range>
    where
        F: Fn(&CodeInformation) -> bool,
    {
        let start = self.source_document.offset_at(range.start);
        let end = self.source_document.offset_at(range.end);
        self.map
            .to_generated_offsets(start, filter)
            .filter_map(|(generated_start, mapping)| {
                let generated_end = translate_in_mapping_forward(mapping, end)?;
                Some(Range::new(
                    self.virtual_document.position_at(generated_start),
                    self.virtual_document.position_at(generated_end),
                ))
            })
            .next()
    }

    /// Project a source range onto the generated document, falling back to
    /// the overlapping portion of the mapped regions when the endpoints
    /// themselves have no correspondence (see [`crate::overlap`]).
    pub fn find_overlap_range<F>(&self, range: Range, filter: F) -> Option<Range>
    where
        F: Fn(&CodeInformation) -> bool,
    {
        let start = self.source_document.offset_at(range.start);
        let end = self.source_document.offset_at(range.end);
        let (mapped_start, mapped_end) = crate::overlap::find_overlap_range(&self.map, start, end, filter)?;
        Some(Range::new(
            self.virtual_document.position_at(mapped_start),
            self.virtual_document.position_at(mapped_end),
        ))
    }
}

pub(crate) fn translate_in_mapping_forward(
    mapping: &Mapping<CodeInformation>,
    offset: usize,
) -> Option<usize> {
    translate_offset(
        offset,
        &mapping.source_offsets,
        &mapping.generated_offsets,
        &mapping.lengths,
        mapping.generated_lengths.as_deref().unwrap_or(&mapping.lengths),
    )
}

pub(crate) fn translate_in_mapping_backward(
    mapping: &Mapping<CodeInformation>,
    offset: usize,
) -> Option<usize> {
    translate_offset(
        offset,
        &mapping.generated_offsets,
        &mapping.source_offsets,
        mapping.generated_lengths.as_deref().unwrap_or(&mapping.lengths),
        &mapping.lengths,
    )
}
