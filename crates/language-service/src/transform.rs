//! Per-shape result translation from generated back to source coordinates.
//! Every function returns `None` when a range the shape cannot live without
//! fails to map back; such results are dropped by the fan-out.

use std::collections::HashMap;

use lsp_types::{
    CompletionItem, CompletionList, CompletionTextEdit, Diagnostic, DocumentSymbol, Hover,
    Location, LocationLink, Position, Range, TextEdit, WorkspaceEdit,
};
use url::Url;

use crate::dedupe;
use crate::documents::{DocumentMap, parse_virtual_document_uri, translate_in_mapping_backward};
use crate::LanguageService;

pub(crate) fn hover(hover: Hover, map: &DocumentMap, anchor: Position) -> Option<Hover> {
    let Some(range) = hover.range else {
        return Some(hover);
    };
    let range =
        map.to_source_range_prefer_surrounding(range, anchor, |data| data.semantic.enabled())?;
    Some(Hover {
        range: Some(range),
        ..hover
    })
}

pub(crate) fn completion_list(list: CompletionList, map: &DocumentMap) -> CompletionList {
    CompletionList {
        is_incomplete: list.is_incomplete,
        items: list
            .items
            .into_iter()
            .map(|item| completion_item(item, map))
            .collect(),
    }
}

/// Items survive an unmappable edit (the edit is dropped, the label kept),
/// mirroring how the original keeps the item usable for display even when
/// the precise insertion range is lost.
fn completion_item(item: CompletionItem, map: &DocumentMap) -> CompletionItem {
    let completion_filter = |data: &weft_language_core::CodeInformation| data.completion.enabled();
    let text_edit = item.text_edit.and_then(|edit| match edit {
        CompletionTextEdit::Edit(edit) => map
            .to_source_range(edit.range, completion_filter)
            .map(|range| {
                CompletionTextEdit::Edit(TextEdit {
                    range,
                    new_text: edit.new_text,
                })
            }),
        CompletionTextEdit::InsertAndReplace(mut edit) => {
            let insert = map.to_source_range(edit.insert, completion_filter)?;
            let replace = map.to_source_range(edit.replace, completion_filter)?;
            edit.insert = insert;
            edit.replace = replace;
            Some(CompletionTextEdit::InsertAndReplace(edit))
        }
    });
    let additional_text_edits = item.additional_text_edits.map(|edits| {
        edits
            .into_iter()
            .filter_map(|edit| text_edit_back(edit, map))
            .collect()
    });
    CompletionItem {
        text_edit,
        additional_text_edits,
        ..item
    }
}

fn text_edit_back(edit: TextEdit, map: &DocumentMap) -> Option<TextEdit> {
    let range = map.to_source_range(edit.range, |data| data.completion.enabled())?;
    Some(TextEdit {
        range,
        new_text: edit.new_text,
    })
}

/// Map a location that may live in any virtual document back to its source
/// script. Locations already in source (or opaque) documents pass through.
pub(crate) fn location(service: &LanguageService, location: Location) -> Option<Location> {
    if parse_virtual_document_uri(&location.uri).is_none() {
        return Some(location);
    }
    for map in service.maps_of_virtual_uri(&location.uri) {
        if let Some(range) = map.to_source_range(location.range, |data| data.navigation.enabled()) {
            return Some(Location::new(map.source_document.uri.clone(), range));
        }
    }
    None
}

/// Map a definition link back to source coordinates: the origin through the
/// queried map (preferring the range containing the query position), the
/// target through whatever document it landed in. The target range falls
/// back to the selection range when only the latter maps, which keeps
/// definitions into loosely-mapped regions usable.
pub(crate) fn location_link(
    service: &LanguageService,
    link: LocationLink,
    origin_map: Option<&DocumentMap>,
    anchor: Position,
) -> Option<LocationLink> {
    let origin_selection_range = match (link.origin_selection_range, origin_map) {
        (Some(range), Some(map)) => Some(map.to_source_range_prefer_surrounding(
            range,
            anchor,
            |data| data.navigation.enabled(),
        )?),
        (origin, _) => origin,
    };

    if parse_virtual_document_uri(&link.target_uri).is_none() {
        return Some(LocationLink {
            origin_selection_range,
            ..link
        });
    }

    for map in service.maps_of_virtual_uri(&link.target_uri) {
        let Some(target_selection_range) =
            map.to_source_range(link.target_selection_range, |data| data.navigation.enabled())
        else {
            continue;
        };
        let target_range = map
            .to_source_range(link.target_range, |data| data.navigation.enabled())
            .unwrap_or(target_selection_range);
        return Some(LocationLink {
            origin_selection_range,
            target_uri: map.source_document.uri.clone(),
            target_range,
            target_selection_range,
        });
    }
    None
}

pub(crate) fn diagnostic(diagnostic: Diagnostic, map: &DocumentMap) -> Option<Diagnostic> {
    let range = map.to_source_range(diagnostic.range, |data| data.verification.should_report())?;
    Some(Diagnostic {
        range,
        ..diagnostic
    })
}

pub(crate) fn document_symbol(symbol: DocumentSymbol, map: &DocumentMap) -> Option<DocumentSymbol> {
    let range = map.to_source_range(symbol.range, |data| data.structure)?;
    let selection_range = map.to_source_range(symbol.selection_range, |data| data.structure)?;
    let children = symbol.children.map(|children| {
        children
            .into_iter()
            .filter_map(|child| document_symbol(child, map))
            .collect()
    });
    Some(DocumentSymbol {
        range,
        selection_range,
        children,
        ..symbol
    })
}

/// Capability gate used when mapping a workspace edit's text edits back.
#[derive(Clone, Copy)]
pub(crate) enum EditGate {
    /// Rename edits: `navigation` with the `should_rename` refinement, and
    /// the per-mapping edit-text rewrite applied.
    Rename,
    /// Any other navigation-produced edit.
    Navigation,
}

/// Map every change of a workspace edit back into source documents. Edits in
/// non-virtual documents pass through; edits that map through no mapping are
/// dropped. Returns `None` when nothing survives.
pub(crate) fn workspace_edit(
    service: &LanguageService,
    edit: WorkspaceEdit,
    gate: EditGate,
) -> Option<WorkspaceEdit> {
    let changes = edit.changes?;
    let mut transformed: HashMap<Url, Vec<TextEdit>> = HashMap::new();

    for (uri, edits) in changes {
        if parse_virtual_document_uri(&uri).is_none() {
            transformed.entry(uri).or_default().extend(edits);
            continue;
        }
        let maps = service.maps_of_virtual_uri(&uri);
        for edit in edits {
            if let Some((target, edit)) = map_text_edit_back(&maps, edit, gate) {
                transformed.entry(target).or_default().push(edit);
            }
        }
    }

    if transformed.values().all(|edits| edits.is_empty()) {
        return None;
    }
    let changes = transformed
        .into_iter()
        .map(|(uri, edits)| (uri, dedupe::with_text_edits(edits)))
        .collect();
    Some(WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    })
}

fn map_text_edit_back(
    maps: &[DocumentMap],
    edit: TextEdit,
    gate: EditGate,
) -> Option<(Url, TextEdit)> {
    for map in maps {
        let start = map.virtual_document.offset_at(edit.range.start);
        let end = map.virtual_document.offset_at(edit.range.end);
        let filter = |data: &weft_language_core::CodeInformation| match gate {
            EditGate::Rename => data.navigation.should_rename(),
            EditGate::Navigation => data.navigation.enabled(),
        };
        for (source_start, mapping) in map.map.to_source_offsets(start, filter) {
            let Some(source_end) = translate_in_mapping_backward(mapping, end) else {
                continue;
            };
            let new_text = match gate {
                EditGate::Rename => mapping.data.navigation.resolve_edit_text(&edit.new_text),
                EditGate::Navigation => edit.new_text.clone(),
            };
            let range = Range::new(
                map.source_document.position_at(source_start),
                map.source_document.position_at(source_end),
            );
            return Some((map.source_document.uri.clone(), TextEdit { range, new_text }));
        }
    }
    None
}
