use lsp_types::{
    CompletionItem, CompletionTextEdit, Diagnostic, Location, LocationLink, Range, TextEdit,
};
use rustc_hash::FxHashSet;

type RangeKey = (u32, u32, u32, u32);

fn range_key(range: &Range) -> RangeKey {
    (
        range.start.line,
        range.start.character,
        range.end.line,
        range.end.character,
    )
}

pub(crate) fn with_locations(locations: Vec<Location>) -> Vec<Location> {
    let mut seen = FxHashSet::default();
    locations
        .into_iter()
        .filter(|location| seen.insert((location.uri.clone(), range_key(&location.range))))
        .collect()
}

pub(crate) fn with_location_links(links: Vec<LocationLink>) -> Vec<LocationLink> {
    let mut seen = FxHashSet::default();
    links
        .into_iter()
        .filter(|link| {
            seen.insert((
                link.target_uri.clone(),
                range_key(&link.target_range),
                range_key(&link.target_selection_range),
            ))
        })
        .collect()
}

pub(crate) fn with_text_edits(edits: Vec<TextEdit>) -> Vec<TextEdit> {
    let mut seen = FxHashSet::default();
    edits
        .into_iter()
        .filter(|edit| seen.insert((range_key(&edit.range), edit.new_text.clone())))
        .collect()
}

/// Duplicate completion items are identified by label plus text edit, so the
/// same completion surfacing from two virtual documents collapses to one.
pub(crate) fn with_completion_items(items: Vec<CompletionItem>) -> Vec<CompletionItem> {
    let mut seen = FxHashSet::default();
    items
        .into_iter()
        .filter(|item| {
            let edit = item.text_edit.as_ref().map(|edit| match edit {
                CompletionTextEdit::Edit(edit) => (range_key(&edit.range), edit.new_text.clone()),
                CompletionTextEdit::InsertAndReplace(edit) => {
                    (range_key(&edit.insert), edit.new_text.clone())
                }
            });
            seen.insert((item.label.clone(), edit))
        })
        .collect()
}

pub(crate) fn with_diagnostics(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen = FxHashSet::default();
    diagnostics
        .into_iter()
        .filter(|diagnostic| {
            seen.insert((range_key(&diagnostic.range), diagnostic.message.clone()))
        })
        .collect()
}
