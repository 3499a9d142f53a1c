/// Translate `start` from one coordinate space into the other.
///
/// `from_offsets` must be sorted ascending and its ranges non-overlapping;
/// this is a contract on the caller (in practice, on whoever produced the
/// mapping arrays) and is not checked here. Interval ends are inclusive, so a
/// query sitting exactly on `from_offset + from_length` still matches. When
/// the target range is shorter than the origin range, the relative offset is
/// clamped to the target length.
///
/// Returns `None` when no interval contains `start` — the position simply has
/// no correspondence in the other space.
pub fn translate_offset(
    start: usize,
    from_offsets: &[usize],
    to_offsets: &[usize],
    from_lengths: &[usize],
    to_lengths: &[usize],
) -> Option<usize> {
    if from_offsets.is_empty() {
        return None;
    }

    let mut low = 0usize;
    let mut high = from_offsets.len() - 1;

    while low <= high {
        let mid = low + (high - low) / 2;
        let from_offset = from_offsets[mid];
        let from_length = from_lengths[mid];

        if start >= from_offset && start <= from_offset + from_length {
            let range_offset = (start - from_offset).min(to_lengths[mid]);
            return Some(to_offsets[mid] + range_offset);
        } else if start < from_offset {
            if mid == 0 {
                return None;
            }
            high = mid - 1;
        } else {
            low = mid + 1;
        }
    }

    None
}
