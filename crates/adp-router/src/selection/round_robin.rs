use adp_core::WorkerId;

/// Picks the candidate at `cursor` and advances the cursor.
///
/// An out-of-range cursor restarts at the first candidate. The cursor is
/// owned by the caller (one per domain), so it keeps advancing even when the
/// candidate subset changes between calls.
pub fn round_robin_select(candidates: &[WorkerId], cursor: &mut usize) -> Option<WorkerId> {
    if candidates.is_empty() {
        return None;
    }

    let position = if *cursor >= candidates.len() { 0 } else { *cursor };
    *cursor = (position + 1) % candidates.len();
    candidates.get(position).cloned()
}
