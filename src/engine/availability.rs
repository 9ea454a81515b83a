use crate::model::{Booking, Span};

// ── Availability algebra ──────────────────────────────────────────
//
// All intervals are half-open `[start, end)`: a walk ending at 14:00 and
// another starting at 14:00 are compatible.

/// First existing booking whose span overlaps the candidate, if any.
/// Callers pre-filter `existing` to the statuses relevant to their operation
/// (creation tolerates `Requested` overlaps; confirmation does not add any).
pub fn first_conflict<'a>(candidate: &Span, existing: &'a [Booking]) -> Option<&'a Booking> {
    existing.iter().find(|b| b.span.overlaps(candidate))
}

/// Free sub-windows of `window` once the busy spans are removed.
/// Busy spans may overlap each other and extend past the window.
pub fn free_windows(window: &Span, busy: &[Span]) -> Vec<Span> {
    let mut clamped: Vec<Span> = busy
        .iter()
        .filter(|s| s.overlaps(window))
        .map(|s| Span::new(s.start.max(window.start), s.end.min(window.end)))
        .collect();
    clamped.sort_by_key(|s| s.start);
    subtract_busy(&[*window], &merge_overlapping(&clamped))
}

/// Merge sorted overlapping/adjacent spans into disjoint spans.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Subtract sorted disjoint busy spans from sorted base spans.
pub fn subtract_busy(base: &[Span], busy: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut bi = 0;

    for &b in base {
        let mut cursor = b.start;

        while bi < busy.len() && busy[bi].end <= cursor {
            bi += 1;
        }

        let mut j = bi;
        while j < busy.len() && busy[j].start < b.end {
            let r = &busy[j];
            if r.start > cursor {
                result.push(Span::new(cursor, r.start));
            }
            cursor = cursor.max(r.end);
            j += 1;
        }

        if cursor < b.end {
            result.push(Span::new(cursor, b.end));
        }
    }

    result
}
