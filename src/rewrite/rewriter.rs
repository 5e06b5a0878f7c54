//! Inserts explicit suspension markers into source text.

use super::collector::SourceLocation;

/// Text inserted in front of a suspending call.
pub const SUSPENSION_MARKER: &str = "await ";

/// One insertion at a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    /// `(await ` before a call whose result is used by a postfix operator.
    Open { at: usize, end: usize, wrap: bool },
    /// `)` after a wrapped call.
    Close { at: usize, start: usize },
}

impl Edit {
    fn at(&self) -> usize {
        match self {
            Edit::Open { at, .. } | Edit::Close { at, .. } => *at,
        }
    }
}

/// Insert [`SUSPENSION_MARKER`] in front of every location.
///
/// All other text is kept byte for byte. A call followed by `.`, `[` or
/// `(` is wrapped as `(await call)` so the marker applies to the call and
/// not to the whole postfix chain. Locations that are out of range or not
/// on character boundaries are skipped.
pub fn rewrite(source: &str, locations: &[SourceLocation]) -> String {
    let mut edits = Vec::with_capacity(locations.len() * 2);
    for location in locations {
        let (start, end) = (location.start, location.end);
        if start >= end
            || end > source.len()
            || !source.is_char_boundary(start)
            || !source.is_char_boundary(end)
        {
            continue;
        }
        let wrap = source[end..]
            .trim_start()
            .starts_with(['.', '[', '(']);
        edits.push(Edit::Open {
            at: start,
            end,
            wrap,
        });
        if wrap {
            edits.push(Edit::Close { at: end, start });
        }
    }

    // At one offset, closing parens go before opening markers. Closes of
    // inner calls (later start) come first; opens of outer calls (later
    // end) come first.
    edits.sort_by(|a, b| {
        a.at().cmp(&b.at()).then_with(|| match (a, b) {
            (Edit::Close { start: s1, .. }, Edit::Close { start: s2, .. }) => s2.cmp(s1),
            (Edit::Open { end: e1, .. }, Edit::Open { end: e2, .. }) => e2.cmp(e1),
            (Edit::Close { .. }, Edit::Open { .. }) => std::cmp::Ordering::Less,
            (Edit::Open { .. }, Edit::Close { .. }) => std::cmp::Ordering::Greater,
        })
    });

    let mut out = String::with_capacity(source.len() + edits.len() * SUSPENSION_MARKER.len());
    let mut copied = 0;
    for edit in &edits {
        out.push_str(&source[copied..edit.at()]);
        copied = edit.at();
        match edit {
            Edit::Open { wrap: true, .. } => {
                out.push('(');
                out.push_str(SUSPENSION_MARKER);
            }
            Edit::Open { wrap: false, .. } => out.push_str(SUSPENSION_MARKER),
            Edit::Close { .. } => out.push(')'),
        }
    }
    out.push_str(&source[copied..]);
    out
}
