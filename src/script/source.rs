//! Source text identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for source ID generation.
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one parsed piece of source text.
///
/// Every call to the parser mints a fresh ID, so spans from a function
/// defined on an earlier line can be told apart from spans of the line
/// currently being evaluated. Displayed as `src-XXXXXXXX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Create a new unique source ID.
    pub fn new() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Create a SourceId from a raw u64 value.
    ///
    /// This is primarily for testing.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src-{:08x}", self.0)
    }
}

/// A byte range inside one source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// The text this range points into.
    pub source: SourceId,
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Create a span.
    pub fn new(source: SourceId, start: usize, end: usize) -> Self {
        Self { source, start, end }
    }

    /// Span covering both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        Span {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let id = SourceId::new();
            assert!(ids.insert(id), "Duplicate ID generated: {}", id);
        }
    }

    #[test]
    fn test_display_format() {
        assert_eq!(SourceId::from_raw(255).to_string(), "src-000000ff");
        assert_eq!(SourceId::from_raw(0x12345678).to_string(), "src-12345678");
    }

    #[test]
    fn test_span_join() {
        let src = SourceId::from_raw(1);
        let joined = Span::new(src, 4, 9).to(Span::new(src, 12, 15));
        assert_eq!((joined.start, joined.end), (4, 15));
    }
}
