//! Records the call sites that suspended during a dry run.

use tracing::debug;

use crate::script::{SourceId, Span};

/// Byte range of one suspending call expression in the raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub start: usize,
    pub end: usize,
}

impl SourceLocation {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Suspension points seen while evaluating one source text.
///
/// Locations are kept in the order they were first recorded. Spans from
/// any other source, such as the body of a function defined on an earlier
/// line, are ignored.
#[derive(Debug, Clone)]
pub struct SuspensionCollector {
    source: SourceId,
    locations: Vec<SourceLocation>,
}

impl SuspensionCollector {
    /// Create a collector for the text identified by `source`.
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            locations: Vec::new(),
        }
    }

    /// The text this collector records locations for.
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Record a call site. Returns `true` if it was not seen before.
    pub fn record(&mut self, span: Span) -> bool {
        if span.source != self.source {
            return false;
        }
        let location = SourceLocation::new(span.start, span.end);
        if self.locations.contains(&location) {
            return false;
        }
        debug!(start = span.start, end = span.end, "recorded suspension point");
        self.locations.push(location);
        true
    }

    pub fn locations(&self) -> &[SourceLocation] {
        &self.locations
    }

    pub fn into_locations(self) -> Vec<SourceLocation> {
        self.locations
    }

    pub fn clear(&mut self) {
        self.locations.clear();
    }
}
