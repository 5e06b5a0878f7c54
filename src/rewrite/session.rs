//! Per-line evaluation state.

use super::collector::SourceLocation;

/// State of one input line while it moves through the rewrite pipeline.
///
/// Created when the line is handed to the evaluator and dropped once its
/// result (or error) has been delivered, so nothing here can leak into the
/// next line.
#[derive(Debug, Clone, Default)]
pub struct EvaluationSession {
    /// The line as the user typed it.
    pub raw_input: String,
    /// True only during the dry run.
    pub tracking_suspensions: bool,
    /// Call sites that suspended during the dry run, in evaluation order.
    pub suspension_locations: Vec<SourceLocation>,
    /// The text that was evaluated for real, once known.
    pub rewritten_input: Option<String>,
    /// Set when the line starts with the `var` prefix; the shell neither
    /// prints nor stashes the result.
    pub cursor_assigned: bool,
}

impl EvaluationSession {
    /// Start a session for one line.
    pub fn new(raw_input: impl Into<String>) -> Self {
        let raw_input = raw_input.into();
        let cursor_assigned = is_cursor_assignment(&raw_input);
        Self {
            raw_input,
            cursor_assigned,
            ..Default::default()
        }
    }

    /// Enter tracking mode with an empty location list.
    pub fn begin_tracking(&mut self) {
        self.suspension_locations.clear();
        self.tracking_suspensions = true;
    }

    /// Leave tracking mode, keeping what the dry run found.
    pub fn end_tracking(&mut self, locations: Vec<SourceLocation>) {
        self.suspension_locations = locations;
        self.tracking_suspensions = false;
    }
}

/// True for lines of the form `var <rest>`.
pub fn is_cursor_assignment(input: &str) -> bool {
    input
        .trim_start()
        .strip_prefix("var")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}
