//! Transparent suspension rewriting.
//!
//! Users write backend calls without `await`. Each line is dry-run in a
//! sandbox to find the calls that suspend, rewritten to await exactly
//! those calls, and evaluated once for real.

mod collector;
mod evaluator;
mod rewriter;
mod session;

pub use collector::{SourceLocation, SuspensionCollector};
pub use evaluator::AsyncRewriteEvaluator;
pub use rewriter::{rewrite, SUSPENSION_MARKER};
pub use session::{is_cursor_assignment, EvaluationSession};
