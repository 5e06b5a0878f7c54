//! The dry run / rewrite / real run pipeline.

use tracing::debug;

use super::collector::SuspensionCollector;
use super::rewriter::rewrite;
use super::session::EvaluationSession;
use crate::error::{Result, ShellError};
use crate::script::{parse, Interpreter, Value};

/// Evaluates lines whose suspension points are not marked.
///
/// Each line is evaluated twice. The first pass runs in a sandbox over a
/// snapshot of the scope and only records which calls would suspend. The
/// line is then rewritten with an `await` in front of each of those calls,
/// and the rewritten text is evaluated once against the real interpreter.
pub struct AsyncRewriteEvaluator {
    interpreter: Interpreter,
}

impl AsyncRewriteEvaluator {
    pub fn new(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Evaluate the session's line.
    ///
    /// Failures of the parse or the dry run are reported as
    /// [`ShellError::RewriteFailed`]; failures of the real run as
    /// [`ShellError::Eval`]. The tracking flag is always cleared on return.
    pub async fn evaluate(&mut self, session: &mut EvaluationSession) -> Result<Value> {
        let result = self.run_pipeline(session).await;
        session.tracking_suspensions = false;
        result
    }

    async fn run_pipeline(&mut self, session: &mut EvaluationSession) -> Result<Value> {
        let program = parse(&session.raw_input).map_err(ShellError::RewriteFailed)?;

        session.begin_tracking();
        let mut sandbox = self
            .interpreter
            .sandbox(SuspensionCollector::new(program.source));
        let dry_run = sandbox.run(&program).await;
        let locations = sandbox
            .into_collector()
            .map(SuspensionCollector::into_locations)
            .unwrap_or_default();
        session.end_tracking(locations);
        dry_run.map_err(ShellError::RewriteFailed)?;

        let rewritten = rewrite(&session.raw_input, &session.suspension_locations);
        let program = if rewritten.trim() == session.raw_input.trim() {
            program
        } else {
            debug!(
                suspensions = session.suspension_locations.len(),
                rewritten = %rewritten,
                "rewrote input"
            );
            parse(&rewritten).map_err(ShellError::RewriteFailed)?
        };
        session.rewritten_input = Some(rewritten);

        Ok(self.interpreter.run(&program).await?)
    }
}
