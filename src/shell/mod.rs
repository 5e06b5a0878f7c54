//! The interactive shell.
//!
//! A [`Shell`] takes one line at a time. Verbs such as `use` and `edit` are
//! handled directly; everything else goes through the
//! [`AsyncRewriteEvaluator`], and the result is printed according to the
//! session's [`DisplayPolicy`].

mod builtins;
pub mod format;
mod input;
mod state;

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::config::Config;
use crate::editor::{EditorBridge, ScratchDir};
use crate::error::Result;
use crate::rewrite::{AsyncRewriteEvaluator, EvaluationSession};
use crate::script::{Interpreter, Value};

pub use builtins::{parse_verb, ConfigAction, ShowTarget, Verb, HELP_TEXT};
pub use format::{inspect, DisplayPolicy, Printable, UndefinedDisplay, MORE_HINT};
pub use input::{InputLine, InputStream};
pub use state::{CursorState, SessionConfig, ShellState, BATCH_SIZE_KEY, UNDEFINED_DISPLAY_KEY};

/// Global name of the current database handle.
const DB_GLOBAL: &str = "db";

/// What processing a line produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Lines to print.
    pub lines: Vec<String>,
    /// A line to process next, as if typed.
    pub inject: Option<String>,
    /// The user asked to leave.
    pub exit: bool,
}

impl Reply {
    fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            ..Default::default()
        }
    }

    fn line(line: impl Into<String>) -> Self {
        Self::lines(vec![line.into()])
    }
}

/// An interactive shell session.
pub struct Shell {
    evaluator: AsyncRewriteEvaluator,
    editor: EditorBridge,
    state: ShellState,
    interactive: bool,
}

impl Shell {
    /// Create a shell over `backend`.
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        let database = config.shell.default_db.clone();
        let mut interpreter = Interpreter::new(backend);
        interpreter
            .scope_mut()
            .set_global(DB_GLOBAL, Value::Database(database.clone()));

        let scratch = config
            .editor
            .scratch_dir
            .clone()
            .map(ScratchDir::new)
            .unwrap_or_else(ScratchDir::default_location);

        Self {
            evaluator: AsyncRewriteEvaluator::new(interpreter),
            editor: EditorBridge::new(scratch),
            state: ShellState::new(database, config.session_config()),
            interactive: false,
        }
    }

    /// Replace the editor bridge.
    pub fn set_editor_bridge(&mut self, editor: EditorBridge) {
        self.editor = editor;
    }

    /// Print prompts and echo injected lines in [`Shell::run`].
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn editor(&self) -> &EditorBridge {
        &self.editor
    }

    pub fn interpreter(&self) -> &Interpreter {
        self.evaluator.interpreter()
    }

    pub fn prompt(&self) -> String {
        format!("{}> ", self.state.current_db())
    }

    /// Output of `print` calls since the last call.
    pub fn take_printed(&mut self) -> Vec<String> {
        self.evaluator.interpreter_mut().take_output()
    }

    /// Process one line.
    ///
    /// Output of `print` is not part of the reply; collect it with
    /// [`Shell::take_printed`], also after an error.
    pub async fn process_line(&mut self, line: &str) -> Result<Reply> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Reply::default());
        }
        self.state.record_line(line);

        // Multi-line input, such as an edited script, is always code.
        if !line.contains('\n') {
            if let Some(verb) = parse_verb(line) {
                return self.run_verb(verb?).await;
            }
        }

        let mut session = EvaluationSession::new(line);
        let value = self.evaluator.evaluate(&mut session).await?;
        self.state.record_execution();
        if let Some(rewritten) = &session.rewritten_input {
            debug!(input = %session.raw_input, %rewritten, "evaluated");
        }
        if session.cursor_assigned {
            return Ok(Reply::default());
        }
        Ok(Reply::lines(self.present(value)))
    }

    async fn run_verb(&mut self, verb: Verb) -> Result<Reply> {
        debug!(?verb, "shell verb");
        match verb {
            Verb::Use(database) => {
                self.evaluator
                    .interpreter_mut()
                    .scope_mut()
                    .set_global(DB_GLOBAL, Value::Database(database.clone()));
                self.state.set_current_db(database.clone());
                Ok(Reply::line(format!("switched to db {}", database)))
            }
            Verb::Show(ShowTarget::Databases) => {
                let names = self.interpreter().backend().list_databases().await;
                Ok(Reply::lines(names))
            }
            Verb::Show(ShowTarget::Collections) => {
                let backend = Arc::clone(self.interpreter().backend());
                let names = backend.list_collections(self.state.current_db()).await;
                Ok(Reply::lines(names))
            }
            Verb::It => Ok(Reply::lines(self.next_batch())),
            Verb::Config(ConfigAction::List) => {
                Ok(Reply::line(inspect(&self.state.config().to_object())))
            }
            Verb::Config(ConfigAction::Get(key)) => {
                let value = self.state.config().get(&key)?;
                Ok(Reply::line(inspect(&value)))
            }
            Verb::Config(ConfigAction::Set(key, value)) => {
                self.state.config_mut().set(&key, &value)?;
                Ok(Reply::line(format!("Setting \"{}\" has been changed", key)))
            }
            Verb::Edit(argument) => {
                let configured = self.state.config().editor.clone();
                let line = self
                    .editor
                    .run_edit_command(&argument, configured.as_deref(), self.evaluator.interpreter())
                    .await?;
                Ok(Reply {
                    inject: Some(line),
                    ..Default::default()
                })
            }
            Verb::Help => Ok(Reply::lines(HELP_TEXT.lines().map(str::to_string).collect())),
            Verb::Exit => Ok(Reply {
                exit: true,
                ..Default::default()
            }),
        }
    }

    /// Lines for a result, paging long arrays.
    fn present(&mut self, value: Value) -> Vec<String> {
        let policy = self.state.config().display.clone();
        match value {
            Value::Array(mut items) if items.len() > policy.batch_size => {
                let rest = items.split_off(policy.batch_size);
                self.state.stash_cursor(rest);
                vec![inspect(&Value::Array(items)), MORE_HINT.to_string()]
            }
            other => Printable::classify(other, &policy)
                .map(|printable| vec![printable.render()])
                .unwrap_or_default(),
        }
    }

    fn next_batch(&mut self) -> Vec<String> {
        let Some(mut cursor) = self.state.take_cursor() else {
            return vec!["no cursor".to_string()];
        };
        let batch = cursor.next_batch(self.state.config().display.batch_size);
        let mut lines = vec![inspect(&Value::Array(batch))];
        if !cursor.is_exhausted() {
            lines.push(MORE_HINT.to_string());
            self.state.stash_cursor(cursor.into_remaining());
        }
        lines
    }

    /// Read, process and print lines until end of input or `exit`.
    ///
    /// Errors are printed to `err` as `Error: <message>` and do not end the
    /// loop. Lines produced by `edit` are processed next.
    pub async fn run<R, W, E>(
        &mut self,
        input: &mut InputStream<R>,
        out: &mut W,
        err: &mut E,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        loop {
            if self.interactive && !input.has_injected() {
                out.write_all(self.prompt().as_bytes()).await?;
                out.flush().await?;
            }
            let Some(line) = input.next_line().await? else {
                break;
            };
            if self.interactive && line.injected {
                out.write_all(format!("{}{}\n", self.prompt(), line.text).as_bytes())
                    .await?;
            }

            let result = self.process_line(&line.text).await;
            for printed in self.take_printed() {
                out.write_all(format!("{}\n", printed).as_bytes()).await?;
            }
            match result {
                Ok(reply) => {
                    for text in &reply.lines {
                        out.write_all(format!("{}\n", text).as_bytes()).await?;
                    }
                    if let Some(next) = reply.inject {
                        input.inject(next);
                    }
                    if reply.exit {
                        break;
                    }
                }
                Err(e) => {
                    err.write_all(format!("Error: {}\n", e).as_bytes()).await?;
                    err.flush().await?;
                }
            }
            out.flush().await?;
        }
        info!(lines = self.state.execution_count(), "shell finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::ShellError;

    fn shell() -> Shell {
        Shell::new(Arc::new(MemoryBackend::new()), &Config::default())
    }

    async fn lines(shell: &mut Shell, line: &str) -> Vec<String> {
        shell.process_line(line).await.unwrap().lines
    }

    #[tokio::test]
    async fn test_expression_result_is_printed() {
        let mut shell = shell();
        assert_eq!(lines(&mut shell, "1 + 2").await, vec!["3"]);
        assert_eq!(lines(&mut shell, "'plain'").await, vec!["plain"]);
        assert!(lines(&mut shell, "undefined").await.is_empty());
        assert_eq!(shell.state().execution_count(), 3);
    }

    #[tokio::test]
    async fn test_backend_calls_are_awaited() {
        let mut shell = shell();
        lines(&mut shell, "db.users.insertOne({ name: 'ada' })").await;
        assert_eq!(lines(&mut shell, "db.users.countDocuments()").await, vec!["1"]);
        assert_eq!(
            lines(&mut shell, "db.users.findOne().name").await,
            vec!["ada"]
        );
    }

    #[tokio::test]
    async fn test_use_rebinds_db() {
        let mut shell = shell();
        assert_eq!(lines(&mut shell, "use shop").await, vec!["switched to db shop"]);
        assert_eq!(shell.prompt(), "shop> ");
        lines(&mut shell, "db.orders.insertOne({ n: 1 })").await;
        assert_eq!(lines(&mut shell, "show collections").await, vec!["orders"]);
        assert_eq!(lines(&mut shell, "db").await, vec!["shop"]);
    }

    #[tokio::test]
    async fn test_multi_line_input_is_code() {
        let mut shell = shell();
        shell.process_line("var use = 1; var foo = 2").await.unwrap();
        assert_eq!(lines(&mut shell, "use\nfoo").await, vec!["2"]);
        assert_eq!(shell.state().current_db(), "test");
        assert!(shell.process_line("help\nmissing").await.is_err());
    }

    #[tokio::test]
    async fn test_cursor_paging() {
        let mut shell = shell();
        shell.process_line("config set displayBatchSize 2").await.unwrap();
        let first = lines(&mut shell, "[1, 2, 3, 4, 5]").await;
        assert_eq!(first, vec!["[ 1, 2 ]", MORE_HINT]);
        assert_eq!(lines(&mut shell, "it").await, vec!["[ 3, 4 ]", MORE_HINT]);
        assert_eq!(lines(&mut shell, "it").await, vec!["[ 5 ]"]);
        assert_eq!(lines(&mut shell, "it").await, vec!["no cursor"]);
    }

    #[tokio::test]
    async fn test_var_prefix_suppresses_output() {
        let mut shell = shell();
        assert!(lines(&mut shell, "var x = 5; x").await.is_empty());
        assert_eq!(lines(&mut shell, "x").await, vec!["5"]);
    }

    #[tokio::test]
    async fn test_config_verbs() {
        let mut shell = shell();
        assert_eq!(lines(&mut shell, "config get editor").await, vec!["null"]);
        lines(&mut shell, "config set editor vim").await;
        assert_eq!(lines(&mut shell, "config get editor").await, vec!["'vim'"]);
        assert!(matches!(
            shell.process_line("config get colour").await,
            Err(ShellError::UnknownConfigKey(_))
        ));
    }

    #[tokio::test]
    async fn test_print_output_survives_errors() {
        let mut shell = shell();
        let result = shell
            .process_line("print('before'); db.users.findOne().name")
            .await;
        assert!(matches!(result, Err(ShellError::Eval(_))));
        assert_eq!(shell.take_printed(), vec!["before"]);
    }

    #[tokio::test]
    async fn test_exit() {
        let mut shell = shell();
        assert!(shell.process_line("exit").await.unwrap().exit);
    }

    #[tokio::test]
    async fn test_run_loop_reports_errors_and_continues() {
        let mut shell = shell();
        let mut input = InputStream::new(&b"missing\n40 + 2\nexit\n1\n"[..]);
        let mut out = Vec::new();
        let mut err = Vec::new();
        shell.run(&mut input, &mut out, &mut err).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "42\n");
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "Error: ReferenceError: missing is not defined\n"
        );
    }
}
