//! Round trip of shell input through an external editor.

use std::path::PathBuf;

use tracing::{debug, info};

use super::classify::is_bare_identifier;
use super::command::{resolve_editor_command, EditorCommand, EDITOR_ENV};
use super::scratch::ScratchDir;
use crate::error::EditorError;

/// Resolves a dotted name to the source text of its current value.
pub trait SourceLookup {
    /// Source form of the value bound at `path`, or `None` when nothing
    /// useful is bound there.
    fn source_of(&self, path: &str) -> Option<String>;
}

/// What the user asked to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// A bare name; the edited text is assigned back to it.
    Identifier,
    /// Anything else; the edited text replaces the input.
    Statement,
}

impl ContentKind {
    pub fn of(code: &str) -> Self {
        if is_bare_identifier(code) {
            ContentKind::Identifier
        } else {
            ContentKind::Statement
        }
    }
}

/// State of one `edit` command.
#[derive(Debug, Clone)]
pub struct EditorSession {
    pub original_code: String,
    pub content_kind: ContentKind,
    pub temp_file_path: PathBuf,
    pub editor_command: String,
    pub modified_code: Option<String>,
}

impl EditorSession {
    /// The input line the edit produced, once the editor has returned.
    pub fn next_line(&self) -> Option<String> {
        let modified = self.modified_code.as_deref()?;
        Some(prepare_result(&self.original_code, modified))
    }
}

/// Opens shell input in an external editor and turns the result back
/// into an input line.
///
/// The bridge remembers the text of the last successful edit, so `edit`
/// with no argument reopens it.
pub struct EditorBridge {
    scratch: ScratchDir,
    env_editor: Option<String>,
    last_edited_content: Option<String>,
}

impl EditorBridge {
    /// Create a bridge that falls back to the `EDITOR` environment variable.
    pub fn new(scratch: ScratchDir) -> Self {
        Self {
            scratch,
            env_editor: std::env::var(EDITOR_ENV).ok(),
            last_edited_content: None,
        }
    }

    /// Replace the environment fallback.
    pub fn with_env_editor(mut self, editor: Option<String>) -> Self {
        self.env_editor = editor;
        self
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    pub fn last_edited_content(&self) -> Option<&str> {
        self.last_edited_content.as_deref()
    }

    /// The editor command line, preferring `configured` over the
    /// environment fallback.
    pub fn resolve_editor_command(&self, configured: Option<&str>) -> Result<String, EditorError> {
        resolve_editor_command(configured, self.env_editor.as_deref())
    }

    /// The text to open in the editor for `input`.
    ///
    /// Empty input reopens the last edited text. A bare identifier opens
    /// the source of its current value, or nothing if it has none. Any
    /// other input is opened as is.
    pub fn prepare_content<L>(&self, input: &str, lookup: &L) -> String
    where
        L: SourceLookup + ?Sized,
    {
        let input = input.trim();
        if input.is_empty() {
            return self.last_edited_content.clone().unwrap_or_default();
        }
        match ContentKind::of(input) {
            ContentKind::Identifier => lookup.source_of(input).unwrap_or_default(),
            ContentKind::Statement => input.to_string(),
        }
    }

    /// Edit `input` and return the line to feed back into the shell.
    ///
    /// The scratch file is removed on every path out of this function,
    /// including editor failures.
    pub async fn run_edit_command<L>(
        &mut self,
        input: &str,
        configured: Option<&str>,
        lookup: &L,
    ) -> Result<String, EditorError>
    where
        L: SourceLookup + ?Sized,
    {
        let command_line = self.resolve_editor_command(configured)?;
        let command = EditorCommand::parse(&command_line)?.with_wait_flag();
        let content = self.prepare_content(input, lookup);
        let file = self.scratch.create_file(&content)?;

        let original_code = input.trim().to_string();
        let mut session = EditorSession {
            content_kind: ContentKind::of(&original_code),
            original_code,
            temp_file_path: file.path().to_path_buf(),
            editor_command: command.to_string(),
            modified_code: None,
        };

        info!(?session, "opening editor");
        let status = command
            .to_command(&session.temp_file_path)
            .status()
            .await
            .map_err(|e| {
                EditorError::EditorExecutionFailed(format!(
                    "could not start {}: {}",
                    command.program, e
                ))
            })?;
        info!(%status, "editor exited");
        if !status.success() {
            return Err(EditorError::EditorExecutionFailed(format!(
                "{} exited with {}",
                session.editor_command, status
            )));
        }

        let modified = tokio::fs::read_to_string(&session.temp_file_path).await?;
        file.close()?;

        let modified = normalize_line_endings(&modified);
        self.last_edited_content = Some(modified.clone());
        session.modified_code = Some(modified);
        debug!(?session, "edit session finished");
        Ok(session.next_line().unwrap_or_default())
    }
}

/// Build the next input line from the original input and the edited text.
///
/// Editing a bare identifier rebinds it; editing anything else replaces
/// it.
pub fn prepare_result(original_code: &str, modified_code: &str) -> String {
    let original = original_code.trim();
    match ContentKind::of(original) {
        ContentKind::Identifier => format!("{} = {}", original, modified_code),
        ContentKind::Statement => modified_code.to_string(),
    }
}

/// Convert `\r\n` and `\r` line breaks to `\n` and drop trailing
/// whitespace, which editors tend to add as a final newline.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Bindings(HashMap<&'static str, &'static str>);

    impl SourceLookup for Bindings {
        fn source_of(&self, path: &str) -> Option<String> {
            self.0.get(path).map(|s| s.to_string())
        }
    }

    fn bindings() -> Bindings {
        Bindings(HashMap::from([("foo", "function () { return 1 }")]))
    }

    fn bridge() -> EditorBridge {
        EditorBridge::new(ScratchDir::default_location()).with_env_editor(None)
    }

    #[test]
    fn test_prepare_result_for_identifier() {
        assert_eq!(prepare_result("foo", "function () { return 2 }"), "foo = function () { return 2 }");
        assert_eq!(prepare_result(" db.test.find ", "x"), "db.test.find = x");
    }

    #[test]
    fn test_prepare_result_for_statement() {
        let modified = "db.test.find({ field: 'new     value' })";
        assert_eq!(prepare_result("db.test.find()", modified), modified);
        assert_eq!(prepare_result("", modified), modified);
        assert_eq!(prepare_result("class A {}", "class B {}"), "class B {}");
    }

    #[test]
    fn test_prepare_content() {
        let bridge = bridge();
        let lookup = bindings();
        assert_eq!(bridge.prepare_content("foo", &lookup), "function () { return 1 }");
        assert_eq!(bridge.prepare_content("unbound", &lookup), "");
        assert_eq!(bridge.prepare_content(" db.test.find() ", &lookup), "db.test.find()");
        assert_eq!(bridge.prepare_content("", &lookup), "");
    }

    #[test]
    fn test_empty_input_reuses_last_content() {
        let mut bridge = bridge();
        bridge.last_edited_content = Some("db.test.find()".into());
        assert_eq!(bridge.prepare_content("  ", &bindings()), "db.test.find()");
    }

    #[test]
    fn test_config_editor_preferred() {
        let bridge = bridge().with_env_editor(Some("nano".into()));
        assert_eq!(bridge.resolve_editor_command(Some("vim")).unwrap(), "vim");
        assert_eq!(bridge.resolve_editor_command(None).unwrap(), "nano");
    }

    #[tokio::test]
    async fn test_missing_editor_fails_before_touching_disk() {
        let root = tempfile::tempdir().unwrap();
        let scratch_path = root.path().join("scratch");
        let mut bridge = EditorBridge::new(ScratchDir::new(&scratch_path)).with_env_editor(None);
        let err = bridge
            .run_edit_command("foo", None, &bindings())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("please define an external editor"));
        assert!(!scratch_path.exists());
        assert!(bridge.last_edited_content().is_none());
    }

    #[test]
    fn test_session_next_line() {
        let mut session = EditorSession {
            original_code: "answer".into(),
            content_kind: ContentKind::Identifier,
            temp_file_path: PathBuf::from("/tmp/edit-1-a.js"),
            editor_command: "vim".into(),
            modified_code: None,
        };
        assert_eq!(session.next_line(), None);
        session.modified_code = Some("42".into());
        assert_eq!(session.next_line().as_deref(), Some("answer = 42"));
    }

    #[test]
    fn test_content_kind() {
        assert_eq!(ContentKind::of("db.test"), ContentKind::Identifier);
        assert_eq!(ContentKind::of("db.test.find()"), ContentKind::Statement);
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n\n"), "a\nb\nc");
        assert_eq!(normalize_line_endings("x = {  a:  1 }\n"), "x = {  a:  1 }");
    }
}
