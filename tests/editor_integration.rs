//! Editor round-trip integration tests.
//!
//! Fake editors are small `sh` scripts that rewrite the file they are
//! given, so these tests only run on Unix.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use shell_rewrite::shell::InputStream;
use shell_rewrite::{
    Config, EditorBridge, EditorError, MemoryBackend, ScratchDir, Shell, ShellError,
};

struct Fixture {
    root: TempDir,
    shell: Shell,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.editor.scratch_dir = Some(root.path().join("scratch"));
        let mut shell = Shell::new(Arc::new(MemoryBackend::new()), &config);
        shell.set_editor_bridge(
            EditorBridge::new(ScratchDir::new(root.path().join("scratch"))).with_env_editor(None),
        );
        Self { root, shell }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Write a script and return an editor command running it with `sh`.
    fn editor(&self, name: &str, body: &str) -> String {
        let script = self.path(name);
        std::fs::write(&script, format!("{}\n", body)).unwrap();
        format!("sh {}", quote(&script))
    }

    /// Editor that replaces the file with `content`.
    fn writing_editor(&self, name: &str, content: &str) -> String {
        self.editor(
            name,
            &format!("cat > \"$1\" <<'EOF'\n{}\nEOF", content),
        )
    }

    /// Editor that copies what it was given to `capture`, then writes
    /// `content`.
    fn capturing_editor(&self, name: &str, capture: &Path, content: &str) -> String {
        self.editor(
            name,
            &format!(
                "cp \"$1\" {}\ncat > \"$1\" <<'EOF'\n{}\nEOF",
                quote(capture),
                content
            ),
        )
    }

    async fn set_editor(&mut self, command: &str) {
        self.shell
            .process_line(&format!("config set editor {}", command))
            .await
            .unwrap();
    }

    fn scratch_files(&self) -> usize {
        std::fs::read_dir(self.path("scratch"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn quote(path: &Path) -> String {
    shlex::try_quote(path.to_str().unwrap()).unwrap().into_owned()
}

// ============================================================================
// Reconciliation Tests
// ============================================================================

#[tokio::test]
async fn test_statement_is_replaced() {
    let mut fx = Fixture::new();
    let editor = fx.writing_editor("edit.sh", "db.test.find({ field: 'new     value' })");
    fx.set_editor(&editor).await;

    let reply = fx.shell.process_line("edit db.test.find()").await.unwrap();

    assert_eq!(
        reply.inject.as_deref(),
        Some("db.test.find({ field: 'new     value' })")
    );
    assert!(reply.lines.is_empty());
    assert_eq!(fx.scratch_files(), 0);
}

#[tokio::test]
async fn test_identifier_is_rebound() {
    let mut fx = Fixture::new();
    fx.shell
        .process_line("function answer() { return 1 }")
        .await
        .unwrap();
    let capture = fx.path("opened.js");
    let editor = fx.capturing_editor("edit.sh", &capture, "function () { return 42 }");
    fx.set_editor(&editor).await;

    let reply = fx.shell.process_line("edit answer").await.unwrap();
    let opened = std::fs::read_to_string(&capture).unwrap();
    assert!(opened.contains("return 1"));

    let line = reply.inject.unwrap();
    assert_eq!(line, "answer = function () { return 42 }");

    fx.shell.process_line(&line).await.unwrap();
    let reply = fx.shell.process_line("answer()").await.unwrap();
    assert_eq!(reply.lines, vec!["42"]);
}

#[tokio::test]
async fn test_unbound_identifier_opens_empty_file() {
    let mut fx = Fixture::new();
    let capture = fx.path("opened.js");
    let editor = fx.capturing_editor("edit.sh", &capture, "7");
    fx.set_editor(&editor).await;

    let reply = fx.shell.process_line("edit fresh").await.unwrap();
    assert_eq!(std::fs::read_to_string(&capture).unwrap(), "");
    assert_eq!(reply.inject.as_deref(), Some("fresh = 7"));
}

#[tokio::test]
async fn test_empty_edit_reopens_last_content() {
    let mut fx = Fixture::new();
    let editor = fx.writing_editor("first.sh", "db.test.find()");
    fx.set_editor(&editor).await;
    fx.shell.process_line("edit db.other.find()").await.unwrap();

    let capture = fx.path("opened.js");
    let editor = fx.capturing_editor("second.sh", &capture, "db.test.countDocuments()");
    fx.set_editor(&editor).await;
    let reply = fx.shell.process_line("edit").await.unwrap();

    assert_eq!(std::fs::read_to_string(&capture).unwrap(), "db.test.find()");
    assert_eq!(reply.inject.as_deref(), Some("db.test.countDocuments()"));
    assert_eq!(
        fx.shell.editor().last_edited_content(),
        Some("db.test.countDocuments()")
    );
}

#[tokio::test]
async fn test_line_endings_are_normalized() {
    let mut fx = Fixture::new();
    let editor = fx.editor("crlf.sh", "printf 'a = 1\\r\\nb = 2\\r\\n\\r\\n' > \"$1\"");
    fx.set_editor(&editor).await;

    let reply = fx.shell.process_line("edit a = 0").await.unwrap();
    assert_eq!(reply.inject.as_deref(), Some("a = 1\nb = 2"));
}

#[tokio::test]
async fn test_program_path_with_spaces() {
    let mut fx = Fixture::new();
    let dir = fx.path("my editors");
    std::fs::create_dir(&dir).unwrap();
    let program = dir.join("run sh");
    std::os::unix::fs::symlink("/bin/sh", &program).unwrap();

    let script = fx.path("edit.sh");
    std::fs::write(&script, "echo 'x = 3' > \"$1\"\n").unwrap();
    let command = format!("{} {}", quote(&program), quote(&script));
    fx.set_editor(&command).await;

    let reply = fx.shell.process_line("edit x = 1").await.unwrap();
    assert_eq!(reply.inject.as_deref(), Some("x = 3"));
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_no_editor_configured() {
    let mut fx = Fixture::new();
    let err = fx.shell.process_line("edit foo").await.unwrap_err();

    assert!(matches!(
        err,
        ShellError::Editor(EditorError::NoEditorConfigured)
    ));
    assert!(err.to_string().contains("please define an external editor"));
    assert_eq!(fx.scratch_files(), 0);
}

#[tokio::test]
async fn test_failing_editor_cleans_up() {
    let mut fx = Fixture::new();
    fx.set_editor("false").await;

    let err = fx.shell.process_line("edit db.test.find()").await.unwrap_err();
    assert!(matches!(
        err,
        ShellError::Editor(EditorError::EditorExecutionFailed(_))
    ));
    assert_eq!(fx.scratch_files(), 0);
    assert!(fx.shell.editor().last_edited_content().is_none());
}

#[tokio::test]
async fn test_missing_program_cleans_up() {
    let mut fx = Fixture::new();
    let missing = fx.path("no-such-editor");
    fx.set_editor(&quote(&missing)).await;

    let err = fx.shell.process_line("edit x").await.unwrap_err();
    assert!(matches!(
        err,
        ShellError::Editor(EditorError::EditorExecutionFailed(_))
    ));
    assert_eq!(fx.scratch_files(), 0);
}

// ============================================================================
// Shell Loop Tests
// ============================================================================

#[tokio::test]
async fn test_edited_line_runs_next() {
    let mut fx = Fixture::new();
    let editor = fx.writing_editor("edit.sh", "db.test.insertOne({ a: 1 })");
    fx.set_editor(&editor).await;

    let mut input = InputStream::new(&b"edit db.test.find()\ndb.test.countDocuments()\n"[..]);
    let mut out = Vec::new();
    let mut err = Vec::new();
    fx.shell.run(&mut input, &mut out, &mut err).await.unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(err.is_empty(), "{}", String::from_utf8_lossy(&err));
    assert!(out.contains("acknowledged: true"));
    assert!(out.trim_end().ends_with('1'));
}
