//! Editor command resolution and representation.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use super::classify::is_editor_application_family;
use crate::error::EditorError;

/// Environment variable consulted when no editor is configured.
pub const EDITOR_ENV: &str = "EDITOR";

/// Session configuration key naming the editor.
pub const EDITOR_CONFIG_KEY: &str = "editor";

/// Flag that makes window-based editors block until the file is closed.
pub const WAIT_FLAG: &str = "--wait";

/// Pick the editor command line.
///
/// The configured value wins over the environment. Blank values count as
/// absent.
pub fn resolve_editor_command(
    configured: Option<&str>,
    env: Option<&str>,
) -> Result<String, EditorError> {
    [configured, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|command| !command.is_empty())
        .map(str::to_string)
        .ok_or(EditorError::NoEditorConfigured)
}

/// An editor program and the flags passed before the file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorCommand {
    /// The program name or path.
    pub program: String,
    /// Flags passed before the file path.
    pub flags: Vec<String>,
}

impl EditorCommand {
    /// Create a command with no flags.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            flags: Vec::new(),
        }
    }

    /// Add a flag.
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Split a command line with shell quoting rules.
    ///
    /// A program path containing spaces must be quoted:
    /// `"/opt/my editor/bin/edit" --flag`.
    pub fn parse(command_line: &str) -> Result<Self, EditorError> {
        let words = shlex::split(command_line).ok_or_else(|| {
            EditorError::EditorExecutionFailed(format!(
                "could not parse editor command: {}",
                command_line
            ))
        })?;
        let mut words = words.into_iter();
        let program = words.next().ok_or(EditorError::NoEditorConfigured)?;
        Ok(Self {
            program,
            flags: words.collect(),
        })
    }

    /// Append [`WAIT_FLAG`] for editors that would otherwise return at once.
    pub fn with_wait_flag(mut self) -> Self {
        if is_editor_application_family(&self.program) && !self.flags.iter().any(|f| f == WAIT_FLAG)
        {
            self.flags.push(WAIT_FLAG.to_string());
        }
        self
    }

    /// Build the process invocation for editing `path`.
    pub fn to_command(&self, path: &Path) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.flags).arg(path);
        command
    }
}

impl fmt::Display for EditorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<Cow<'_, str>> = std::iter::once(&self.program)
            .chain(&self.flags)
            .map(|word| shlex::try_quote(word).unwrap_or(Cow::Borrowed(word.as_str())))
            .collect();
        write!(f, "{}", words.join(" "))
    }
}
