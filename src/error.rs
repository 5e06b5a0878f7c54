//! Error types for shell-rewrite.

use thiserror::Error;

/// Main error type for shell operations.
#[derive(Error, Debug)]
pub enum ShellError {
    /// The `edit` command failed.
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// The real evaluation pass failed.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// The dry run or the rewrite of a line failed.
    ///
    /// Reported exactly like an evaluation error of the original line.
    #[error(transparent)]
    RewriteFailed(EvalError),

    /// A backend operation invoked directly by a shell verb failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `config get`/`config set` on a key the shell does not know.
    #[error("unknown config key: {0}")]
    UnknownConfigKey(String),

    /// A value given to `config set` could not be parsed for its key.
    #[error("invalid value for config key {key}: {value}")]
    InvalidConfigValue { key: String, value: String },

    /// A shell verb was invoked with malformed arguments.
    #[error("usage: {0}")]
    Usage(String),
}

/// Failures of the external editor round-trip.
#[derive(Error, Debug)]
pub enum EditorError {
    /// Neither the `editor` config value nor `EDITOR` names a command.
    #[error(
        "Command failed with an error: please define an external editor \
         (checked the 'editor' config option and the EDITOR environment variable)"
    )]
    NoEditorConfigured,

    /// The editor could not be started or exited with a non-zero status.
    #[error("editor execution failed: {0}")]
    EditorExecutionFailed(String),

    /// Scratch file I/O failed.
    #[error("editor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing or evaluating script code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The source text could not be parsed.
    #[error("SyntaxError: {message} (at offset {offset})")]
    Syntax { message: String, offset: usize },

    /// An identifier was read before being declared.
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    /// An operation was applied to a value of the wrong kind.
    #[error("TypeError: {0}")]
    Type(String),

    /// An awaited backend operation failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl EvalError {
    /// Build a syntax error at a byte offset.
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            offset,
        }
    }

    /// Build a type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}

/// Errors reported by a [`Backend`](crate::backend::Backend).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The target does not support the requested method.
    #[error("BackendError: {target}.{method} is not a supported operation")]
    UnknownMethod { target: String, method: String },

    /// An argument had the wrong shape.
    #[error("BackendError: invalid argument to {method}: {reason}")]
    InvalidArgument { method: String, reason: String },
}

/// Convenience Result type for shell operations.
pub type Result<T> = std::result::Result<T, ShellError>;

/// Result type for script evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;
