//! Per-shell state that outlives a single line.

use crate::editor::EDITOR_CONFIG_KEY;
use crate::error::{Result, ShellError};
use crate::script::{Object, Value};

use super::format::{DisplayPolicy, UndefinedDisplay};

/// Config key for the cursor batch size.
pub const BATCH_SIZE_KEY: &str = "displayBatchSize";

/// Config key for the `undefined` display policy.
pub const UNDEFINED_DISPLAY_KEY: &str = "undefinedDisplay";

/// Settings changeable at runtime with `config set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Editor command line for `edit`.
    pub editor: Option<String>,
    /// How results are shown.
    pub display: DisplayPolicy,
}

impl SessionConfig {
    /// Every key, in display order.
    pub const KEYS: [&'static str; 3] = [EDITOR_CONFIG_KEY, BATCH_SIZE_KEY, UNDEFINED_DISPLAY_KEY];

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Result<Value> {
        match key {
            EDITOR_CONFIG_KEY => Ok(self
                .editor
                .as_deref()
                .map(Value::from)
                .unwrap_or(Value::Null)),
            BATCH_SIZE_KEY => Ok(Value::Number(self.display.batch_size as f64)),
            UNDEFINED_DISPLAY_KEY => Ok(Value::from(self.display.undefined.to_string())),
            other => Err(ShellError::UnknownConfigKey(other.to_string())),
        }
    }

    /// Change `key`. `null` or an empty value clears the editor.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || ShellError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            EDITOR_CONFIG_KEY => {
                let value = value.trim();
                self.editor = match value {
                    "" | "null" => None,
                    command => Some(command.to_string()),
                };
            }
            BATCH_SIZE_KEY => {
                let size: usize = value.trim().parse().map_err(|_| invalid())?;
                if size == 0 {
                    return Err(invalid());
                }
                self.display.batch_size = size;
            }
            UNDEFINED_DISPLAY_KEY => {
                self.display.undefined = value.parse::<UndefinedDisplay>().map_err(|_| invalid())?;
            }
            other => return Err(ShellError::UnknownConfigKey(other.to_string())),
        }
        Ok(())
    }

    /// All settings as an object, for `config` with no arguments.
    pub fn to_object(&self) -> Value {
        let mut object = Object::new();
        for key in Self::KEYS {
            if let Ok(value) = self.get(key) {
                object.insert(key.to_string(), value);
            }
        }
        Value::Object(object)
    }
}

/// Documents of an array result that have not been shown yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorState {
    remaining: Vec<Value>,
}

impl CursorState {
    pub fn new(remaining: Vec<Value>) -> Self {
        Self { remaining }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Take up to `size` documents off the front.
    pub fn next_batch(&mut self, size: usize) -> Vec<Value> {
        let size = size.min(self.remaining.len());
        self.remaining.drain(..size).collect()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn into_remaining(self) -> Vec<Value> {
        self.remaining
    }
}

/// State of an interactive shell.
#[derive(Debug, Clone)]
pub struct ShellState {
    /// Database bound to `db`.
    current_db: String,
    /// Runtime settings.
    config: SessionConfig,
    /// Cursor paged with `it`.
    cursor: Option<CursorState>,
    /// Last line processed.
    last_line: Option<String>,
    /// Lines evaluated successfully.
    execution_count: u64,
}

impl ShellState {
    /// Create state for a shell starting in `database`.
    pub fn new(database: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            current_db: database.into(),
            config,
            cursor: None,
            last_line: None,
            execution_count: 0,
        }
    }

    pub fn current_db(&self) -> &str {
        &self.current_db
    }

    pub fn set_current_db(&mut self, database: impl Into<String>) {
        self.current_db = database.into();
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    /// The stashed cursor, if any documents are left.
    pub fn cursor(&self) -> Option<&CursorState> {
        self.cursor.as_ref()
    }

    /// Stash documents for `it`. An empty remainder clears the cursor.
    pub fn stash_cursor(&mut self, remaining: Vec<Value>) {
        self.cursor = (!remaining.is_empty()).then(|| CursorState::new(remaining));
    }

    pub fn take_cursor(&mut self) -> Option<CursorState> {
        self.cursor.take()
    }

    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Record a line about to be processed.
    pub fn record_line(&mut self, line: impl Into<String>) {
        self.last_line = Some(line.into());
    }

    /// Record a successful evaluation.
    pub fn record_execution(&mut self) {
        self.execution_count += 1;
    }
}
