//! Rendering evaluation results for the terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::script::{format_number, object_key, quote_string, Value};

/// Hint printed after a partial batch of a cursor.
pub const MORE_HINT: &str = "Type \"it\" for more";

/// Lines longer than this are broken over several lines.
const LINE_WIDTH: usize = 72;

/// Containers nested deeper than this are abbreviated.
const MAX_DEPTH: usize = 6;

/// What to do with an `undefined` result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedDisplay {
    /// Print nothing.
    #[default]
    Suppress,
    /// Print `undefined`.
    Print,
}

impl FromStr for UndefinedDisplay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suppress" => Ok(Self::Suppress),
            "print" => Ok(Self::Print),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for UndefinedDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suppress => write!(f, "suppress"),
            Self::Print => write!(f, "print"),
        }
    }
}

/// How results are shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPolicy {
    /// Array results longer than this are paged with `it`.
    pub batch_size: usize,
    /// Handling of `undefined` results.
    pub undefined: UndefinedDisplay,
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self {
            batch_size: 20,
            undefined: UndefinedDisplay::Suppress,
        }
    }
}

/// A result ready to be shown.
#[derive(Debug, Clone, PartialEq)]
pub enum Printable {
    /// A string result, shown as is.
    Text(String),
    /// A value with its own rendering, such as a function's source.
    Custom(String),
    /// A plain value, shown by the structural printer.
    Structured(Value),
}

impl Printable {
    /// Classify a result. Returns `None` when nothing should be printed.
    pub fn classify(value: Value, policy: &DisplayPolicy) -> Option<Self> {
        Some(match value {
            Value::Undefined if policy.undefined == UndefinedDisplay::Suppress => return None,
            Value::String(s) => Printable::Text(s),
            Value::Function(def) => Printable::Custom(def.source_text.clone()),
            Value::Builtin(b) => Printable::Custom(format!("[Function: {}]", b.name())),
            Value::Method { target, name } => {
                Printable::Custom(format!("[Function: {}.{}]", target, name))
            }
            handle @ (Value::Database(_)
            | Value::Collection { .. }
            | Value::Pending(_)
            | Value::Opaque) => Printable::Custom(handle.to_display_string()),
            other => Printable::Structured(other),
        })
    }

    /// The text to print.
    pub fn render(&self) -> String {
        match self {
            Printable::Text(s) | Printable::Custom(s) => s.clone(),
            Printable::Structured(value) => inspect(value),
        }
    }
}

/// Render a value the way a JavaScript console does.
///
/// Strings are quoted, containers are printed on one line when they fit
/// and one entry per line otherwise.
pub fn inspect(value: &Value) -> String {
    inspect_at(value, 0, 0)
}

fn inspect_at(value: &Value, depth: usize, indent: usize) -> String {
    match value {
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Array(_) if depth >= MAX_DEPTH => "[Array]".to_string(),
        Value::Object(_) if depth >= MAX_DEPTH => "[Object]".to_string(),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| inspect_at(item, depth + 1, indent + 2))
                .collect();
            wrap('[', ']', parts, indent)
        }
        Value::Object(map) => {
            let parts = map
                .iter()
                .map(|(key, item)| {
                    format!("{}: {}", object_key(key), inspect_at(item, depth + 1, indent + 2))
                })
                .collect();
            wrap('{', '}', parts, indent)
        }
        Value::String(s) => quote_string(s),
        Value::Number(n) => format_number(*n),
        Value::Function(def) => match &def.name {
            Some(name) => format!("[Function: {}]", name),
            None => "[Function (anonymous)]".to_string(),
        },
        other => match Printable::classify(other.clone(), &DisplayPolicy {
            undefined: UndefinedDisplay::Print,
            ..DisplayPolicy::default()
        }) {
            Some(Printable::Custom(text)) => text,
            _ => other.to_display_string(),
        },
    }
}

fn wrap(open: char, close: char, parts: Vec<String>, indent: usize) -> String {
    let single = format!("{} {} {}", open, parts.join(", "), close);
    if indent + single.len() <= LINE_WIDTH && !single.contains('\n') {
        return single;
    }
    let pad = " ".repeat(indent + 2);
    format!(
        "{}\n{}{}\n{}{}",
        open,
        pad,
        parts.join(&format!(",\n{}", pad)),
        " ".repeat(indent),
        close
    )
}
