//! Runtime values of the script language.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use super::ast::FunctionDef;
use super::lexer::{is_ident_continue, is_ident_start, KEYWORDS};
use crate::backend::{BackendCall, Target};

/// Object storage; keys keep insertion order.
pub type Object = IndexMap<String, Value>;

/// A script value.
///
/// Arrays and objects are owned, so cloning a value (or a whole scope)
/// never shares mutable state with the original.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
    /// A user-defined function.
    Function(Arc<FunctionDef>),
    /// A function provided by the shell.
    Builtin(Builtin),
    /// Handle to a database on the backend.
    Database(String),
    /// Handle to a collection on the backend.
    Collection { database: String, name: String },
    /// An operation of a database or collection, not yet called.
    Method { target: Target, name: String },
    /// An operation that suspends until it is awaited.
    Pending(Box<PendingOp>),
    /// Stand-in for any value the dry run cannot know.
    Opaque,
}

/// Functions provided by the shell itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `print(...values)` writes to the shell output.
    Print,
    /// `sleep(ms)` suspends for the given number of milliseconds.
    Sleep,
}

impl Builtin {
    /// Name the builtin is bound to.
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Sleep => "sleep",
        }
    }
}

/// Work that only happens once the value is awaited.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    /// A call to the backend.
    Backend(BackendCall),
    /// A timer.
    Sleep(Duration),
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingOp::Backend(call) => write!(f, "{}", call),
            PendingOp::Sleep(d) => write!(f, "sleep({})", d.as_millis()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Function(a), Function(b)) => Arc::ptr_eq(a, b),
            (Builtin(a), Builtin(b)) => a == b,
            (Database(a), Database(b)) => a == b,
            (
                Collection { database, name },
                Collection {
                    database: d2,
                    name: n2,
                },
            ) => database == d2 && name == n2,
            (Method { target, name }, Method { target: t2, name: n2 }) => {
                target == t2 && name == n2
            }
            (Pending(a), Pending(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Name of the value's kind, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) | Value::Builtin(_) | Value::Method { .. } => "function",
            Value::Database(_) => "database",
            Value::Collection { .. } => "collection",
            Value::Pending(_) => "pending operation",
            Value::Opaque => "unknown",
        }
    }

    /// JavaScript-style truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Numeric conversion used by arithmetic.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// True for values that are awaiting resolution.
    pub fn is_pending(&self) -> bool {
        matches!(self, Value::Pending(_))
    }

    /// Text used by string concatenation and `print`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(def) => def.source_text.clone(),
            Value::Builtin(b) => format!("function {}() {{ [native code] }}", b.name()),
            Value::Database(name) => name.clone(),
            Value::Collection { database, name } => format!("{}.{}", database, name),
            Value::Method { target, name } => format!("{}.{}", target, name),
            Value::Pending(op) => format!("[pending {}]", op),
            Value::Opaque => "[unknown]".to_string(),
        }
    }

    /// Source text that evaluates back to this value.
    ///
    /// Returns `None` for values with no literal form, such as builtins,
    /// pending operations and dry-run placeholders.
    pub fn to_source(&self) -> Option<String> {
        Some(match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => quote_string(s),
            Value::Array(items) => {
                let parts = items
                    .iter()
                    .map(Value::to_source)
                    .collect::<Option<Vec<_>>>()?;
                format!("[{}]", parts.join(", "))
            }
            Value::Object(map) if map.is_empty() => "{}".to_string(),
            Value::Object(map) => {
                let parts = map
                    .iter()
                    .map(|(k, v)| v.to_source().map(|v| format!("{}: {}", object_key(k), v)))
                    .collect::<Option<Vec<_>>>()?;
                format!("{{ {} }}", parts.join(", "))
            }
            Value::Function(def) => def.source_text.clone(),
            Value::Database(_) => "db".to_string(),
            Value::Collection { name, .. } => format!("db.{}", name),
            Value::Method { target, name } => match &target.collection {
                Some(collection) => format!("db.{}.{}", collection, name),
                None => format!("db.{}", name),
            },
            Value::Builtin(_) | Value::Pending(_) | Value::Opaque => return None,
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Render a number the way JavaScript prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Single-quoted string literal with escapes.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Object key, quoted only when it is not a plain identifier.
pub fn object_key(key: &str) -> String {
    let mut chars = key.chars();
    let plain = chars.next().is_some_and(is_ident_start)
        && chars.all(is_ident_continue)
        && !KEYWORDS.contains(&key);
    if plain {
        key.to_string()
    } else {
        quote_string(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::String(String::new()).truthy());
        assert!(Value::Array(vec![]).truthy());
        assert!(Value::Opaque.truthy());
    }

    #[test]
    fn test_structural_equality() {
        let mut a = Object::new();
        a.insert("x".into(), Value::Number(1.0));
        assert_eq!(Value::Object(a.clone()), Value::Object(a));
        assert_ne!(Value::Opaque, Value::Opaque);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut inner = Object::new();
        inner.insert("n".into(), Value::Number(1.0));
        let original = Value::Array(vec![Value::Object(inner)]);
        let mut copy = original.clone();
        if let Value::Array(items) = &mut copy {
            if let Value::Object(map) = &mut items[0] {
                map.insert("n".into(), Value::Number(2.0));
            }
        }
        assert_ne!(original, copy);
    }

    #[test]
    fn test_to_source_literals() {
        let mut map = Object::new();
        map.insert("a".into(), Value::Number(1.0));
        map.insert("b c".into(), Value::from("it's"));
        map.insert("list".into(), Value::Array(vec![Value::Null, Value::Bool(true)]));
        assert_eq!(
            Value::Object(map).to_source().unwrap(),
            "{ a: 1, 'b c': 'it\\'s', list: [null, true] }"
        );
        assert!(Value::Opaque.to_source().is_none());
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Value::Number(42.0).to_display_string(), "42");
        assert_eq!(
            Value::Array(vec![Value::Number(1.0), Value::from("a")]).to_display_string(),
            "1,a"
        );
    }
}
