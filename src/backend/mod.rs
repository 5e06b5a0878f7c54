//! Asynchronous data backend the shell evaluates against.
//!
//! Every operation on a database or collection suspends. The script
//! language models that by returning a pending value from the call, which
//! only reaches the backend once it is awaited.

mod memory;

pub use memory::MemoryBackend;

use std::fmt;

use futures_util::future::BoxFuture;

use crate::error::BackendError;
use crate::script::Value;

/// What a backend operation is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Database name.
    pub database: String,
    /// Collection name, `None` for database-level operations.
    pub collection: Option<String>,
}

impl Target {
    /// A database-level target.
    pub fn database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: None,
        }
    }

    /// A collection-level target.
    pub fn collection(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: Some(collection.into()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.collection {
            Some(collection) => write!(f, "{}.{}", self.database, collection),
            None => write!(f, "{}", self.database),
        }
    }
}

/// A single backend operation with its evaluated arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCall {
    pub target: Target,
    pub method: String,
    pub args: Vec<Value>,
}

impl BackendCall {
    /// Argument at `index`, or `undefined` when it was not passed.
    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Undefined)
    }
}

impl fmt::Display for BackendCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.to_source().unwrap_or_else(|| a.to_display_string()))
            .collect();
        match &self.target.collection {
            Some(collection) => write!(f, "db.{}.{}({})", collection, self.method, args.join(", ")),
            None => write!(f, "db.{}({})", self.method, args.join(", ")),
        }
    }
}

/// A data backend.
///
/// Implementations must be shareable across tasks; the shell holds one
/// behind an `Arc` for its whole lifetime.
pub trait Backend: Send + Sync {
    /// Perform an operation.
    fn call<'a>(&'a self, call: &'a BackendCall) -> BoxFuture<'a, Result<Value, BackendError>>;

    /// Names of all databases holding data.
    fn list_databases(&self) -> BoxFuture<'_, Vec<String>>;

    /// Names of the collections in a database.
    fn list_collections<'a>(&'a self, database: &'a str) -> BoxFuture<'a, Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display() {
        assert_eq!(Target::database("test").to_string(), "test");
        assert_eq!(Target::collection("test", "users").to_string(), "test.users");
    }

    #[test]
    fn test_call_display_uses_source_form() {
        let mut filter = crate::script::Object::new();
        filter.insert("a".into(), Value::Number(1.0));
        let call = BackendCall {
            target: Target::collection("test", "users"),
            method: "find".into(),
            args: vec![Value::Object(filter)],
        };
        assert_eq!(call.to_string(), "db.users.find({ a: 1 })");
    }

    #[test]
    fn test_missing_argument_is_undefined() {
        let call = BackendCall {
            target: Target::database("test"),
            method: "getCollectionNames".into(),
            args: vec![],
        };
        assert_eq!(call.arg(0), &Value::Undefined);
    }
}
