//! In-memory backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::RwLock;
use tracing::debug;

use super::{Backend, BackendCall};
use crate::error::BackendError;
use crate::script::{Object, Value};

type Collections = BTreeMap<String, Vec<Object>>;

/// Backend that keeps every database in process memory.
///
/// Filters are top-level equality matches. Documents inserted without an
/// `_id` get an auto-incremented numeric one.
pub struct MemoryBackend {
    databases: RwLock<BTreeMap<String, Collections>>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn assign_id(&self, mut doc: Object) -> (Value, Object) {
        let id = match doc.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Value::Number(self.next_id.fetch_add(1, Ordering::Relaxed) as f64);
                doc.shift_insert(0, "_id".to_string(), id.clone());
                id
            }
        };
        (id, doc)
    }

    async fn call_collection(
        &self,
        call: &BackendCall,
        database: &str,
        collection: &str,
    ) -> Result<Value, BackendError> {
        match call.method.as_str() {
            "insertOne" => {
                let doc = document(call, 0)?;
                let (id, doc) = self.assign_id(doc);
                let mut dbs = self.databases.write().await;
                dbs.entry(database.to_string())
                    .or_default()
                    .entry(collection.to_string())
                    .or_default()
                    .push(doc);
                Ok(ack([("insertedId", id)]))
            }
            "insertMany" => {
                let Value::Array(items) = call.arg(0) else {
                    return Err(invalid(call, "expected an array of documents"));
                };
                let mut docs = Vec::with_capacity(items.len());
                for item in items {
                    let Value::Object(doc) = item else {
                        return Err(invalid(call, "expected an array of documents"));
                    };
                    docs.push(self.assign_id(doc.clone()));
                }
                let ids = docs.iter().map(|(id, _)| id.clone()).collect();
                let mut dbs = self.databases.write().await;
                dbs.entry(database.to_string())
                    .or_default()
                    .entry(collection.to_string())
                    .or_default()
                    .extend(docs.into_iter().map(|(_, doc)| doc));
                Ok(ack([("insertedIds", Value::Array(ids))]))
            }
            "find" | "findOne" | "countDocuments" => {
                let filter = filter(call, 0)?;
                let dbs = self.databases.read().await;
                let docs = dbs
                    .get(database)
                    .and_then(|colls| colls.get(collection))
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let mut matching = docs.iter().filter(|doc| matches(doc, filter.as_ref()));
                Ok(match call.method.as_str() {
                    "find" => Value::Array(matching.map(|d| Value::Object(d.clone())).collect()),
                    "findOne" => matching
                        .next()
                        .map(|d| Value::Object(d.clone()))
                        .unwrap_or(Value::Null),
                    _ => Value::Number(matching.count() as f64),
                })
            }
            "updateOne" => {
                let filter = filter(call, 0)?;
                let changes = match call.arg(1) {
                    Value::Object(update) => match update.get("$set") {
                        Some(Value::Object(set)) => set.clone(),
                        _ => return Err(invalid(call, "update must use $set")),
                    },
                    _ => return Err(invalid(call, "expected an update document")),
                };
                let mut dbs = self.databases.write().await;
                let doc = dbs
                    .get_mut(database)
                    .and_then(|colls| colls.get_mut(collection))
                    .and_then(|docs| docs.iter_mut().find(|d| matches(d, filter.as_ref())));
                let (matched, modified) = match doc {
                    Some(doc) => {
                        let mut modified = false;
                        for (key, value) in changes {
                            if doc.get(&key) != Some(&value) {
                                doc.insert(key, value);
                                modified = true;
                            }
                        }
                        (1.0, if modified { 1.0 } else { 0.0 })
                    }
                    None => (0.0, 0.0),
                };
                Ok(ack([
                    ("matchedCount", Value::Number(matched)),
                    ("modifiedCount", Value::Number(modified)),
                ]))
            }
            "deleteOne" | "deleteMany" => {
                let filter = filter(call, 0)?;
                let many = call.method == "deleteMany";
                let mut dbs = self.databases.write().await;
                let mut deleted = 0usize;
                if let Some(docs) = dbs
                    .get_mut(database)
                    .and_then(|colls| colls.get_mut(collection))
                {
                    docs.retain(|doc| {
                        let hit = (many || deleted == 0) && matches(doc, filter.as_ref());
                        if hit {
                            deleted += 1;
                        }
                        !hit
                    });
                }
                Ok(ack([("deletedCount", Value::Number(deleted as f64))]))
            }
            "drop" => {
                let mut dbs = self.databases.write().await;
                let dropped = dbs
                    .get_mut(database)
                    .and_then(|colls| colls.remove(collection))
                    .is_some();
                Ok(Value::Bool(dropped))
            }
            _ => Err(BackendError::UnknownMethod {
                target: call.target.to_string(),
                method: call.method.clone(),
            }),
        }
    }

    async fn call_database(
        &self,
        call: &BackendCall,
        database: &str,
    ) -> Result<Value, BackendError> {
        match call.method.as_str() {
            "getCollectionNames" => Ok(Value::Array(
                self.collection_names(database)
                    .await
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            )),
            "dropDatabase" => {
                let dropped = self.databases.write().await.remove(database).is_some();
                Ok(ack([("dropped", Value::Bool(dropped))]))
            }
            _ => Err(BackendError::UnknownMethod {
                target: call.target.to_string(),
                method: call.method.clone(),
            }),
        }
    }

    async fn collection_names(&self, database: &str) -> Vec<String> {
        self.databases
            .read()
            .await
            .get(database)
            .map(|colls| colls.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn call<'a>(&'a self, call: &'a BackendCall) -> BoxFuture<'a, Result<Value, BackendError>> {
        async move {
            debug!(operation = %call, "memory backend call");
            let database = call.target.database.as_str();
            match &call.target.collection {
                Some(collection) => self.call_collection(call, database, collection).await,
                None => self.call_database(call, database).await,
            }
        }
        .boxed()
    }

    fn list_databases(&self) -> BoxFuture<'_, Vec<String>> {
        async move { self.databases.read().await.keys().cloned().collect() }.boxed()
    }

    fn list_collections<'a>(&'a self, database: &'a str) -> BoxFuture<'a, Vec<String>> {
        self.collection_names(database).boxed()
    }
}

fn ack<const N: usize>(fields: [(&str, Value); N]) -> Value {
    let mut result = Object::new();
    result.insert("acknowledged".to_string(), Value::Bool(true));
    for (key, value) in fields {
        result.insert(key.to_string(), value);
    }
    Value::Object(result)
}

fn invalid(call: &BackendCall, reason: &str) -> BackendError {
    BackendError::InvalidArgument {
        method: call.method.clone(),
        reason: reason.to_string(),
    }
}

fn document(call: &BackendCall, index: usize) -> Result<Object, BackendError> {
    match call.arg(index) {
        Value::Object(doc) => Ok(doc.clone()),
        _ => Err(invalid(call, "expected a document")),
    }
}

fn filter(call: &BackendCall, index: usize) -> Result<Option<Object>, BackendError> {
    match call.arg(index) {
        Value::Undefined | Value::Null => Ok(None),
        Value::Object(filter) => Ok(Some(filter.clone())),
        _ => Err(invalid(call, "filter must be a document")),
    }
}

fn matches(doc: &Object, filter: Option<&Object>) -> bool {
    filter.map_or(true, |filter| {
        filter.iter().all(|(key, expected)| doc.get(key) == Some(expected))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Target;

    fn call(method: &str, args: Vec<Value>) -> BackendCall {
        BackendCall {
            target: Target::collection("test", "users"),
            method: method.to_string(),
            args,
        }
    }

    fn doc(pairs: &[(&str, Value)]) -> Value {
        let mut map = Object::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Value::Object(map)
    }

    #[test]
    fn test_insert_and_find() {
        let backend = MemoryBackend::new();
        tokio_test::block_on(async {
            backend
                .call(&call("insertOne", vec![doc(&[("name", "ada".into())])]))
                .await
                .unwrap();
            let found = backend.call(&call("find", vec![])).await.unwrap();
            let Value::Array(docs) = found else {
                panic!("expected array");
            };
            assert_eq!(docs.len(), 1);
            let Value::Object(first) = &docs[0] else {
                panic!("expected document");
            };
            assert_eq!(first.get_index(0).map(|(k, _)| k.as_str()), Some("_id"));
            assert_eq!(first.get("name"), Some(&Value::from("ada")));
        });
    }

    #[test]
    fn test_equality_filter_and_count() {
        let backend = MemoryBackend::new();
        tokio_test::block_on(async {
            let docs = Value::Array(vec![
                doc(&[("a", Value::Number(1.0))]),
                doc(&[("a", Value::Number(2.0))]),
                doc(&[("a", Value::Number(1.0))]),
            ]);
            backend.call(&call("insertMany", vec![docs])).await.unwrap();
            let count = backend
                .call(&call("countDocuments", vec![doc(&[("a", Value::Number(1.0))])]))
                .await
                .unwrap();
            assert_eq!(count, Value::Number(2.0));
            let none = backend
                .call(&call("findOne", vec![doc(&[("a", Value::Number(9.0))])]))
                .await
                .unwrap();
            assert_eq!(none, Value::Null);
        });
    }

    #[test]
    fn test_update_and_delete() {
        let backend = MemoryBackend::new();
        tokio_test::block_on(async {
            backend
                .call(&call("insertOne", vec![doc(&[("a", Value::Number(1.0))])]))
                .await
                .unwrap();
            let set = doc(&[("$set", doc(&[("b", "x".into())]))]);
            backend
                .call(&call("updateOne", vec![doc(&[("a", Value::Number(1.0))]), set]))
                .await
                .unwrap();
            let found = backend
                .call(&call("findOne", vec![doc(&[("b", "x".into())])]))
                .await
                .unwrap();
            assert!(matches!(found, Value::Object(_)));

            let deleted = backend.call(&call("deleteMany", vec![])).await.unwrap();
            let Value::Object(result) = deleted else {
                panic!("expected result document");
            };
            assert_eq!(result.get("deletedCount"), Some(&Value::Number(1.0)));
        });
    }

    #[test]
    fn test_collection_listing() {
        let backend = MemoryBackend::new();
        tokio_test::block_on(async {
            backend
                .call(&call("insertOne", vec![doc(&[])]))
                .await
                .unwrap();
            assert_eq!(backend.list_databases().await, vec!["test".to_string()]);
            assert_eq!(backend.list_collections("test").await, vec!["users".to_string()]);
            assert!(backend.list_collections("other").await.is_empty());
        });
    }

    #[test]
    fn test_unknown_method() {
        let backend = MemoryBackend::new();
        let err = tokio_test::block_on(backend.call(&call("explode", vec![]))).unwrap_err();
        assert_eq!(
            err,
            BackendError::UnknownMethod {
                target: "test.users".into(),
                method: "explode".into(),
            }
        );
    }

    #[test]
    fn test_invalid_argument() {
        let backend = MemoryBackend::new();
        let err =
            tokio_test::block_on(backend.call(&call("insertOne", vec![Value::Number(1.0)])))
                .unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument { .. }));
    }
}
